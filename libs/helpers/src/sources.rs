//! Scripted pipeline sources with observable pull behaviour

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use log::debug;

use bitmap_index::errors::{Error, Result};
use bitmap_index::iterators::{
    ArcSequence, AsyncIterator, AsyncSequence, BoxIterator, IterationContext, IteratorImpl,
    PipelineIterator,
};

/// In-memory source organized in pages: the first pull of each page parks
/// on the scheduler (simulating a page fetch), later pulls of the same page
/// complete synchronously. Every pull is counted.
pub struct PagedSequence<T> {
    pages: Arc<Vec<Vec<T>>>,
    pulls: Arc<AtomicUsize>,
}

impl<T> PagedSequence<T> {
    pub fn new(pages: Vec<Vec<T>>) -> Self {
        Self {
            pages: Arc::new(pages),
            pulls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared counter of the pulls issued against this source
    pub fn pull_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.pulls)
    }
}

impl<T: Clone + Send + Sync + 'static> AsyncSequence for PagedSequence<T> {
    type Item = T;

    fn iterator(&self, ctx: &IterationContext) -> BoxIterator<T> {
        Box::new(PipelineIterator::new(
            PagedIterator {
                pages: Arc::clone(&self.pages),
                page: 0,
                slot: 0,
                pulls: Arc::clone(&self.pulls),
            },
            ctx.clone(),
        ))
    }
}

struct PagedIterator<T> {
    pages: Arc<Vec<Vec<T>>>,
    page: usize,
    slot: usize,
    pulls: Arc<AtomicUsize>,
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> IteratorImpl for PagedIterator<T> {
    type Item = T;

    async fn on_first(&mut self, _ctx: &IterationContext) -> Result<bool> {
        Ok(true)
    }

    async fn on_next(&mut self, _ctx: &IterationContext) -> Result<Option<T>> {
        self.pulls.fetch_add(1, Ordering::SeqCst);
        loop {
            let Some(page) = self.pages.get(self.page) else {
                return Ok(None);
            };
            if self.slot == 0 {
                debug!("fetching page {}", self.page);
                tokio::task::yield_now().await;
            }
            match page.get(self.slot) {
                Some(item) => {
                    self.slot += 1;
                    return Ok(Some(item.clone()));
                }
                None => {
                    self.page += 1;
                    self.slot = 0;
                }
            }
        }
    }

    async fn cleanup(&mut self) {}
}

/// Wraps any sequence and counts the pulls its consumer issues
pub struct CountingSequence<T> {
    inner: ArcSequence<T>,
    pulls: Arc<AtomicUsize>,
}

impl<T: Send + 'static> CountingSequence<T> {
    pub fn new(inner: ArcSequence<T>) -> Self {
        Self {
            inner,
            pulls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn pull_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.pulls)
    }
}

impl<T: Send + 'static> AsyncSequence for CountingSequence<T> {
    type Item = T;

    fn iterator(&self, ctx: &IterationContext) -> BoxIterator<T> {
        Box::new(PipelineIterator::new(
            CountingIterator {
                inner: self.inner.iterator(ctx),
                pulls: Arc::clone(&self.pulls),
            },
            ctx.clone(),
        ))
    }
}

struct CountingIterator<T> {
    inner: BoxIterator<T>,
    pulls: Arc<AtomicUsize>,
}

#[async_trait]
impl<T: Send + 'static> IteratorImpl for CountingIterator<T> {
    type Item = T;

    async fn on_first(&mut self, _ctx: &IterationContext) -> Result<bool> {
        Ok(true)
    }

    async fn on_next(&mut self, _ctx: &IterationContext) -> Result<Option<T>> {
        self.pulls.fetch_add(1, Ordering::SeqCst);
        self.inner.next_item().await
    }

    async fn cleanup(&mut self) {
        self.inner.dispose().await;
    }
}

/// Yields its items, then fails with an upstream fault
pub struct FaultingSequence<T> {
    items: Arc<Vec<T>>,
    message: String,
}

impl<T> FaultingSequence<T> {
    pub fn new(items: Vec<T>, message: &str) -> Self {
        Self {
            items: Arc::new(items),
            message: message.to_string(),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> AsyncSequence for FaultingSequence<T> {
    type Item = T;

    fn iterator(&self, ctx: &IterationContext) -> BoxIterator<T> {
        Box::new(PipelineIterator::new(
            FaultingIterator {
                items: Arc::clone(&self.items),
                next: 0,
                message: self.message.clone(),
            },
            ctx.clone(),
        ))
    }
}

struct FaultingIterator<T> {
    items: Arc<Vec<T>>,
    next: usize,
    message: String,
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> IteratorImpl for FaultingIterator<T> {
    type Item = T;

    async fn on_first(&mut self, _ctx: &IterationContext) -> Result<bool> {
        Ok(true)
    }

    async fn on_next(&mut self, _ctx: &IterationContext) -> Result<Option<T>> {
        match self.items.get(self.next) {
            Some(item) => {
                self.next += 1;
                Ok(Some(item.clone()))
            }
            None => Err(Error::fault(self.message.clone())),
        }
    }

    async fn cleanup(&mut self) {}
}

/// A counting cell shared with a scripted source
pub fn read_counter(counter: &Arc<AtomicUsize>) -> usize {
    counter.load(Ordering::SeqCst)
}
