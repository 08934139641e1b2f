//! Bounded lookahead operator
//!
//! Decouples the consumer's pull rate from the source's page boundaries: a
//! FIFO buffer is refilled eagerly, but only while the source answers
//! synchronously, so the operator never adds latency of its own.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::task::noop_waker_ref;

use crate::errors::{Error, Result};

use super::core::{
    AsyncIterator, AsyncSequence, BoxIterator, IterationContext, IteratorImpl, PipelineIterator,
};

/// A pull in flight. The future owns the source iterator and hands it back
/// together with the pull's outcome, so storing the pull does not borrow
/// the operator.
type PendingPull<T> = Pin<Box<dyn Future<Output = (BoxIterator<T>, Result<Option<T>>)> + Send>>;

fn start_pull<T: Send + 'static>(mut source: BoxIterator<T>) -> PendingPull<T> {
    Box::pin(async move {
        let outcome = source.next_item().await;
        (source, outcome)
    })
}

/// Recipe for [`prefetch`](super::AsyncSequenceExt::prefetch)
pub struct PrefetchSequence<S: AsyncSequence> {
    pub(super) source: S,
    pub(super) count: usize,
}

impl<S: AsyncSequence> AsyncSequence for PrefetchSequence<S> {
    type Item = S::Item;

    fn iterator(&self, ctx: &IterationContext) -> BoxIterator<Self::Item> {
        Box::new(PipelineIterator::new(
            PrefetchIterator {
                source: Some(self.source.iterator(ctx)),
                pending: None,
                buffer: VecDeque::with_capacity(self.count),
                capacity: self.count,
                exhausted: false,
                failed: None,
            },
            ctx.clone(),
        ))
    }
}

struct PrefetchIterator<T> {
    /// The source iterator, absent while a pull owns it
    source: Option<BoxIterator<T>>,
    /// At most one stored pull that was not ready when probed
    pending: Option<PendingPull<T>>,
    buffer: VecDeque<T>,
    capacity: usize,
    exhausted: bool,
    /// A fault observed during eager refill, surfaced once the buffered
    /// items before it have been served
    failed: Option<Error>,
}

impl<T: Send + 'static> PrefetchIterator<T> {
    fn record(&mut self, outcome: Result<Option<T>>) {
        match outcome {
            Ok(Some(item)) => self.buffer.push_back(item),
            Ok(None) => self.exhausted = true,
            Err(err) => {
                self.exhausted = true;
                self.failed = Some(err);
            }
        }
    }

    /// Waits for one item when the buffer is cold: resumes the stored pull
    /// if there is one, otherwise drives the source directly.
    async fn pull_one(&mut self) -> Result<()> {
        if let Some(pull) = self.pending.take() {
            let (source, outcome) = pull.await;
            self.source = Some(source);
            self.record(outcome);
        } else if let Some(source) = self.source.as_mut() {
            let outcome = source.next_item().await;
            self.record(outcome);
        }
        Ok(())
    }

    /// Starts pulls as long as they complete synchronously and the buffer
    /// has room; the first pull that would block is stored for later.
    fn refill(&mut self) {
        while !self.exhausted && self.buffer.len() < self.capacity && self.pending.is_none() {
            let Some(source) = self.source.take() else {
                break;
            };
            let mut pull = start_pull(source);
            let mut probe = Context::from_waker(noop_waker_ref());
            match pull.as_mut().poll(&mut probe) {
                Poll::Ready((source, outcome)) => {
                    self.source = Some(source);
                    self.record(outcome);
                }
                Poll::Pending => {
                    self.pending = Some(pull);
                }
            }
        }
    }
}

#[async_trait]
impl<T: Send + 'static> IteratorImpl for PrefetchIterator<T> {
    type Item = T;

    async fn on_first(&mut self, _ctx: &IterationContext) -> Result<bool> {
        Ok(true)
    }

    async fn on_next(&mut self, ctx: &IterationContext) -> Result<Option<T>> {
        if self.buffer.is_empty() && !self.exhausted {
            ctx.ensure_active()?;
            // Guarantee forward progress: always wait for at least one item
            self.pull_one().await?;
        }
        self.refill();

        match self.buffer.pop_front() {
            Some(item) => Ok(Some(item)),
            None => match self.failed.take() {
                Some(err) => Err(err),
                None => Ok(None),
            },
        }
    }

    async fn cleanup(&mut self) {
        // Dropping a stored pull drops the source iterator it owns; the
        // pull's eventual outcome is deliberately never observed
        self.pending = None;
        self.buffer.clear();
        if let Some(mut source) = self.source.take() {
            source.dispose().await;
        }
    }
}
