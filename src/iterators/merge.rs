//! K-way merge of independently ordered sequences
//!
//! Every sub-sequence must be ordered under the same key. One cursor per
//! sub-sequence caches the next pending entry; each pull emits the entry
//! with the strictly minimal key, ties resolved in favour of the
//! lowest-indexed cursor, then re-pumps only the cursor it consumed from.

use std::sync::Arc;

use async_trait::async_trait;
use log::debug;

use crate::errors::Result;

use super::core::{
    ArcSequence, AsyncIterator, AsyncSequence, BoxIterator, IterationContext, IteratorImpl,
    PipelineIterator,
};

type KeyFn<T, K> = Arc<dyn Fn(&T) -> K + Send + Sync>;
type Projection<T, R> = Arc<dyn Fn(T) -> R + Send + Sync>;

/// Recipe for a merge-sort fan-in over N ordered sources.
///
/// The optional result limit is tightening-only: [`take`](Self::take) never
/// loosens an existing bound. [`map`](Self::map) composes with the result
/// projection instead of wrapping the merge in another operator.
pub struct MergeSortSequence<T, K, R> {
    sources: Vec<ArcSequence<T>>,
    key_fn: KeyFn<T, K>,
    project: Projection<T, R>,
    limit: Option<usize>,
}

impl<T, K> MergeSortSequence<T, K, T>
where
    T: Send + 'static,
    K: Ord + Send + 'static,
{
    pub fn new<F>(sources: Vec<ArcSequence<T>>, key_fn: F) -> Self
    where
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        Self {
            sources,
            key_fn: Arc::new(key_fn),
            project: Arc::new(|item| item),
            limit: None,
        }
    }
}

impl<T, K, R> MergeSortSequence<T, K, R>
where
    T: Send + 'static,
    K: Ord + Send + 'static,
    R: Send + 'static,
{
    /// Caps the number of merged results; an existing smaller cap wins
    pub fn take(self, limit: usize) -> Self {
        let limit = match self.limit {
            Some(existing) => existing.min(limit),
            None => limit,
        };
        Self {
            limit: Some(limit),
            ..self
        }
    }

    /// Composes `selector` with the result projection
    pub fn map<R2, F>(self, selector: F) -> MergeSortSequence<T, K, R2>
    where
        R2: Send + 'static,
        F: Fn(R) -> R2 + Send + Sync + 'static,
    {
        let project = self.project;
        MergeSortSequence {
            sources: self.sources,
            key_fn: self.key_fn,
            project: Arc::new(move |item| selector(project(item))),
            limit: self.limit,
        }
    }
}

impl<T, K, R> AsyncSequence for MergeSortSequence<T, K, R>
where
    T: Send + 'static,
    K: Ord + Send + 'static,
    R: Send + 'static,
{
    type Item = R;

    fn iterator(&self, ctx: &IterationContext) -> BoxIterator<R> {
        let cursors = self
            .sources
            .iter()
            .map(|source| MergeCursor {
                iterator: source.iterator(ctx),
                current: None,
                active: true,
            })
            .collect();
        Box::new(PipelineIterator::new(
            MergeIterator {
                cursors,
                key_fn: Arc::clone(&self.key_fn),
                project: Arc::clone(&self.project),
                remaining: self.limit,
            },
            ctx.clone(),
        ))
    }
}

/// Per-source traversal state: the wrapped iterator, the cached pending
/// entry and whether the source still has data. The cursor set is fixed for
/// the lifetime of one merge iterator.
struct MergeCursor<T, K> {
    iterator: BoxIterator<T>,
    current: Option<(K, T)>,
    active: bool,
}

impl<T: Send + 'static, K> MergeCursor<T, K> {
    async fn pump(&mut self, key_fn: &(dyn Fn(&T) -> K + Send + Sync)) -> Result<()> {
        match self.iterator.next_item().await? {
            Some(item) => {
                self.current = Some((key_fn(&item), item));
            }
            None => {
                self.current = None;
                self.active = false;
            }
        }
        Ok(())
    }
}

struct MergeIterator<T, K, R> {
    cursors: Vec<MergeCursor<T, K>>,
    key_fn: KeyFn<T, K>,
    project: Projection<T, R>,
    remaining: Option<usize>,
}

#[async_trait]
impl<T, K, R> IteratorImpl for MergeIterator<T, K, R>
where
    T: Send + 'static,
    K: Ord + Send + 'static,
    R: Send + 'static,
{
    type Item = R;

    async fn on_first(&mut self, ctx: &IterationContext) -> Result<bool> {
        if self.remaining == Some(0) {
            // Nothing may be emitted; do not even prime the sources
            return Ok(false);
        }
        let key_fn = Arc::clone(&self.key_fn);
        for (ix, cursor) in self.cursors.iter_mut().enumerate() {
            ctx.ensure_active()?;
            cursor.pump(key_fn.as_ref()).await?;
            debug!("[{}] primed, active={}", ix, cursor.active);
        }
        Ok(true)
    }

    async fn on_next(&mut self, ctx: &IterationContext) -> Result<Option<R>> {
        if self.remaining == Some(0) {
            return Ok(None);
        }
        ctx.ensure_active()?;

        // Strictly minimal key among active cursors; scanning in index
        // order with a strict comparison keeps equal keys stable
        // left-to-right
        let mut selected: Option<usize> = None;
        for (ix, cursor) in self.cursors.iter().enumerate() {
            if !cursor.active {
                continue;
            }
            let (key, _) = cursor
                .current
                .as_ref()
                .expect("an active cursor always caches an entry");
            match selected {
                None => selected = Some(ix),
                Some(best) => {
                    let (best_key, _) = self.cursors[best]
                        .current
                        .as_ref()
                        .expect("an active cursor always caches an entry");
                    if key < best_key {
                        selected = Some(ix);
                    }
                }
            }
        }
        let Some(ix) = selected else {
            return Ok(None);
        };

        let (_, item) = self.cursors[ix]
            .current
            .take()
            .expect("the selected cursor caches an entry");

        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= 1;
        }
        if self.remaining == Some(0) {
            // The last permitted result: no need to fetch past the limit
            debug!("[{}] limit reached, skipping the refill pull", ix);
        } else {
            let key_fn = Arc::clone(&self.key_fn);
            self.cursors[ix].pump(key_fn.as_ref()).await?;
        }
        Ok(Some((self.project)(item)))
    }

    async fn cleanup(&mut self) {
        for cursor in self.cursors.iter_mut() {
            cursor.iterator.dispose().await;
        }
    }
}
