//! Deduplication operator

use std::collections::HashSet;
use std::hash::Hash;

use async_trait::async_trait;

use crate::errors::Result;

use super::core::{
    AsyncIterator, AsyncSequence, BoxIterator, IterationContext, IteratorImpl, PipelineIterator,
};

/// Recipe for [`distinct`](super::AsyncSequenceExt::distinct).
///
/// Keeps every key seen during one traversal, so memory grows with the
/// number of distinct items; the tradeoff buys single-pass correctness.
pub struct DistinctSequence<S: AsyncSequence> {
    pub(super) source: S,
}

impl<S> AsyncSequence for DistinctSequence<S>
where
    S: AsyncSequence,
    S::Item: Eq + Hash + Clone + Sync,
{
    type Item = S::Item;

    fn iterator(&self, ctx: &IterationContext) -> BoxIterator<Self::Item> {
        Box::new(PipelineIterator::new(
            DistinctIterator {
                source: self.source.iterator(ctx),
                seen: HashSet::new(),
            },
            ctx.clone(),
        ))
    }
}

struct DistinctIterator<T> {
    source: BoxIterator<T>,
    seen: HashSet<T>,
}

#[async_trait]
impl<T> IteratorImpl for DistinctIterator<T>
where
    T: Eq + Hash + Clone + Send + Sync + 'static,
{
    type Item = T;

    async fn on_first(&mut self, _ctx: &IterationContext) -> Result<bool> {
        Ok(true)
    }

    async fn on_next(&mut self, ctx: &IterationContext) -> Result<Option<T>> {
        loop {
            ctx.ensure_active()?;
            match self.source.next_item().await? {
                Some(item) => {
                    if self.seen.insert(item.clone()) {
                        return Ok(Some(item));
                    }
                }
                None => return Ok(None),
            }
        }
    }

    async fn cleanup(&mut self) {
        self.seen.clear();
        self.source.dispose().await;
    }
}
