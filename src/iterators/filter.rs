//! Filtering operator

use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::Result;

use super::core::{
    AsyncIterator, AsyncSequence, BoxIterator, IterationContext, IteratorImpl, PipelineIterator,
};

type Predicate<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// Recipe for [`filter`](super::AsyncSequenceExt::filter)
pub struct FilterSequence<S: AsyncSequence> {
    pub(super) source: S,
    pub(super) predicate: Predicate<S::Item>,
}

impl<S: AsyncSequence> AsyncSequence for FilterSequence<S> {
    type Item = S::Item;

    fn iterator(&self, ctx: &IterationContext) -> BoxIterator<Self::Item> {
        Box::new(PipelineIterator::new(
            FilterIterator {
                source: self.source.iterator(ctx),
                predicate: Arc::clone(&self.predicate),
            },
            ctx.clone(),
        ))
    }
}

struct FilterIterator<T> {
    source: BoxIterator<T>,
    predicate: Predicate<T>,
}

#[async_trait]
impl<T: Send + 'static> IteratorImpl for FilterIterator<T> {
    type Item = T;

    async fn on_first(&mut self, _ctx: &IterationContext) -> Result<bool> {
        Ok(true)
    }

    async fn on_next(&mut self, ctx: &IterationContext) -> Result<Option<T>> {
        loop {
            ctx.ensure_active()?;
            match self.source.next_item().await? {
                Some(item) => {
                    if (self.predicate)(&item) {
                        return Ok(Some(item));
                    }
                }
                None => return Ok(None),
            }
        }
    }

    async fn cleanup(&mut self) {
        self.source.dispose().await;
    }
}
