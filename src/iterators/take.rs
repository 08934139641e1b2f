//! Count limiting operator

use async_trait::async_trait;

use crate::errors::Result;

use super::core::{
    AsyncIterator, AsyncSequence, BoxIterator, IterationContext, IteratorImpl, PipelineIterator,
};

/// Recipe for [`take`](super::AsyncSequenceExt::take).
///
/// Once the limit is reached the source is not pulled again.
pub struct TakeSequence<S: AsyncSequence> {
    pub(super) source: S,
    pub(super) count: usize,
}

impl<S: AsyncSequence> AsyncSequence for TakeSequence<S> {
    type Item = S::Item;

    fn iterator(&self, ctx: &IterationContext) -> BoxIterator<Self::Item> {
        Box::new(PipelineIterator::new(
            TakeIterator {
                source: self.source.iterator(ctx),
                remaining: self.count,
            },
            ctx.clone(),
        ))
    }
}

struct TakeIterator<T> {
    source: BoxIterator<T>,
    remaining: usize,
}

#[async_trait]
impl<T: Send + 'static> IteratorImpl for TakeIterator<T> {
    type Item = T;

    async fn on_first(&mut self, _ctx: &IterationContext) -> Result<bool> {
        Ok(self.remaining > 0)
    }

    async fn on_next(&mut self, _ctx: &IterationContext) -> Result<Option<T>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        match self.source.next_item().await? {
            Some(item) => {
                self.remaining -= 1;
                Ok(Some(item))
            }
            None => Ok(None),
        }
    }

    async fn cleanup(&mut self) {
        self.source.dispose().await;
    }
}
