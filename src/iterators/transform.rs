//! 1:1 projection operator

use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::Result;

use super::core::{
    AsyncIterator, AsyncSequence, BoxIterator, IterationContext, IteratorImpl, PipelineIterator,
};

type Selector<T, R> = Arc<dyn Fn(T) -> R + Send + Sync>;

/// Recipe for [`map`](super::AsyncSequenceExt::map)
pub struct TransformSequence<S: AsyncSequence, R> {
    pub(super) source: S,
    pub(super) selector: Selector<S::Item, R>,
}

impl<S: AsyncSequence, R: Send + 'static> AsyncSequence for TransformSequence<S, R> {
    type Item = R;

    fn iterator(&self, ctx: &IterationContext) -> BoxIterator<R> {
        Box::new(PipelineIterator::new(
            TransformIterator {
                source: self.source.iterator(ctx),
                selector: Arc::clone(&self.selector),
            },
            ctx.clone(),
        ))
    }
}

struct TransformIterator<T, R> {
    source: BoxIterator<T>,
    selector: Selector<T, R>,
}

#[async_trait]
impl<T: Send + 'static, R: Send + 'static> IteratorImpl for TransformIterator<T, R> {
    type Item = R;

    async fn on_first(&mut self, _ctx: &IterationContext) -> Result<bool> {
        Ok(true)
    }

    /// Pulls exactly one upstream item per call, never loops
    async fn on_next(&mut self, _ctx: &IterationContext) -> Result<Option<R>> {
        match self.source.next_item().await? {
            Some(item) => Ok(Some((self.selector)(item))),
            None => Ok(None),
        }
    }

    async fn cleanup(&mut self) {
        self.source.dispose().await;
    }
}
