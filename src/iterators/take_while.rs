//! Conditional prefix operator

use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::Result;

use super::core::{
    AsyncIterator, AsyncSequence, BoxIterator, IterationContext, IteratorImpl, PipelineIterator,
};

type Condition<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// Recipe for [`take_while`](super::AsyncSequenceExt::take_while).
///
/// The first item failing the condition is consumed from the source and
/// discarded, not pushed back; downstream pull counts observe that extra
/// pull. This matches the source-observed semantics callers rely on.
pub struct TakeWhileSequence<S: AsyncSequence> {
    pub(super) source: S,
    pub(super) condition: Condition<S::Item>,
}

impl<S: AsyncSequence> AsyncSequence for TakeWhileSequence<S> {
    type Item = S::Item;

    fn iterator(&self, ctx: &IterationContext) -> BoxIterator<Self::Item> {
        Box::new(PipelineIterator::new(
            TakeWhileIterator {
                source: self.source.iterator(ctx),
                condition: Arc::clone(&self.condition),
            },
            ctx.clone(),
        ))
    }
}

struct TakeWhileIterator<T> {
    source: BoxIterator<T>,
    condition: Condition<T>,
}

#[async_trait]
impl<T: Send + 'static> IteratorImpl for TakeWhileIterator<T> {
    type Item = T;

    async fn on_first(&mut self, _ctx: &IterationContext) -> Result<bool> {
        Ok(true)
    }

    async fn on_next(&mut self, _ctx: &IterationContext) -> Result<Option<T>> {
        match self.source.next_item().await? {
            Some(item) if (self.condition)(&item) => Ok(Some(item)),
            // The failing item has been consumed; drop it and complete
            Some(_) => Ok(None),
            None => Ok(None),
        }
    }

    async fn cleanup(&mut self) {
        self.source.dispose().await;
    }
}
