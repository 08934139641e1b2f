//! Expansion operator: one upstream item, one sub-sequence of results

use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::Result;

use super::core::{
    ArcSequence, AsyncIterator, AsyncSequence, BoxIterator, IterationContext, IteratorImpl,
    PipelineIterator,
};

type Expander<T, R> = Arc<dyn Fn(T) -> ArcSequence<R> + Send + Sync>;

/// Recipe for [`flat_map`](super::AsyncSequenceExt::flat_map).
///
/// Outer items are expanded in upstream order; the items of each expansion
/// are yielded in their own order before the next outer item is pulled.
pub struct FlattenSequence<S: AsyncSequence, R> {
    pub(super) source: S,
    pub(super) expander: Expander<S::Item, R>,
}

impl<S: AsyncSequence, R: Send + 'static> AsyncSequence for FlattenSequence<S, R> {
    type Item = R;

    fn iterator(&self, ctx: &IterationContext) -> BoxIterator<R> {
        Box::new(PipelineIterator::new(
            FlattenIterator {
                source: self.source.iterator(ctx),
                expander: Arc::clone(&self.expander),
                inner: None,
            },
            ctx.clone(),
        ))
    }
}

struct FlattenIterator<T, R> {
    source: BoxIterator<T>,
    expander: Expander<T, R>,
    /// Iterator over the current expansion, if any
    inner: Option<BoxIterator<R>>,
}

#[async_trait]
impl<T: Send + 'static, R: Send + 'static> IteratorImpl for FlattenIterator<T, R> {
    type Item = R;

    async fn on_first(&mut self, _ctx: &IterationContext) -> Result<bool> {
        Ok(true)
    }

    async fn on_next(&mut self, ctx: &IterationContext) -> Result<Option<R>> {
        loop {
            ctx.ensure_active()?;
            if let Some(inner) = self.inner.as_mut() {
                if let Some(item) = inner.next_item().await? {
                    return Ok(Some(item));
                }
                // The current expansion is exhausted
                if let Some(mut inner) = self.inner.take() {
                    inner.dispose().await;
                }
            }
            match self.source.next_item().await? {
                Some(outer) => {
                    let sub = (self.expander)(outer);
                    self.inner = Some(sub.iterator(ctx));
                }
                None => return Ok(None),
            }
        }
    }

    async fn cleanup(&mut self) {
        if let Some(mut inner) = self.inner.take() {
            inner.dispose().await;
        }
        self.source.dispose().await;
    }
}
