//! Leaf sources for pipelines

use std::sync::Arc;

use async_trait::async_trait;

use crate::base::DocId;
use crate::bitmaps::{CompressedBitmap, SetBits};
use crate::errors::Result;

use super::core::{
    AsyncSequence, BoxIterator, IterationContext, IterationMode, IteratorImpl, PipelineIterator,
};

/// An ordered in-memory sequence (the "static list" source)
pub struct VecSequence<T> {
    items: Arc<Vec<T>>,
}

impl<T> VecSequence<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items: Arc::new(items),
        }
    }
}

impl<T> From<Vec<T>> for VecSequence<T> {
    fn from(items: Vec<T>) -> Self {
        Self::new(items)
    }
}

impl<T: Clone + Send + Sync + 'static> AsyncSequence for VecSequence<T> {
    type Item = T;

    fn iterator(&self, ctx: &IterationContext) -> BoxIterator<T> {
        Box::new(PipelineIterator::new(
            VecIterator {
                items: Arc::clone(&self.items),
                next: 0,
                mode: ctx.mode,
            },
            ctx.clone(),
        ))
    }
}

struct VecIterator<T> {
    items: Arc<Vec<T>>,
    next: usize,
    mode: IterationMode,
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> IteratorImpl for VecIterator<T> {
    type Item = T;

    async fn on_first(&mut self, _ctx: &IterationContext) -> Result<bool> {
        Ok(!self.items.is_empty())
    }

    async fn on_next(&mut self, _ctx: &IterationContext) -> Result<Option<T>> {
        if self.mode == IterationMode::Head && self.next > 0 {
            return Ok(None);
        }
        match self.items.get(self.next) {
            Some(item) => {
                self.next += 1;
                Ok(Some(item.clone()))
            }
            None => Ok(None),
        }
    }

    async fn cleanup(&mut self) {}
}

/// The set-bit positions of a compressed bitmap as an ordered sequence of
/// document identifiers
pub struct BitmapSequence {
    bitmap: CompressedBitmap,
}

impl BitmapSequence {
    pub fn new(bitmap: CompressedBitmap) -> Self {
        Self { bitmap }
    }
}

impl AsyncSequence for BitmapSequence {
    type Item = DocId;

    fn iterator(&self, ctx: &IterationContext) -> BoxIterator<DocId> {
        Box::new(PipelineIterator::new(
            BitmapIterator {
                bits: self.bitmap.view(),
                empty: self.bitmap.is_empty(),
                served: 0,
                mode: ctx.mode,
            },
            ctx.clone(),
        ))
    }
}

struct BitmapIterator {
    bits: SetBits,
    empty: bool,
    served: u64,
    mode: IterationMode,
}

#[async_trait]
impl IteratorImpl for BitmapIterator {
    type Item = DocId;

    async fn on_first(&mut self, _ctx: &IterationContext) -> Result<bool> {
        Ok(!self.empty)
    }

    async fn on_next(&mut self, _ctx: &IterationContext) -> Result<Option<DocId>> {
        if self.mode == IterationMode::Head && self.served > 0 {
            return Ok(None);
        }
        match self.bits.next() {
            Some(position) => {
                self.served += 1;
                Ok(Some(position))
            }
            None => Ok(None),
        }
    }

    async fn cleanup(&mut self) {}
}
