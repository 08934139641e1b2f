//! Lazy asynchronous sequence pipelines
//!
//! Pipelines are built by chaining operator recipes over a leaf source and
//! are driven by a single consumer pulling one item at a time. Obtaining an
//! iterator from a recipe always allocates fresh traversal state, so the
//! same pipeline can be traversed any number of times, concurrently or not.

pub mod core;
mod distinct;
mod filter;
mod flatten;
pub mod merge;
mod prefetch;
mod source;
mod take;
mod take_while;
mod transform;

use std::hash::Hash;
use std::sync::Arc;

use crate::errors::{Error, Result};

pub use self::core::{
    ArcSequence, AsyncIterator, AsyncSequence, BoxIterator, IterationContext, IterationMode,
    IteratorImpl, IteratorState, PipelineIterator,
};
pub use distinct::DistinctSequence;
pub use filter::FilterSequence;
pub use flatten::FlattenSequence;
pub use merge::MergeSortSequence;
pub use prefetch::PrefetchSequence;
pub use source::{BitmapSequence, VecSequence};
pub use take::TakeSequence;
pub use take_while::TakeWhileSequence;
pub use transform::TransformSequence;

/// Chaining surface over any [`AsyncSequence`]
pub trait AsyncSequenceExt: AsyncSequence + Sized {
    /// Keeps the items for which `predicate` holds
    fn filter<F>(self, predicate: F) -> FilterSequence<Self>
    where
        F: Fn(&Self::Item) -> bool + Send + Sync + 'static,
    {
        FilterSequence {
            source: self,
            predicate: Arc::new(predicate),
        }
    }

    /// Projects every item through `selector` (1:1)
    fn map<R, F>(self, selector: F) -> TransformSequence<Self, R>
    where
        R: Send + 'static,
        F: Fn(Self::Item) -> R + Send + Sync + 'static,
    {
        TransformSequence {
            source: self,
            selector: Arc::new(selector),
        }
    }

    /// Expands every item into a sub-sequence and yields the sub-items in
    /// order
    fn flat_map<R, F>(self, expander: F) -> FlattenSequence<Self, R>
    where
        R: Send + 'static,
        F: Fn(Self::Item) -> ArcSequence<R> + Send + Sync + 'static,
    {
        FlattenSequence {
            source: self,
            expander: Arc::new(expander),
        }
    }

    /// Yields items while `condition` holds; the first failing item is
    /// consumed and discarded
    fn take_while<F>(self, condition: F) -> TakeWhileSequence<Self>
    where
        F: Fn(&Self::Item) -> bool + Send + Sync + 'static,
    {
        TakeWhileSequence {
            source: self,
            condition: Arc::new(condition),
        }
    }

    /// Keeps the first occurrence of every item
    fn distinct(self) -> DistinctSequence<Self>
    where
        Self::Item: Eq + Hash + Clone + Sync,
    {
        DistinctSequence { source: self }
    }

    /// Yields at most `count` items
    fn take(self, count: usize) -> TakeSequence<Self> {
        TakeSequence {
            source: self,
            count,
        }
    }

    /// Reads ahead of the consumer, keeping up to `count` items buffered.
    /// Fails with `OutOfRange` when `count` is zero.
    fn prefetch(self, count: usize) -> Result<PrefetchSequence<Self>> {
        if count == 0 {
            return Err(Error::OutOfRange(0));
        }
        Ok(PrefetchSequence {
            source: self,
            count,
        })
    }
}

impl<S: AsyncSequence + Sized> AsyncSequenceExt for S {}

/// Drives a fresh iterator over `sequence` to the end, collecting every item
pub async fn collect<S: AsyncSequence>(
    sequence: &S,
    ctx: &IterationContext,
) -> Result<Vec<S::Item>> {
    let mut iterator = sequence.iterator(ctx);
    let mut items = Vec::new();
    while let Some(item) = iterator.next_item().await? {
        items.push(item);
    }
    Ok(items)
}

/// The first item of `sequence`, using the single-head fetch hint
pub async fn head<S: AsyncSequence>(
    sequence: &S,
    ctx: &IterationContext,
) -> Result<Option<S::Item>> {
    let ctx = IterationContext::new(IterationMode::Head, ctx.cancel.clone());
    let mut iterator = sequence.iterator(&ctx);
    let item = iterator.next_item().await?;
    iterator.dispose().await;
    Ok(item)
}
