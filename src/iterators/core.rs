//! Lifecycle state machine shared by every pipeline operator
//!
//! A pipeline is described by an immutable recipe ([`AsyncSequence`]);
//! obtaining an iterator always allocates a fresh traversal-state object, so
//! any number of traversals can run independently over the same recipe.
//! Operator authors implement [`IteratorImpl`] (`on_first` / `on_next` /
//! `cleanup`) and wrap it in a [`PipelineIterator`], which owns the state
//! transitions, the cancellation checks and the exactly-once cleanup
//! guarantee.

use async_trait::async_trait;
use derivative::Derivative;
use tokio_util::sync::CancellationToken;

use crate::errors::{Error, Result};

/// How the consumer intends to drive the iterator: a single head lookup or
/// a full traversal. Sources may use the hint to pick a cheaper fetch mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationMode {
    Head,
    Full,
}

/// Immutable per-traversal context threaded through a whole pipeline
#[derive(Derivative, Clone)]
#[derivative(Default)]
pub struct IterationContext {
    #[derivative(Default(value = "IterationMode::Full"))]
    pub mode: IterationMode,

    /// One cancellation signal for the whole pipeline, checked at the top of
    /// every suspension point
    #[derivative(Default(value = "CancellationToken::new()"))]
    pub cancel: CancellationToken,
}

impl IterationContext {
    pub fn new(mode: IterationMode, cancel: CancellationToken) -> Self {
        Self { mode, cancel }
    }

    /// Fails with `Cancelled` if the signal has fired
    pub fn ensure_active(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Lifecycle of one iterator instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IteratorState {
    /// Allocated, not yet driven
    Sequential,
    /// Inside the first pull
    Initializing,
    /// Producing values; `current` is readable
    Iterating,
    /// Source exhausted cleanly
    Completed,
    /// Resources released (explicitly, on fault or on cancellation)
    Disposed,
}

/// Pull-based asynchronous iterator.
///
/// Pulls are not re-entrant: the single consumer awaits each `advance`
/// before issuing the next one (`&mut self` makes a concurrent pull
/// unrepresentable).
#[async_trait]
pub trait AsyncIterator: Send {
    type Item: Send + 'static;

    /// Moves to the next item. Returns false on clean exhaustion; fails with
    /// `Cancelled` when the signal fired and with `Disposed` once disposed.
    async fn advance(&mut self) -> Result<bool>;

    /// The item published by the last successful `advance`; only readable
    /// while the iterator is iterating
    fn current(&self) -> Result<&Self::Item>;

    /// Moves the published item out, leaving the slot empty until the next
    /// `advance`
    fn take_current(&mut self) -> Result<Self::Item>;

    /// Releases resources; idempotent, runs cleanup at most once
    async fn dispose(&mut self);

    /// Convenience pull: advance then take
    async fn next_item(&mut self) -> Result<Option<Self::Item>> {
        if self.advance().await? {
            Ok(Some(self.take_current()?))
        } else {
            Ok(None)
        }
    }
}

/// A boxed iterator, the form operators hold their upstream in
pub type BoxIterator<T> = Box<dyn AsyncIterator<Item = T>>;

#[async_trait]
impl<T: Send + 'static> AsyncIterator for BoxIterator<T> {
    type Item = T;

    async fn advance(&mut self) -> Result<bool> {
        (**self).advance().await
    }

    fn current(&self) -> Result<&T> {
        (**self).current()
    }

    fn take_current(&mut self) -> Result<T> {
        (**self).take_current()
    }

    async fn dispose(&mut self) {
        (**self).dispose().await
    }
}

/// An immutable pipeline recipe: holds the configuration (source references,
/// delegates, comparers) and hands out fresh, independent iterators
pub trait AsyncSequence: Send + Sync {
    type Item: Send + 'static;

    fn iterator(&self, ctx: &IterationContext) -> BoxIterator<Self::Item>;
}

/// A shared recipe, the form operators hold their upstream sequence in
pub type ArcSequence<T> = std::sync::Arc<dyn AsyncSequence<Item = T>>;

impl<S: AsyncSequence + ?Sized> AsyncSequence for std::sync::Arc<S> {
    type Item = S::Item;

    fn iterator(&self, ctx: &IterationContext) -> BoxIterator<Self::Item> {
        (**self).iterator(ctx)
    }
}

/// Operator body driven by a [`PipelineIterator`].
///
/// `on_first` runs once before the first value is produced and reports
/// whether the source may produce anything at all; `on_next` produces the
/// successive values; `cleanup` releases the upstream resources and must
/// tolerate being the only call that ever happens.
#[async_trait]
pub trait IteratorImpl: Send {
    type Item: Send + 'static;

    async fn on_first(&mut self, ctx: &IterationContext) -> Result<bool>;

    async fn on_next(&mut self, ctx: &IterationContext) -> Result<Option<Self::Item>>;

    async fn cleanup(&mut self);
}

/// Drives an [`IteratorImpl`] through the iterator lifecycle.
///
/// State transitions are monotonic; `Completed` and `Disposed` are terminal.
/// Cleanup runs exactly once whatever the exit path (completion, fault,
/// cancellation or explicit disposal) — tracked by a flag, since exclusive
/// ownership already rules out concurrent disposal attempts.
pub struct PipelineIterator<Op: IteratorImpl> {
    op: Op,
    ctx: IterationContext,
    state: IteratorState,
    current: Option<Op::Item>,
    cleaned: bool,
}

impl<Op: IteratorImpl> PipelineIterator<Op> {
    pub fn new(op: Op, ctx: IterationContext) -> Self {
        Self {
            op,
            ctx,
            state: IteratorState::Sequential,
            current: None,
            cleaned: false,
        }
    }

    pub fn state(&self) -> IteratorState {
        self.state
    }

    async fn run_cleanup(&mut self) {
        if !self.cleaned {
            self.cleaned = true;
            self.op.cleanup().await;
        }
    }

    /// Fault/cancellation exit: release resources, then let the error
    /// surface to the caller
    async fn fail(&mut self) {
        self.current = None;
        self.run_cleanup().await;
        self.state = IteratorState::Disposed;
    }
}

#[async_trait]
impl<Op: IteratorImpl> AsyncIterator for PipelineIterator<Op> {
    type Item = Op::Item;

    async fn advance(&mut self) -> Result<bool> {
        match self.state {
            IteratorState::Disposed => return Err(Error::Disposed),
            IteratorState::Completed => return Ok(false),
            _ => {}
        }

        if self.ctx.cancel.is_cancelled() {
            self.fail().await;
            return Err(Error::Cancelled);
        }

        if self.state == IteratorState::Sequential {
            self.state = IteratorState::Initializing;
            match self.op.on_first(&self.ctx).await {
                Ok(true) => self.state = IteratorState::Iterating,
                Ok(false) => {
                    self.run_cleanup().await;
                    self.state = IteratorState::Completed;
                    return Ok(false);
                }
                Err(err) => {
                    self.fail().await;
                    return Err(err);
                }
            }
        }

        match self.op.on_next(&self.ctx).await {
            Ok(Some(item)) => {
                self.current = Some(item);
                Ok(true)
            }
            Ok(None) => {
                self.current = None;
                self.run_cleanup().await;
                self.state = IteratorState::Completed;
                Ok(false)
            }
            Err(err) => {
                self.fail().await;
                Err(err)
            }
        }
    }

    fn current(&self) -> Result<&Op::Item> {
        match self.state {
            IteratorState::Iterating => self
                .current
                .as_ref()
                .ok_or(Error::InvalidState("the current item has been taken")),
            IteratorState::Disposed => Err(Error::Disposed),
            _ => Err(Error::InvalidState("the iterator is not producing values")),
        }
    }

    fn take_current(&mut self) -> Result<Op::Item> {
        match self.state {
            IteratorState::Iterating => self
                .current
                .take()
                .ok_or(Error::InvalidState("the current item has been taken")),
            IteratorState::Disposed => Err(Error::Disposed),
            _ => Err(Error::InvalidState("the iterator is not producing values")),
        }
    }

    async fn dispose(&mut self) {
        if self.state == IteratorState::Disposed {
            return;
        }
        self.current = None;
        self.run_cleanup().await;
        self.state = IteratorState::Disposed;
    }
}
