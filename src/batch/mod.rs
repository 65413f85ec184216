//! Batch engine
//!
//! Runs one per-item operation over every item of a batch under a shared
//! [`ConcurrencyGate`] and [`DeadlineContext`], then folds the outcomes into a
//! [`BatchResult`](crate::types::BatchResult):
//!
//! - [`gate`]: counting permit pool bounding in-flight operations
//! - [`deadline`]: batch-wide time budget and cancellation
//! - [`dispatcher`]: one spawned task per item, panic-isolated
//! - [`collector`]: single reader that fills one slot per index and aggregates
//!
//! Item failures never escape as errors. Each item yields exactly one
//! [`ItemOutcome`](crate::types::ItemOutcome), whatever happens to it.

use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;

use crate::error::ItemFailure;
use crate::types::UploadItem;

pub mod collector;
pub mod deadline;
pub mod dispatcher;
pub mod gate;

pub use collector::{Dispatch, ResultCollector};
pub use deadline::DeadlineContext;
pub use dispatcher::{dispatch, run};
pub use gate::{ConcurrencyGate, ConcurrencyLimit, GatePermit};

/// An input accepted by the batch engine
pub trait BatchItem: Send + 'static {
    /// Key reported with the item's outcome (filename, raw id, ...)
    fn identifier(&self) -> String;
}

impl BatchItem for String {
    fn identifier(&self) -> String {
        self.clone()
    }
}

impl BatchItem for UploadItem {
    fn identifier(&self) -> String {
        self.filename.clone()
    }
}

/// Per-item operation run by the dispatcher
///
/// Implementations classify their own failures into [`ItemFailure`]. A panic
/// is caught by the dispatcher and reported as `InternalError` for that item
/// only. Operations that talk to slow collaborators should wrap the call in
/// [`DeadlineContext::bound`] so an expired batch does not wait on them.
#[async_trait]
pub trait ItemOperation: Send + Sync + 'static {
    /// Input type
    type Item: BatchItem;

    /// Success payload
    type Output: Send + 'static;

    /// Process one item
    async fn execute(
        &self,
        ctx: &DeadlineContext,
        item: Self::Item,
    ) -> Result<Self::Output, ItemFailure>;
}

/// [`ItemOperation`] backed by an async closure; see [`operation_fn`]
pub struct FnOperation<I, F> {
    f: F,
    _item: PhantomData<fn(I)>,
}

/// Wrap an async closure as an [`ItemOperation`]
///
/// ```
/// use docbatch::batch::{operation_fn, DeadlineContext};
/// use docbatch::ItemFailure;
///
/// let double = operation_fn(|_ctx: DeadlineContext, raw: String| async move {
///     raw.parse::<u32>()
///         .map(|n| n * 2)
///         .map_err(|e| ItemFailure::invalid_identifier(e.to_string()))
/// });
/// # let _ = double;
/// ```
pub fn operation_fn<I, F, Fut, T>(f: F) -> FnOperation<I, F>
where
    I: BatchItem,
    F: Fn(DeadlineContext, I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ItemFailure>> + Send + 'static,
    T: Send + 'static,
{
    FnOperation {
        f,
        _item: PhantomData,
    }
}

#[async_trait]
impl<I, F, Fut, T> ItemOperation for FnOperation<I, F>
where
    I: BatchItem,
    F: Fn(DeadlineContext, I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ItemFailure>> + Send + 'static,
    T: Send + 'static,
{
    type Item = I;
    type Output = T;

    async fn execute(&self, ctx: &DeadlineContext, item: I) -> Result<T, ItemFailure> {
        (self.f)(ctx.clone(), item).await
    }
}

/// Lifecycle of one batch, logged as it advances
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BatchPhase {
    /// Request accepted, gate and deadline created
    Created,
    /// Item tasks are being spawned
    Dispatching,
    /// Waiting for outcomes
    Awaiting,
    /// Building the response (archive finalization for downloads)
    Finalizing,
    /// Result handed back to the caller
    Done,
}

impl BatchPhase {
    /// Lowercase name used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchPhase::Created => "created",
            BatchPhase::Dispatching => "dispatching",
            BatchPhase::Awaiting => "awaiting",
            BatchPhase::Finalizing => "finalizing",
            BatchPhase::Done => "done",
        }
    }
}

impl std::fmt::Display for BatchPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
