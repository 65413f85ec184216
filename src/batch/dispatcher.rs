//! Task dispatcher: one spawned task per item.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc;

use super::collector::Dispatch;
use super::deadline::DeadlineContext;
use super::gate::ConcurrencyGate;
use super::{BatchItem, ItemOperation};
use crate::error::ItemFailure;
use crate::types::{BatchResult, ItemOutcome};

/// Spawn one task per item and return the receiving half of the batch.
///
/// Each task waits for a gate permit, runs `operation` with the shared
/// context, releases the permit and reports exactly one outcome. A task still
/// waiting for a permit when the context expires gives up with
/// `TimeoutAborted` without running the operation. Items in flight are not
/// interrupted here; the deadline only cuts them short where the operation
/// observes it.
///
/// Must be called from within a Tokio runtime.
pub fn dispatch<O>(
    items: Vec<O::Item>,
    operation: Arc<O>,
    gate: &ConcurrencyGate,
    ctx: &DeadlineContext,
) -> Dispatch<O::Output>
where
    O: ItemOperation,
{
    let total = items.len();
    let (tx, rx) = mpsc::channel(total.max(1));
    let identifiers: Vec<String> = items.iter().map(BatchItem::identifier).collect();

    tracing::debug!(
        total,
        limit = ?gate.limit().get(),
        remaining_ms = ctx.remaining().as_millis() as u64,
        "Dispatching batch items"
    );

    for (index, (item, identifier)) in items.into_iter().zip(identifiers.iter().cloned()).enumerate()
    {
        let operation = Arc::clone(&operation);
        let gate = gate.clone();
        let ctx = ctx.clone();
        let tx = tx.clone();

        tokio::spawn(async move {
            tracing::trace!(index, identifier = %identifier, "Item pending");
            let result = run_item(operation.as_ref(), &gate, &ctx, index, item).await;

            if let Err(failure) = &result {
                tracing::debug!(
                    index,
                    identifier = %identifier,
                    kind = %failure.kind,
                    error = %failure.message,
                    "Item failed"
                );
            } else {
                tracing::trace!(index, identifier = %identifier, "Item completed");
            }

            let outcome = ItemOutcome {
                index,
                identifier,
                result,
            };
            if tx.send(outcome).await.is_err() {
                tracing::warn!(index, "Batch reader gone, dropping item outcome");
            }
        });
    }

    Dispatch { identifiers, rx }
}

/// Dispatch every item and wait for the aggregated result
pub async fn run<O>(
    items: Vec<O::Item>,
    operation: Arc<O>,
    gate: &ConcurrencyGate,
    ctx: &DeadlineContext,
) -> BatchResult<O::Output>
where
    O: ItemOperation,
{
    dispatch(items, operation, gate, ctx).collect().await
}

async fn run_item<O>(
    operation: &O,
    gate: &ConcurrencyGate,
    ctx: &DeadlineContext,
    index: usize,
    item: O::Item,
) -> Result<O::Output, ItemFailure>
where
    O: ItemOperation,
{
    ctx.check()?;

    let permit = tokio::select! {
        biased;
        permit = gate.acquire() => permit?,
        _ = ctx.expired() => return Err(ctx.abort_failure()),
    };
    ctx.check()?;

    tracing::trace!(index, "Item in flight");
    let result = AssertUnwindSafe(operation.execute(ctx, item))
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| {
            let message = panic_message(panic.as_ref());
            tracing::error!(index, panic = %message, "Item operation panicked");
            Err(ItemFailure::internal(format!(
                "item operation panicked: {message}"
            )))
        });

    // Free the slot before the outcome is published
    drop(permit);
    result
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
