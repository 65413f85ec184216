//! Result collection and aggregation.
//!
//! Every dispatched task hands exactly one [`ItemOutcome`] to the completion
//! queue. A single reader drains the queue into a slot array sized to the
//! batch, one slot per submission index, then partitions the slots into a
//! [`BatchResult`]. Nothing is shared between producers besides the queue.

use tokio::sync::mpsc;

use crate::error::ItemFailure;
use crate::types::{BatchResult, BatchStatus, ItemOutcome};

/// Receiving half of a dispatched batch.
///
/// Created by [`dispatch`](super::dispatch); drained with
/// [`collect`](Self::collect) or [`collect_with`](Self::collect_with).
pub struct Dispatch<T> {
    pub(super) identifiers: Vec<String>,
    pub(super) rx: mpsc::Receiver<ItemOutcome<T>>,
}

impl<T> Dispatch<T> {
    /// Number of dispatched items
    pub fn total(&self) -> usize {
        self.identifiers.len()
    }

    /// Wait for every outcome and aggregate them
    pub async fn collect(self) -> BatchResult<T> {
        self.collect_with(|outcome| outcome).await
    }

    /// Wait for every outcome, passing each through `on_complete` in completion order.
    ///
    /// `on_complete` runs on the single reader, so it may own mutable state
    /// (the archive builder does) without synchronization. It sees each index
    /// at most once.
    pub async fn collect_with<U>(
        mut self,
        mut on_complete: impl FnMut(ItemOutcome<T>) -> ItemOutcome<U>,
    ) -> BatchResult<U> {
        let mut collector = ResultCollector::new(std::mem::take(&mut self.identifiers));

        while !collector.is_complete() {
            let Some(outcome) = self.rx.recv().await else {
                break;
            };

            if !collector.is_vacant(outcome.index) {
                tracing::error!(
                    index = outcome.index,
                    identifier = %outcome.identifier,
                    "Discarding outcome for an unknown or already filled slot"
                );
                continue;
            }

            collector.fill(on_complete(outcome));
        }

        collector.finish()
    }
}

/// Fixed-size slot array, one slot per submitted item
pub struct ResultCollector<T> {
    identifiers: Vec<String>,
    slots: Vec<Option<ItemOutcome<T>>>,
    filled: usize,
}

impl<T> ResultCollector<T> {
    /// Create an empty collector for items with these identifiers
    pub fn new(identifiers: Vec<String>) -> Self {
        let slots = std::iter::repeat_with(|| None)
            .take(identifiers.len())
            .collect();
        Self {
            identifiers,
            slots,
            filled: 0,
        }
    }

    /// Whether `index` belongs to this batch and has no outcome yet
    pub fn is_vacant(&self, index: usize) -> bool {
        matches!(self.slots.get(index), Some(None))
    }

    /// Whether every slot holds an outcome
    pub fn is_complete(&self) -> bool {
        self.filled == self.slots.len()
    }

    /// Store an outcome in its slot; returns false if the slot was not vacant
    pub fn fill(&mut self, outcome: ItemOutcome<T>) -> bool {
        if !self.is_vacant(outcome.index) {
            return false;
        }
        let index = outcome.index;
        self.slots[index] = Some(outcome);
        self.filled += 1;
        true
    }

    /// Partition the slots into a [`BatchResult`].
    ///
    /// A slot that never received an outcome (its task ended without
    /// reporting) becomes an `InternalError` failure, so the result always
    /// holds exactly one outcome per index.
    pub fn finish(self) -> BatchResult<T> {
        let total = self.slots.len();
        let mut successes = Vec::new();
        let mut failures = Vec::new();

        for (index, (slot, identifier)) in self.slots.into_iter().zip(self.identifiers).enumerate()
        {
            let outcome = slot.unwrap_or_else(|| {
                tracing::error!(index, identifier = %identifier, "Item task ended without reporting an outcome");
                ItemOutcome {
                    index,
                    identifier,
                    result: Err(ItemFailure::internal(
                        "item task ended without reporting an outcome",
                    )),
                }
            });

            if outcome.is_success() {
                successes.push(outcome);
            } else {
                failures.push(outcome);
            }
        }

        let status = BatchStatus::classify(successes.len(), failures.len());
        BatchResult {
            total,
            successes,
            failures,
            status,
        }
    }
}
