//! Batch service
//!
//! Binds configuration, a [`DocumentStore`] and a shutdown token, and runs
//! upload, delete and download batches through the batch engine. Each batch
//! gets its own [`ConcurrencyGate`] and [`DeadlineContext`] built from the
//! policy of its kind; the deadline is a child of the service's shutdown
//! token, so [`BatchService::shutdown`] aborts every running batch.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::archive::ArchiveBuilder;
use crate::batch::{BatchPhase, ConcurrencyGate, DeadlineContext, Dispatch, dispatch};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::store::DocumentStore;
use crate::types::{
    BatchKind, BatchResult, DocumentId, DownloadBatch, StoredDocument, UploadItem,
};

mod operations;

pub use operations::{DeleteOperation, DownloadOperation, UploadOperation};

/// Entry point for bulk document operations
#[derive(Clone)]
pub struct BatchService {
    store: Arc<dyn DocumentStore>,
    config: Arc<Config>,
    shutdown: CancellationToken,
}

impl BatchService {
    /// Create a service over `store`
    ///
    /// Fails if `config` does not validate.
    pub fn new(config: Config, store: Arc<dyn DocumentStore>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            config: Arc::new(config),
            shutdown: CancellationToken::new(),
        })
    }

    /// Active configuration
    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    /// The backing document store
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Token cancelled when the service shuts down
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Whether [`shutdown`](Self::shutdown) has been called
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Stop accepting batches and abort the running ones.
    ///
    /// Items still waiting for a permit, or inside a deadline-bound store
    /// call, finish with `TimeoutAborted`.
    pub fn shutdown(&self) {
        if !self.shutdown.is_cancelled() {
            info!("Batch service shutting down, cancelling running batches");
            self.shutdown.cancel();
        }
    }

    /// Store every file; one outcome per file, in submission order
    pub async fn upload_batch(&self, items: Vec<UploadItem>) -> Result<BatchResult<StoredDocument>> {
        let started = Instant::now();
        let (gate, ctx) = self.prepare(BatchKind::Upload, items.len())?;

        enter_phase(BatchKind::Upload, BatchPhase::Dispatching);
        let pending = dispatch(
            items,
            Arc::new(UploadOperation::new(Arc::clone(&self.store))),
            &gate,
            &ctx,
        );

        let result = await_outcomes(BatchKind::Upload, pending).await;
        enter_phase(BatchKind::Upload, BatchPhase::Finalizing);
        log_result(BatchKind::Upload, &result, started);
        enter_phase(BatchKind::Upload, BatchPhase::Done);
        Ok(result)
    }

    /// Delete every id; malformed ids fail individually with `InvalidIdentifier`
    pub async fn delete_batch(&self, ids: Vec<String>) -> Result<BatchResult<DocumentId>> {
        let started = Instant::now();
        let (gate, ctx) = self.prepare(BatchKind::Delete, ids.len())?;

        enter_phase(BatchKind::Delete, BatchPhase::Dispatching);
        let pending = dispatch(
            ids,
            Arc::new(DeleteOperation::new(Arc::clone(&self.store))),
            &gate,
            &ctx,
        );

        let result = await_outcomes(BatchKind::Delete, pending).await;
        enter_phase(BatchKind::Delete, BatchPhase::Finalizing);
        log_result(BatchKind::Delete, &result, started);
        enter_phase(BatchKind::Delete, BatchPhase::Done);
        Ok(result)
    }

    /// Fetch every id and pack the fetched documents into one zip archive.
    ///
    /// Documents are written as they arrive. `archive` is `None` when nothing
    /// could be fetched. Failing to finalize the archive fails the whole batch
    /// with [`Error::Archive`].
    pub async fn download_batch(&self, ids: Vec<String>) -> Result<DownloadBatch> {
        let started = Instant::now();
        let (gate, ctx) = self.prepare(BatchKind::Download, ids.len())?;

        enter_phase(BatchKind::Download, BatchPhase::Dispatching);
        let pending = dispatch(
            ids,
            Arc::new(DownloadOperation::new(Arc::clone(&self.store))),
            &gate,
            &ctx,
        );

        let mut builder = ArchiveBuilder::new(&self.config.batch.archive);
        enter_phase(BatchKind::Download, BatchPhase::Awaiting);
        let result = pending.collect_with(|outcome| builder.add(outcome)).await;

        enter_phase(BatchKind::Download, BatchPhase::Finalizing);
        let entries = builder.entry_count();
        let archive = builder.finish()?;
        debug!(
            batch_kind = %BatchKind::Download,
            entries,
            archive_bytes = archive.as_ref().map_or(0, Vec::len),
            "Archive finalized"
        );

        log_result(BatchKind::Download, &result, started);
        enter_phase(BatchKind::Download, BatchPhase::Done);
        Ok(DownloadBatch { archive, result })
    }

    /// Reject batches that must not be dispatched and build the batch's gate and deadline
    fn prepare(&self, kind: BatchKind, count: usize) -> Result<(ConcurrencyGate, DeadlineContext)> {
        if self.is_shutting_down() {
            return Err(Error::ShuttingDown);
        }

        let policy = self.config.batch.for_kind(kind);
        if count == 0 {
            return Err(Error::EmptyBatch { kind });
        }
        if count > policy.max_items {
            return Err(Error::BatchTooLarge {
                kind,
                max: policy.max_items,
                actual: count,
            });
        }

        let gate = ConcurrencyGate::bounded(policy.max_concurrency);
        let ctx = DeadlineContext::with_parent(policy.deadline, &self.shutdown);

        info!(
            batch_kind = %kind,
            total = count,
            max_concurrency = policy.max_concurrency,
            deadline_secs = policy.deadline.as_secs(),
            "Starting batch"
        );
        enter_phase(kind, BatchPhase::Created);

        Ok((gate, ctx))
    }
}

async fn await_outcomes<T>(kind: BatchKind, pending: Dispatch<T>) -> BatchResult<T> {
    enter_phase(kind, BatchPhase::Awaiting);
    pending.collect().await
}

fn enter_phase(kind: BatchKind, phase: BatchPhase) {
    debug!(batch_kind = %kind, phase = %phase, "Batch phase");
}

fn log_result<T>(kind: BatchKind, result: &BatchResult<T>, started: Instant) {
    for failure in result.failure_entries() {
        warn!(
            batch_kind = %kind,
            index = failure.index,
            identifier = %failure.identifier,
            kind = %failure.kind,
            error = %failure.message,
            "Batch item failed"
        );
    }

    info!(
        batch_kind = %kind,
        total = result.total,
        succeeded = result.success_count(),
        failed = result.failure_count(),
        status = result.status.as_str(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Batch finished"
    );
}
