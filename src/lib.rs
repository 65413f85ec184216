//! # docbatch
//!
//! Bulk batch operation engine for document stores.
//!
//! One request carries many items (files to upload, ids to delete, ids to
//! download); docbatch fans them out as concurrent per-item operations under a
//! bounded permit pool and a batch-wide deadline, collects exactly one outcome
//! per item, classifies the batch as all-success, partial or all-failed, and
//! for downloads packs every fetched document into a single zip archive with
//! collision-free entry names.
//!
//! ## Design Philosophy
//!
//! - **Per-item fault isolation** - one failing or panicking item never fails its siblings
//! - **Bounded parallelism** - each batch kind has its own concurrency limit
//! - **Request-scoped** - no batch state is persisted; a batch lives for one call
//! - **Library-first** - the HTTP API is optional, the engine works on any [`DocumentStore`]
//!
//! ## Quick Start
//!
//! ```no_run
//! use docbatch::{BatchService, Config, SqliteDocumentStore, UploadItem};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let store = SqliteDocumentStore::new(&config.storage).await?;
//!     let service = BatchService::new(config, Arc::new(store))?;
//!
//!     let result = service
//!         .upload_batch(vec![UploadItem {
//!             filename: "report.pdf".to_string(),
//!             content_type: Some("application/pdf".to_string()),
//!             bytes: b"%PDF-1.7".to_vec(),
//!         }])
//!         .await?;
//!
//!     println!("{:?}: {} stored", result.status, result.success_count());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Zip archive assembly for bulk downloads
pub mod archive;
/// Batch engine: gate, deadline, dispatcher, collector
pub mod batch;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Batch service over a document store
pub mod service;
/// Document store collaborator
pub mod store;
/// Core types
pub mod types;

use std::sync::Arc;

// Re-export commonly used types
pub use config::{ArchiveConfig, BatchConfig, BatchKindConfig, Config, StorageConfig};
pub use error::{
    ApiError, DatabaseError, Error, ErrorDetail, ItemErrorKind, ItemFailure, Result, StoreError,
    ToHttpStatus,
};
pub use service::BatchService;
pub use store::{DocumentStore, SqliteDocumentStore};
pub use types::{
    ArchivedEntry, BatchKind, BatchResult, BatchStatus, BatchSummary, DocumentContent,
    DocumentId, DownloadBatch, FailureEntry, ItemOutcome, StoredDocument, UploadItem,
};

/// Serve the REST API until a termination signal arrives.
///
/// On the signal the service is shut down, so running batches abort with
/// `TimeoutAborted` items and their responses still go out before the
/// server stops.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use docbatch::{BatchService, Config, SqliteDocumentStore, run_with_shutdown};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = Config::default();
///     let store = SqliteDocumentStore::new(&config.storage).await?;
///     let service = Arc::new(BatchService::new(config, Arc::new(store))?);
///
///     // Run with automatic signal handling
///     run_with_shutdown(service).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(service: Arc<BatchService>) -> Result<()> {
    api::serve_with_shutdown(service, wait_for_signal()).await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), Ok(mut sigint)) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            sigint.recv().await;
            tracing::info!("Received SIGINT signal (Ctrl+C)");
        }
        (Ok(mut sigterm), Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            sigterm.recv().await;
            tracing::info!("Received SIGTERM signal");
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "Could not register any signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
