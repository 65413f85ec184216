//! Document store collaborator
//!
//! The per-item operations of every batch kind delegate to a [`DocumentStore`].
//! Its errors are opaque to the batch engine: each one is classified into the
//! per-item taxonomy through `From<StoreError> for ItemFailure`.
//!
//! [`SqliteDocumentStore`] keeps metadata in SQLite and content in a blob
//! directory.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::types::{DocumentContent, DocumentId, StoredDocument, UploadItem};

mod migrations;
mod sqlite;

pub use sqlite::SqliteDocumentStore;

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Persistence backend used by batch operations
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Persist one uploaded file and describe what was stored
    async fn store(&self, item: UploadItem) -> StoreResult<StoredDocument>;

    /// Remove one document
    ///
    /// Fails with [`StoreError::NotFound`] if the id is unknown.
    async fn delete(&self, id: DocumentId) -> StoreResult<()>;

    /// Read one document's display name and content
    async fn fetch(&self, id: DocumentId) -> StoreResult<DocumentContent>;

    /// Human-readable backend name for logging
    fn name(&self) -> &str;
}
