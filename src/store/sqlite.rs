use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::FromRow;
use sqlx::sqlite::SqlitePool;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use super::{DocumentStore, StoreResult};
use crate::config::StorageConfig;
use crate::error::{DatabaseError, StoreError};
use crate::types::{DocumentContent, DocumentId, StoredDocument, UploadItem};
use crate::{Error, Result};

/// Distinguishes scratch files of concurrent uploads
static UPLOAD_SEQ: AtomicU64 = AtomicU64::new(0);

/// Document store backed by SQLite metadata and a blob directory
///
/// Each document is one row in `documents` plus one file `<id>.blob` under
/// the blob directory.
#[derive(Clone, Debug)]
pub struct SqliteDocumentStore {
    pool: SqlitePool,
    blob_dir: PathBuf,
}

/// Document row from the metadata database
#[derive(Debug, Clone, FromRow)]
struct DocumentRow {
    id: i64,
    name: String,
    content_type: Option<String>,
    size_bytes: i64,
    sha256: String,
    created_at: i64,
}

impl From<DocumentRow> for StoredDocument {
    fn from(row: DocumentRow) -> Self {
        StoredDocument {
            id: DocumentId(row.id),
            name: row.name,
            content_type: row.content_type,
            size_bytes: u64::try_from(row.size_bytes).unwrap_or_default(),
            sha256: row.sha256,
            created_at: DateTime::from_timestamp(row.created_at, 0).unwrap_or_default(),
        }
    }
}

impl SqliteDocumentStore {
    /// Open the store described by `config`, creating the database and blob directory if needed
    pub async fn new(config: &StorageConfig) -> Result<Self> {
        tokio::fs::create_dir_all(&config.blob_dir)
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "failed to create blob directory {}: {}",
                        config.blob_dir.display(),
                        e
                    ),
                ))
            })?;

        let pool = Self::connect(&config.database_path).await?;

        tracing::info!(
            database = %config.database_path.display(),
            blob_dir = %config.blob_dir.display(),
            "Document store ready"
        );

        Ok(Self {
            pool,
            blob_dir: config.blob_dir.clone(),
        })
    }

    /// Close the connection pool
    pub async fn close(self) {
        self.pool.close().await;
    }

    /// Get the underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Metadata of one document, if it exists
    pub async fn get(&self, id: DocumentId) -> Result<Option<StoredDocument>> {
        let row = self.find_row(id).await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get document: {}",
                e
            )))
        })?;
        Ok(row.map(StoredDocument::from))
    }

    /// Number of stored documents
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to count documents: {}",
                    e
                )))
            })?;
        Ok(count)
    }

    fn blob_path(&self, id: DocumentId) -> PathBuf {
        self.blob_dir.join(format!("{}.blob", id))
    }

    async fn find_row(&self, id: DocumentId) -> StoreResult<Option<DocumentRow>> {
        let row = sqlx::query_as::<_, DocumentRow>(
            r#"
            SELECT id, name, content_type, size_bytes, sha256, created_at
            FROM documents
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Scratch path for an upload whose id is not known yet
    fn partial_path(&self) -> PathBuf {
        let seq = UPLOAD_SEQ.fetch_add(1, Ordering::Relaxed);
        self.blob_dir
            .join(format!("upload-{}-{}.partial", std::process::id(), seq))
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn store(&self, item: UploadItem) -> StoreResult<StoredDocument> {
        let name = item.filename.trim();
        if name.is_empty() {
            return Err(StoreError::InvalidDocument(
                "file name must not be empty".to_string(),
            ));
        }

        let sha256 = hex_digest(&item.bytes);
        let size_bytes = i64::try_from(item.bytes.len())
            .map_err(|_| StoreError::InvalidDocument("file is too large".to_string()))?;
        let created_at = Utc::now().timestamp();

        // Content goes to disk before the metadata transaction, so the write
        // lock is only held for the insert and the rename.
        let mut pending = PendingBlob::new(self.partial_path());
        tokio::fs::write(&pending.partial, &item.bytes)
            .await
            .map_err(|e| {
                tracing::warn!(name, error = %e, "Blob write failed");
                StoreError::Storage(format!("failed to write content of '{}': {}", name, e))
            })?;

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            r#"
            INSERT INTO documents (name, content_type, size_bytes, sha256, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(name)
        .bind(&item.content_type)
        .bind(size_bytes)
        .bind(&sha256)
        .bind(created_at)
        .execute(&mut *tx)
        .await?;

        let id = DocumentId(result.last_insert_rowid());
        let target = self.blob_path(id);
        pending.target = Some(target.clone());

        // An early return or cancellation before the commit drops `tx`, which
        // rolls the row back, and `pending`, which removes the files.
        tokio::fs::rename(&pending.partial, &target)
            .await
            .map_err(|e| {
                tracing::warn!(document_id = id.0, error = %e, "Blob rename failed, rolling back metadata row");
                StoreError::Storage(format!("failed to write content of '{}': {}", name, e))
            })?;
        // A commit interrupted after it reached the database keeps the blob
        pending.committed = true;
        if let Err(e) = tx.commit().await {
            pending.committed = false;
            return Err(e.into());
        }

        tracing::debug!(document_id = id.0, name, size_bytes, "Stored document");

        Ok(StoredDocument {
            id,
            name: name.to_string(),
            content_type: item.content_type,
            size_bytes: item.bytes.len() as u64,
            sha256,
            created_at: DateTime::from_timestamp(created_at, 0).unwrap_or_default(),
        })
    }

    async fn delete(&self, id: DocumentId) -> StoreResult<()> {
        // Row first: once it is gone the document is deleted, and a blob left
        // behind by an interrupted delete is never served.
        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }

        match tokio::fs::remove_file(self.blob_path(id)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(document_id = id.0, "Blob already gone, removed metadata only");
            }
            Err(e) => {
                tracing::warn!(document_id = id.0, error = %e, "Document deleted but its blob could not be removed");
            }
        }

        tracing::debug!(document_id = id.0, "Deleted document");
        Ok(())
    }

    async fn fetch(&self, id: DocumentId) -> StoreResult<DocumentContent> {
        let row = self.find_row(id).await?.ok_or(StoreError::NotFound(id))?;

        let bytes = match tokio::fs::read(self.blob_path(id)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::Storage(format!(
                    "content of document {} is missing",
                    id
                )));
            }
            Err(e) => return Err(StoreError::Io(e)),
        };

        Ok(DocumentContent {
            name: row.name,
            content_type: row.content_type,
            bytes,
        })
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}

/// Blob files of an upload that has not committed yet.
///
/// Dropping it before `committed` is set removes the scratch file and, once
/// the rename happened, the renamed blob.
struct PendingBlob {
    partial: PathBuf,
    target: Option<PathBuf>,
    committed: bool,
}

impl PendingBlob {
    fn new(partial: PathBuf) -> Self {
        Self {
            partial,
            target: None,
            committed: false,
        }
    }
}

impl Drop for PendingBlob {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        for path in std::iter::once(&self.partial).chain(self.target.as_ref()) {
            match std::fs::remove_file(path) {
                Ok(()) => tracing::debug!(path = %path.display(), "Removed uncommitted blob"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to remove uncommitted blob")
                }
            }
        }
    }
}

/// Lowercase hex SHA-256 of `bytes`
fn hex_digest(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}
