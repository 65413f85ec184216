//! Error types for docbatch
//!
//! This module provides error handling for the library, including:
//! - The crate-level [`Error`] used by the service and API layers
//! - The closed per-item taxonomy ([`ItemErrorKind`], [`ItemFailure`]) that
//!   every batch outcome is classified into
//! - Document store collaborator errors ([`StoreError`]) and their mapping
//!   onto the per-item taxonomy
//! - HTTP status code mapping and structured JSON error bodies for the API

use crate::types::{BatchKind, DocumentId, FailureEntry};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for docbatch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for docbatch
///
/// Per-item problems never surface here; they are captured as [`ItemFailure`]s
/// inside a batch result. This type covers request-level and batch-level
/// failures only.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "batch.upload.max_concurrency")
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed batch request (missing fields, unreadable upload, etc.)
    #[error("validation error: {0}")]
    Validation(String),

    /// Batch request carried no items
    #[error("{kind} batch contains no items")]
    EmptyBatch {
        /// Which batch kind was requested
        kind: BatchKind,
    },

    /// Batch request exceeds the configured item limit
    #[error("{kind} batch has {actual} items, maximum is {max}")]
    BatchTooLarge {
        /// Which batch kind was requested
        kind: BatchKind,
        /// Configured maximum number of items
        max: usize,
        /// Number of items in the request
        actual: usize,
    },

    /// The download archive could not be finalized
    #[error("archive error: {0}")]
    Archive(String),

    /// Every item in the batch failed
    #[error("all {total} {kind} operations failed")]
    BatchFailed {
        /// Which batch kind was requested
        kind: BatchKind,
        /// Number of items in the batch
        total: usize,
        /// Itemized failures, ordered by submission index
        failures: Vec<FailureEntry>,
    },

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Shutdown in progress - not accepting new batches
    #[error("shutdown in progress: not accepting new batches")]
    ShuttingDown,
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),
}

/// Errors raised by a [`DocumentStore`](crate::store::DocumentStore) collaborator
#[derive(Debug, Error)]
pub enum StoreError {
    /// No document with this id exists (or the caller may not see it)
    #[error("document {0} not found")]
    NotFound(DocumentId),

    /// The store refused the document (empty name, unusable content, etc.)
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// Backend failure not covered by the other variants
    #[error("storage backend error: {0}")]
    Storage(String),

    /// Blob read/write failed
    #[error("blob I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Metadata query failed
    #[error("metadata query failed: {0}")]
    Database(#[from] sqlx::Error),
}

/// Closed taxonomy of per-item failures
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ItemErrorKind {
    /// The item's identifier or payload is malformed
    InvalidIdentifier,
    /// The document does not exist or the caller may not access it
    NotFoundOrAccessDenied,
    /// The storage collaborator failed
    StorageError,
    /// The batch deadline expired (or the batch was cancelled) before the item finished
    TimeoutAborted,
    /// Anything else, including a panic inside the per-item operation
    InternalError,
}

impl ItemErrorKind {
    /// Machine-readable code used in API bodies
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemErrorKind::InvalidIdentifier => "invalid_identifier",
            ItemErrorKind::NotFoundOrAccessDenied => "not_found_or_access_denied",
            ItemErrorKind::StorageError => "storage_error",
            ItemErrorKind::TimeoutAborted => "timeout_aborted",
            ItemErrorKind::InternalError => "internal_error",
        }
    }

    /// HTTP status a request would carry if every item failed with this kind
    pub fn status_code(&self) -> u16 {
        match self {
            ItemErrorKind::InvalidIdentifier => 400,
            ItemErrorKind::NotFoundOrAccessDenied => 404,
            ItemErrorKind::StorageError => 502,
            ItemErrorKind::TimeoutAborted => 504,
            ItemErrorKind::InternalError => 500,
        }
    }
}

impl std::fmt::Display for ItemErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a single batch item
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ItemFailure {
    /// Classification of the failure
    pub kind: ItemErrorKind,
    /// Human-readable detail
    pub message: String,
}

impl ItemFailure {
    /// Create a failure of the given kind
    pub fn new(kind: ItemErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Malformed identifier or payload
    pub fn invalid_identifier(message: impl Into<String>) -> Self {
        Self::new(ItemErrorKind::InvalidIdentifier, message)
    }

    /// Missing document or denied access
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ItemErrorKind::NotFoundOrAccessDenied, message)
    }

    /// Storage collaborator failure
    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ItemErrorKind::StorageError, message)
    }

    /// Deadline expired or batch cancelled
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ItemErrorKind::TimeoutAborted, message)
    }

    /// Unexpected failure
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ItemErrorKind::InternalError, message)
    }
}

impl std::fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ItemFailure {}

impl From<StoreError> for ItemFailure {
    fn from(error: StoreError) -> Self {
        let message = error.to_string();
        match error {
            StoreError::NotFound(_) => ItemFailure::not_found(message),
            StoreError::InvalidDocument(_) => ItemFailure::invalid_identifier(message),
            StoreError::Io(ref e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied
                ) =>
            {
                ItemFailure::not_found(message)
            }
            StoreError::Storage(_) | StoreError::Io(_) | StoreError::Database(_) => {
                ItemFailure::storage(message)
            }
        }
    }
}

/// API error response format
///
/// This structure is returned by API endpoints when an error occurs.
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "batch_failed",
///     "message": "all 2 delete operations failed",
///     "details": {
///       "batch_kind": "delete",
///       "total": 2,
///       "failures": [
///         { "index": 0, "identifier": "x", "kind": "invalid_identifier", "message": "..." }
///       ]
///     }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "batch_failed", "validation_error")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - Client error (invalid input)
            Error::Config { .. } => 400,
            Error::Validation(_) => 400,
            Error::EmptyBatch { .. } => 400,

            // 413 Payload Too Large
            Error::BatchTooLarge { .. } => 413,

            // Follows the failure kinds of the batch
            Error::BatchFailed { failures, .. } => batch_failure_status(failures),

            // 500 Internal Server Error - Server-side issues
            Error::Database(_) => 500,
            Error::Io(_) => 500,
            Error::Archive(_) => 500,
            Error::ApiServerError(_) => 500,

            // 503 Service Unavailable
            Error::ShuttingDown => 503,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Database(_) => "database_error",
            Error::Io(_) => "io_error",
            Error::Validation(_) => "validation_error",
            Error::EmptyBatch { .. } => "empty_batch",
            Error::BatchTooLarge { .. } => "batch_too_large",
            Error::Archive(_) => "archive_error",
            Error::BatchFailed { .. } => "batch_failed",
            Error::ApiServerError(_) => "api_server_error",
            Error::ShuttingDown => "shutting_down",
        }
    }
}

/// A batch where every item failed the same way reports that kind's status;
/// mixed failures report 500.
fn batch_failure_status(failures: &[FailureEntry]) -> u16 {
    let mut kinds = failures.iter().map(|f| f.kind);
    match kinds.next() {
        Some(first) if kinds.all(|k| k == first) => first.status_code(),
        _ => 500,
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({
                "key": key,
            })),
            Error::BatchTooLarge { kind, max, actual } => Some(serde_json::json!({
                "batch_kind": kind,
                "max_items": max,
                "actual_items": actual,
            })),
            Error::BatchFailed {
                kind,
                total,
                failures,
            } => Some(serde_json::json!({
                "batch_kind": kind,
                "total": total,
                "failures": failures,
            })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn failure(index: usize, kind: ItemErrorKind) -> FailureEntry {
        FailureEntry {
            index,
            identifier: format!("item-{index}"),
            kind,
            message: "boom".into(),
        }
    }

    #[test]
    fn store_errors_map_onto_item_taxonomy() {
        let cases = [
            (
                StoreError::NotFound(DocumentId(7)),
                ItemErrorKind::NotFoundOrAccessDenied,
            ),
            (
                StoreError::InvalidDocument("empty name".into()),
                ItemErrorKind::InvalidIdentifier,
            ),
            (
                StoreError::Storage("disk full".into()),
                ItemErrorKind::StorageError,
            ),
            (
                StoreError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone")),
                ItemErrorKind::NotFoundOrAccessDenied,
            ),
            (
                StoreError::Io(std::io::Error::other("broken pipe")),
                ItemErrorKind::StorageError,
            ),
        ];

        for (error, expected) in cases {
            let rendered = error.to_string();
            let failure: ItemFailure = error.into();
            assert_eq!(failure.kind, expected, "{rendered} should map to {expected}");
            assert_eq!(failure.message, rendered);
        }
    }

    #[test]
    fn item_error_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ItemErrorKind::NotFoundOrAccessDenied).unwrap();
        assert_eq!(json, "\"not_found_or_access_denied\"");
        assert_eq!(
            ItemErrorKind::TimeoutAborted.to_string(),
            ItemErrorKind::TimeoutAborted.as_str()
        );
    }

    #[test]
    fn request_level_errors_have_expected_status() {
        let cases: Vec<(Error, u16, &str)> = vec![
            (
                Error::Config {
                    message: "zero".into(),
                    key: Some("batch.delete.max_concurrency".into()),
                },
                400,
                "config_error",
            ),
            (Error::Validation("no files".into()), 400, "validation_error"),
            (
                Error::EmptyBatch {
                    kind: BatchKind::Delete,
                },
                400,
                "empty_batch",
            ),
            (
                Error::BatchTooLarge {
                    kind: BatchKind::Upload,
                    max: 2,
                    actual: 3,
                },
                413,
                "batch_too_large",
            ),
            (Error::Archive("finish failed".into()), 500, "archive_error"),
            (Error::ShuttingDown, 503, "shutting_down"),
        ];

        for (error, status, code) in cases {
            assert_eq!(error.status_code(), status, "{error}");
            assert_eq!(error.error_code(), code, "{error}");
        }
    }

    #[test]
    fn batch_failed_status_follows_uniform_kind() {
        let uniform = Error::BatchFailed {
            kind: BatchKind::Download,
            total: 2,
            failures: vec![
                failure(0, ItemErrorKind::NotFoundOrAccessDenied),
                failure(1, ItemErrorKind::NotFoundOrAccessDenied),
            ],
        };
        assert_eq!(uniform.status_code(), 404);

        let timed_out = Error::BatchFailed {
            kind: BatchKind::Upload,
            total: 1,
            failures: vec![failure(0, ItemErrorKind::TimeoutAborted)],
        };
        assert_eq!(timed_out.status_code(), 504);

        let mixed = Error::BatchFailed {
            kind: BatchKind::Delete,
            total: 2,
            failures: vec![
                failure(0, ItemErrorKind::InvalidIdentifier),
                failure(1, ItemErrorKind::StorageError),
            ],
        };
        assert_eq!(mixed.status_code(), 500);
    }

    #[test]
    fn batch_failed_api_error_itemizes_failures() {
        let error = Error::BatchFailed {
            kind: BatchKind::Delete,
            total: 1,
            failures: vec![failure(0, ItemErrorKind::InvalidIdentifier)],
        };
        let api_error: ApiError = error.into();

        assert_eq!(api_error.error.code, "batch_failed");
        assert!(api_error.error.message.contains("all 1 delete operations failed"));

        let details = api_error.error.details.unwrap();
        assert_eq!(details["batch_kind"], "delete");
        assert_eq!(details["failures"][0]["identifier"], "item-0");
        assert_eq!(details["failures"][0]["kind"], "invalid_identifier");
    }
}
