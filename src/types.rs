//! Core types shared by the batch engine, the document store and the API

use crate::error::{ItemErrorKind, ItemFailure};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Unique identifier for a stored document
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(transparent)]
pub struct DocumentId(pub i64);

impl DocumentId {
    /// Create a new DocumentId
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner i64 value
    pub fn get(&self) -> i64 {
        self.0
    }

    /// Parse a client-supplied identifier.
    ///
    /// Only positive decimal integers are valid; anything else is reported as
    /// [`ItemErrorKind::InvalidIdentifier`].
    pub fn parse(raw: &str) -> Result<Self, ItemFailure> {
        match raw.trim().parse::<i64>() {
            Ok(id) if id > 0 => Ok(Self(id)),
            _ => Err(ItemFailure::invalid_identifier(format!(
                "'{raw}' is not a valid document id"
            ))),
        }
    }
}

impl From<i64> for DocumentId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<DocumentId> for i64 {
    fn from(id: DocumentId) -> Self {
        id.0
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl sqlx::Type<sqlx::Sqlite> for DocumentId {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <i64 as sqlx::Type<sqlx::Sqlite>>::type_info()
    }

    fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
        <i64 as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for DocumentId {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        sqlx::Encode::<sqlx::Sqlite>::encode_by_ref(&self.0, buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for DocumentId {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let id = <i64 as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        Ok(Self(id))
    }
}

/// Kind of bulk operation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BatchKind {
    /// Store many files
    Upload,
    /// Delete many documents by id
    Delete,
    /// Fetch many documents into one archive
    Download,
}

impl BatchKind {
    /// Lowercase name used in logs and API bodies
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchKind::Upload => "upload",
            BatchKind::Delete => "delete",
            BatchKind::Download => "download",
        }
    }
}

impl std::fmt::Display for BatchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate classification of a finished batch
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Every item succeeded
    AllSuccess,
    /// At least one success and at least one failure
    Partial,
    /// No item succeeded
    AllFailed,
}

impl BatchStatus {
    /// Classify a batch from its success and failure counts
    pub fn classify(successes: usize, failures: usize) -> Self {
        if successes == 0 {
            BatchStatus::AllFailed
        } else if failures == 0 {
            BatchStatus::AllSuccess
        } else {
            BatchStatus::Partial
        }
    }

    /// snake_case name, as serialized
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::AllSuccess => "all_success",
            BatchStatus::Partial => "partial",
            BatchStatus::AllFailed => "all_failed",
        }
    }
}

/// Outcome of one batch item
#[derive(Clone, Debug, PartialEq)]
pub struct ItemOutcome<T> {
    /// Position of the item in the submitted batch
    pub index: usize,
    /// Human-readable key (filename or id) used in failure reports
    pub identifier: String,
    /// Payload on success, classified failure otherwise
    pub result: Result<T, ItemFailure>,
}

impl<T> ItemOutcome<T> {
    /// Whether the item succeeded
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// Replace the success payload, keeping index and identifier
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ItemOutcome<U> {
        ItemOutcome {
            index: self.index,
            identifier: self.identifier,
            result: self.result.map(f),
        }
    }
}

/// Aggregated result of a whole batch
///
/// `successes` and `failures` are each ordered by `index`; together they hold
/// exactly one outcome for every submitted item.
#[derive(Clone, Debug)]
pub struct BatchResult<T> {
    /// Number of submitted items
    pub total: usize,
    /// Successful outcomes
    pub successes: Vec<ItemOutcome<T>>,
    /// Failed outcomes
    pub failures: Vec<ItemOutcome<T>>,
    /// Aggregate classification
    pub status: BatchStatus,
}

impl<T> BatchResult<T> {
    /// Number of successful items
    pub fn success_count(&self) -> usize {
        self.successes.len()
    }

    /// Number of failed items
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Failures as flat report entries, ordered by index
    pub fn failure_entries(&self) -> Vec<FailureEntry> {
        self.failures
            .iter()
            .filter_map(|outcome| {
                outcome.result.as_ref().err().map(|failure| FailureEntry {
                    index: outcome.index,
                    identifier: outcome.identifier.clone(),
                    kind: failure.kind,
                    message: failure.message.clone(),
                })
            })
            .collect()
    }

    /// Payloads of the successful items, ordered by index
    pub fn success_payloads(&self) -> impl Iterator<Item = &T> {
        self.successes
            .iter()
            .filter_map(|outcome| outcome.result.as_ref().ok())
    }

    /// Build the client-facing summary without success payloads
    pub fn summary(&self) -> BatchSummary {
        self.summary_with(|_| None)
    }

    /// Build the client-facing summary, describing each success payload
    pub fn summary_with(&self, describe: impl Fn(&T) -> Option<StoredDocument>) -> BatchSummary {
        let succeeded = self
            .successes
            .iter()
            .map(|outcome| SuccessEntry {
                index: outcome.index,
                identifier: outcome.identifier.clone(),
                document: outcome.result.as_ref().ok().and_then(&describe),
            })
            .collect();

        BatchSummary {
            status: self.status,
            total: self.total,
            success_count: self.success_count(),
            failure_count: self.failure_count(),
            succeeded,
            failures: self.failure_entries(),
        }
    }
}

/// One failed item in a report
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FailureEntry {
    /// Position of the item in the submitted batch
    pub index: usize,
    /// Filename or id as submitted
    pub identifier: String,
    /// Failure classification
    pub kind: ItemErrorKind,
    /// Human-readable detail
    pub message: String,
}

/// One successful item in a report
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct SuccessEntry {
    /// Position of the item in the submitted batch
    pub index: usize,
    /// Filename or id as submitted
    pub identifier: String,
    /// Stored descriptor (uploads only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<StoredDocument>,
}

/// Response body for upload and delete batches
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct BatchSummary {
    /// Aggregate classification
    pub status: BatchStatus,
    /// Number of submitted items
    pub total: usize,
    /// Number of successful items
    pub success_count: usize,
    /// Number of failed items
    pub failure_count: usize,
    /// Successful items, ordered by index
    pub succeeded: Vec<SuccessEntry>,
    /// Failed items, ordered by index
    pub failures: Vec<FailureEntry>,
}

/// Descriptor of a stored document
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StoredDocument {
    /// Assigned id
    pub id: DocumentId,
    /// Display name (original filename)
    pub name: String,
    /// MIME type as supplied at upload
    pub content_type: Option<String>,
    /// Content length in bytes
    pub size_bytes: u64,
    /// Hex-encoded SHA-256 of the content
    pub sha256: String,
    /// When the document was stored
    #[schema(value_type = String, format = DateTime)]
    pub created_at: DateTime<Utc>,
}

/// Raw content of one document, as fetched for a download batch
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentContent {
    /// Display name used for the archive entry
    pub name: String,
    /// MIME type, if known
    pub content_type: Option<String>,
    /// Content bytes
    pub bytes: Vec<u8>,
}

/// A document written into a download archive
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ArchivedEntry {
    /// Entry name inside the archive (after collision resolution)
    pub name: String,
    /// Uncompressed size in bytes
    pub size_bytes: u64,
    /// Position of the source item in the submitted batch
    pub source_index: usize,
}

/// Result of a download batch
#[derive(Debug)]
pub struct DownloadBatch {
    /// Zip archive bytes; `None` when no entry was written
    pub archive: Option<Vec<u8>>,
    /// Per-item outcomes; successes describe the written entries
    pub result: BatchResult<ArchivedEntry>,
}

/// One file submitted to an upload batch
#[derive(Clone, Debug)]
pub struct UploadItem {
    /// Original filename as sent by the client
    pub filename: String,
    /// MIME type as sent by the client
    pub content_type: Option<String>,
    /// File content
    pub bytes: Vec<u8>,
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(index: usize, result: Result<u32, ItemFailure>) -> ItemOutcome<u32> {
        ItemOutcome {
            index,
            identifier: format!("id-{index}"),
            result,
        }
    }

    #[test]
    fn document_id_parses_positive_integers_only() {
        assert_eq!(DocumentId::parse("42").unwrap(), DocumentId(42));
        assert_eq!(DocumentId::parse(" 7 ").unwrap(), DocumentId(7));

        for raw in ["bad-id", "", "0", "-3", "1.5", "9999999999999999999999"] {
            let err = DocumentId::parse(raw).unwrap_err();
            assert_eq!(err.kind, ItemErrorKind::InvalidIdentifier, "{raw:?}");
        }
    }

    #[test]
    fn status_classification_matches_counts() {
        assert_eq!(BatchStatus::classify(3, 0), BatchStatus::AllSuccess);
        assert_eq!(BatchStatus::classify(2, 1), BatchStatus::Partial);
        assert_eq!(BatchStatus::classify(0, 3), BatchStatus::AllFailed);
        assert_eq!(BatchStatus::classify(0, 0), BatchStatus::AllFailed);
    }

    #[test]
    fn summary_itemizes_failures_in_index_order() {
        let result = BatchResult {
            total: 3,
            successes: vec![outcome(0, Ok(10)), outcome(2, Ok(30))],
            failures: vec![outcome(1, Err(ItemFailure::invalid_identifier("bad")))],
            status: BatchStatus::Partial,
        };

        let summary = result.summary();
        assert_eq!(summary.status, BatchStatus::Partial);
        assert_eq!(summary.success_count, 2);
        assert_eq!(summary.failure_count, 1);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].identifier, "id-1");
        assert_eq!(summary.failures[0].kind, ItemErrorKind::InvalidIdentifier);
        assert_eq!(
            summary
                .succeeded
                .iter()
                .map(|s| s.index)
                .collect::<Vec<_>>(),
            vec![0, 2]
        );
        assert_eq!(result.success_payloads().copied().collect::<Vec<_>>(), vec![10, 30]);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["status"], "partial");
        assert!(json["succeeded"][0].get("document").is_none());
    }
}
