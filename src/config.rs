//! Configuration types for docbatch

use crate::error::{Error, Result};
use crate::types::BatchKind;
use serde::{Deserialize, Deserializer, Serialize};
use std::{net::SocketAddr, path::PathBuf, time::Duration};
use utoipa::ToSchema;

/// Policy for one batch kind
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BatchKindConfig {
    /// Maximum per-item operations running at once
    pub max_concurrency: usize,

    /// Overall time budget for the batch, in seconds
    #[serde(with = "duration_serde")]
    #[schema(value_type = u64)]
    pub deadline: Duration,

    /// Largest batch accepted in one request
    pub max_items: usize,
}

/// Per-kind batch policies
///
/// All three kinds are bounded. Uploads default to 8 concurrent stores.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct BatchConfig {
    /// Upload policy (default: 8 concurrent, 10 minutes, 100 files)
    #[serde(default = "default_upload", deserialize_with = "deserialize_upload")]
    pub upload: BatchKindConfig,

    /// Delete policy (default: 10 concurrent, 2 minutes, 500 ids)
    #[serde(default = "default_delete", deserialize_with = "deserialize_delete")]
    pub delete: BatchKindConfig,

    /// Download policy (default: 5 concurrent, 5 minutes, 200 ids)
    #[serde(default = "default_download", deserialize_with = "deserialize_download")]
    pub download: BatchKindConfig,

    /// Download archive settings
    #[serde(default)]
    pub archive: ArchiveConfig,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            upload: default_upload(),
            delete: default_delete(),
            download: default_download(),
            archive: ArchiveConfig::default(),
        }
    }
}

impl BatchConfig {
    /// Policy for the given batch kind
    pub fn for_kind(&self, kind: BatchKind) -> &BatchKindConfig {
        match kind {
            BatchKind::Upload => &self.upload,
            BatchKind::Delete => &self.delete,
            BatchKind::Download => &self.download,
        }
    }
}

/// Compression applied to download archive entries
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveCompression {
    /// No compression
    Stored,
    /// Deflate
    #[default]
    Deflated,
}

/// Download archive settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ArchiveConfig {
    /// Filename suggested to clients in Content-Disposition (default: "documents.zip")
    #[serde(default = "default_archive_file_name")]
    pub file_name: String,

    /// Entry compression (default: deflated)
    #[serde(default)]
    pub compression: ArchiveCompression,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            file_name: default_archive_file_name(),
            compression: ArchiveCompression::default(),
        }
    }
}

/// Document store settings
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct StorageConfig {
    /// SQLite metadata database path (default: "docbatch.db")
    #[serde(default = "default_database_path")]
    #[schema(value_type = String)]
    pub database_path: PathBuf,

    /// Directory holding document blobs (default: "blobs")
    #[serde(default = "default_blob_dir")]
    #[schema(value_type = String)]
    pub blob_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            blob_dir: default_blob_dir(),
        }
    }
}

/// API and external server integration configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct ServerIntegrationConfig {
    /// REST API configuration
    #[serde(default)]
    pub api: ApiConfig,
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:6790)
    #[serde(default = "default_bind_address")]
    #[schema(value_type = String)]
    pub bind_address: SocketAddr,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Enable Swagger UI at /swagger-ui (default: true)
    #[serde(default = "default_true")]
    pub swagger_ui: bool,

    /// Maximum request body size for upload batches (default: 256 MiB)
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: true,
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

/// Main configuration for docbatch
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct Config {
    /// Per-kind batch policies and archive settings
    #[serde(default)]
    pub batch: BatchConfig,

    /// Document store settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// API and external server integration
    #[serde(default)]
    pub server: ServerIntegrationConfig,
}

impl Config {
    /// Parse a JSON configuration document and validate it
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json).map_err(|e| Error::Config {
            message: format!("failed to parse configuration: {}", e),
            key: None,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the batch engine cannot run with
    pub fn validate(&self) -> Result<()> {
        for kind in [BatchKind::Upload, BatchKind::Delete, BatchKind::Download] {
            let policy = self.batch.for_kind(kind);
            if policy.max_concurrency == 0 {
                return Err(invalid(kind, "max_concurrency", "must be at least 1"));
            }
            if policy.deadline.is_zero() {
                return Err(invalid(kind, "deadline", "must be at least 1 second"));
            }
            if policy.max_items == 0 {
                return Err(invalid(kind, "max_items", "must be at least 1"));
            }
        }

        if self.batch.archive.file_name.trim().is_empty() {
            return Err(Error::Config {
                message: "archive file name must not be empty".to_string(),
                key: Some("batch.archive.file_name".to_string()),
            });
        }

        Ok(())
    }
}

fn invalid(kind: BatchKind, field: &str, reason: &str) -> Error {
    Error::Config {
        message: format!("{} {} {}", kind, field, reason),
        key: Some(format!("batch.{}.{}", kind, field)),
    }
}

// Default value functions
fn default_upload() -> BatchKindConfig {
    BatchKindConfig {
        max_concurrency: 8,
        deadline: Duration::from_secs(10 * 60),
        max_items: 100,
    }
}

fn default_delete() -> BatchKindConfig {
    BatchKindConfig {
        max_concurrency: 10,
        deadline: Duration::from_secs(2 * 60),
        max_items: 500,
    }
}

fn default_download() -> BatchKindConfig {
    BatchKindConfig {
        max_concurrency: 5,
        deadline: Duration::from_secs(5 * 60),
        max_items: 200,
    }
}

/// A kind policy as written in the config file; omitted fields keep the kind's defaults
#[derive(Deserialize)]
struct BatchKindOverrides {
    max_concurrency: Option<usize>,
    /// Seconds
    deadline: Option<u64>,
    max_items: Option<usize>,
}

impl BatchKindOverrides {
    fn over(self, defaults: BatchKindConfig) -> BatchKindConfig {
        BatchKindConfig {
            max_concurrency: self.max_concurrency.unwrap_or(defaults.max_concurrency),
            deadline: self.deadline.map_or(defaults.deadline, Duration::from_secs),
            max_items: self.max_items.unwrap_or(defaults.max_items),
        }
    }
}

fn deserialize_upload<'de, D>(deserializer: D) -> std::result::Result<BatchKindConfig, D::Error>
where
    D: Deserializer<'de>,
{
    BatchKindOverrides::deserialize(deserializer).map(|o| o.over(default_upload()))
}

fn deserialize_delete<'de, D>(deserializer: D) -> std::result::Result<BatchKindConfig, D::Error>
where
    D: Deserializer<'de>,
{
    BatchKindOverrides::deserialize(deserializer).map(|o| o.over(default_delete()))
}

fn deserialize_download<'de, D>(deserializer: D) -> std::result::Result<BatchKindConfig, D::Error>
where
    D: Deserializer<'de>,
{
    BatchKindOverrides::deserialize(deserializer).map(|o| o.over(default_download()))
}

fn default_archive_file_name() -> String {
    "documents.zip".to_string()
}

fn default_database_path() -> PathBuf {
    PathBuf::from("docbatch.db")
}

fn default_blob_dir() -> PathBuf {
    PathBuf::from("blobs")
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 6790))
}

fn default_true() -> bool {
    true
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_max_upload_bytes() -> usize {
    256 * 1024 * 1024
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
