//! OpenAPI documentation and schema generation
//!
//! Defines the OpenAPI specification for the docbatch REST API using utoipa
//! for compile-time spec generation.

use utoipa::OpenApi;

/// OpenAPI documentation for the docbatch REST API
///
/// The spec can be accessed via:
/// - `/api/v1/openapi.json` - JSON format OpenAPI specification
/// - `/swagger-ui` - Interactive Swagger UI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "docbatch REST API",
        version = "0.1.0",
        description = "Bulk upload, delete and archive download of documents with per-item results",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:6790/api/v1", description = "Local development server")
    ),
    paths(
        // Bulk document operations
        crate::api::routes::upload_documents,
        crate::api::routes::delete_documents,
        crate::api::routes::download_documents,

        // System
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
    ),
    components(schemas(
        // Core types from types.rs
        crate::types::DocumentId,
        crate::types::BatchKind,
        crate::types::BatchStatus,
        crate::types::BatchSummary,
        crate::types::SuccessEntry,
        crate::types::FailureEntry,
        crate::types::StoredDocument,
        crate::types::ArchivedEntry,

        // Config types from config.rs
        crate::config::Config,
        crate::config::BatchConfig,
        crate::config::BatchKindConfig,
        crate::config::ArchiveConfig,
        crate::config::ArchiveCompression,
        crate::config::StorageConfig,
        crate::config::ServerIntegrationConfig,
        crate::config::ApiConfig,

        // API request types from routes
        crate::api::routes::BatchIdsRequest,

        // Error types from error.rs
        crate::error::ItemErrorKind,
        crate::error::ItemFailure,
        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "documents", description = "Bulk document operations - Upload, delete and download many documents at once"),
        (name = "system", description = "System endpoints - Health checks, OpenAPI spec"),
    )
)]
pub struct ApiDoc;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_spec_has_batch_paths() {
        let spec = ApiDoc::openapi();

        for path in [
            "/api/v1/documents/batch/upload",
            "/api/v1/documents/batch/delete",
            "/api/v1/documents/batch/download",
            "/api/v1/health",
        ] {
            assert!(spec.paths.paths.contains_key(path), "missing path {path}");
        }
    }

    #[test]
    fn test_openapi_spec_has_components() {
        let spec = ApiDoc::openapi();
        let components = spec.components.expect("spec should have components");

        for schema in ["BatchSummary", "FailureEntry", "ItemErrorKind", "ApiError"] {
            assert!(
                components.schemas.contains_key(schema),
                "missing schema {schema}"
            );
        }
    }

    #[test]
    fn test_openapi_spec_serializes() {
        let json = serde_json::to_value(ApiDoc::openapi()).unwrap();
        assert_eq!(json["info"]["title"], "docbatch REST API");
    }
}
