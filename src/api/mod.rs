//! REST API server module
//!
//! Exposes the batch service over HTTP: bulk upload, bulk delete and bulk
//! archive download, plus health and OpenAPI endpoints.

use crate::{BatchService, Result};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::AppState;

/// Create the API router with all route definitions
///
/// Every route is nested under `/api/v1`.
///
/// # Routes
///
/// ## Bulk Documents
/// - `POST /documents/batch/upload` - Store many files (multipart, repeated `file` fields)
/// - `POST /documents/batch/delete` - Delete many documents (`{"ids": [...]}`)
/// - `POST /documents/batch/download` - Fetch many documents as one zip archive (`{"ids": [...]}`)
///
/// ## System
/// - `GET /health` - Health check
/// - `GET /openapi.json` - OpenAPI specification
/// - `GET /swagger-ui` - Interactive Swagger UI documentation (if enabled, not nested)
pub fn create_router(service: Arc<BatchService>) -> Router {
    let state = AppState::new(service);
    let config = Arc::clone(&state.config);

    let api = Router::new()
        // Bulk documents
        .route("/documents/batch/upload", post(routes::upload_documents))
        .route("/documents/batch/delete", post(routes::delete_documents))
        .route("/documents/batch/download", post(routes::download_documents))
        // System
        .route("/health", get(routes::health_check))
        .route("/openapi.json", get(routes::openapi_spec));

    let router = Router::new().nest("/api/v1", api);

    // Swagger UI reads the OpenAPI document from the /openapi.json route above
    let router = if config.server.api.swagger_ui {
        router.merge(SwaggerUi::new("/swagger-ui").url("/api/v1/openapi.json", ApiDoc::openapi()))
    } else {
        router
    };

    let router = router
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.server.api.max_upload_bytes))
        .layer(TraceLayer::new_for_http());

    // Apply CORS middleware if enabled in config (outermost)
    if config.server.api.cors_enabled {
        let cors = build_cors_layer(&config.server.api.cors_origins);
        router.layer(cors)
    } else {
        router
    }
}

/// Build a CORS layer based on configured origins
///
/// Supports "*" for any origin; otherwise only the listed origins are allowed.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.iter().any(|o| o == "*");

    if allow_any || origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
            .expose_headers(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any)
            .expose_headers(Any)
    }
}

/// Start the API server on the configured bind address.
///
/// Runs until the service is shut down; see [`serve_with_shutdown`].
///
/// # Example
///
/// ```no_run
/// use docbatch::{BatchService, Config, SqliteDocumentStore};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Config::default();
/// let store = SqliteDocumentStore::new(&config.storage).await?;
/// let service = Arc::new(BatchService::new(config, Arc::new(store))?);
///
/// // Start API server (blocks until shutdown)
/// docbatch::api::start_api_server(service).await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_api_server(service: Arc<BatchService>) -> Result<()> {
    let token = service.shutdown_token();
    serve_with_shutdown(service, async move { token.cancelled().await }).await
}

/// Serve the API until `shutdown` resolves.
///
/// When `shutdown` resolves the service is shut down first, so running
/// batches abort and their requests can still complete, then the server
/// drains open connections.
pub async fn serve_with_shutdown<F>(service: Arc<BatchService>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let bind_address = service.config().server.api.bind_address;

    tracing::info!(
        address = %bind_address,
        "Starting API server"
    );

    let app = create_router(Arc::clone(&service));

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    tracing::info!(
        address = %listener.local_addr().map_err(crate::error::Error::Io)?,
        "API server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            service.shutdown();
        })
        .await
        .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
