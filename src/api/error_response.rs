//! HTTP error response handling for the API
//!
//! Converts domain errors to HTTP responses with appropriate status codes
//! and JSON error bodies.

use crate::error::{ApiError, Error, ToHttpStatus};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Implement IntoResponse for Error to automatically convert errors to HTTP responses
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status_code =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status_code.is_server_error() {
            tracing::error!(code = self.error_code(), error = %self, "Request failed");
        }

        let api_error: ApiError = self.into();

        (status_code, Json(api_error)).into_response()
    }
}

/// Implement IntoResponse for ApiError for explicit error responses
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Errors with a known status go through Error::into_response
        (StatusCode::INTERNAL_SERVER_ERROR, Json(self)).into_response()
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ItemErrorKind;
    use crate::types::{BatchKind, FailureEntry};

    async fn body_of(response: Response) -> ApiError {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_batch_too_large_into_response() {
        let error = Error::BatchTooLarge {
            kind: BatchKind::Download,
            max: 200,
            actual: 201,
        };
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let api_error = body_of(response).await;
        assert_eq!(api_error.error.code, "batch_too_large");
        let details = api_error.error.details.unwrap();
        assert_eq!(details["max_items"], 200);
        assert_eq!(details["actual_items"], 201);
    }

    #[tokio::test]
    async fn test_all_not_found_batch_into_response() {
        let error = Error::BatchFailed {
            kind: BatchKind::Delete,
            total: 2,
            failures: vec![
                FailureEntry {
                    index: 0,
                    identifier: "8".into(),
                    kind: ItemErrorKind::NotFoundOrAccessDenied,
                    message: "document 8 not found".into(),
                },
                FailureEntry {
                    index: 1,
                    identifier: "9".into(),
                    kind: ItemErrorKind::NotFoundOrAccessDenied,
                    message: "document 9 not found".into(),
                },
            ],
        };
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let api_error = body_of(response).await;
        assert_eq!(api_error.error.code, "batch_failed");
        assert_eq!(
            api_error.error.details.unwrap()["failures"][1]["identifier"],
            "9"
        );
    }

    #[tokio::test]
    async fn test_shutting_down_into_response() {
        let response = Error::ShuttingDown.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_of(response).await.error.code, "shutting_down");
    }

    #[tokio::test]
    async fn test_api_error_into_response_defaults_to_500() {
        let response = ApiError::new("internal_error", "boom").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_of(response).await.error.message, "boom");
    }
}
