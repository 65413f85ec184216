//! Bulk document handlers: upload, delete, archive download.

use super::BatchIdsRequest;
use crate::api::AppState;
use crate::error::Error;
use crate::types::{BatchKind, BatchResult, BatchStatus, StoredDocument, UploadItem};
use axum::{
    Json,
    extract::{Multipart, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};

/// Header carrying the batch status on archive downloads
pub const BATCH_STATUS_HEADER: &str = "x-batch-status";
/// Header carrying the number of archived documents
pub const BATCH_SUCCESS_COUNT_HEADER: &str = "x-batch-success-count";
/// Header carrying the number of documents that could not be archived
pub const BATCH_FAILURE_COUNT_HEADER: &str = "x-batch-failure-count";

/// Filename used for multipart parts that carry none
const DEFAULT_UPLOAD_NAME: &str = "upload";

/// POST /documents/batch/upload - Store many files
#[utoipa::path(
    post,
    path = "/api/v1/documents/batch/upload",
    tag = "documents",
    request_body(content = Vec<u8>, description = "One or more files in repeated 'file' fields (multipart/form-data)", content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Every file was stored", body = crate::types::BatchSummary),
        (status = 207, description = "Some files were stored; failures are itemized", body = crate::types::BatchSummary),
        (status = 400, description = "No files, malformed body, or every file was invalid", body = crate::error::ApiError),
        (status = 413, description = "Too many files", body = crate::error::ApiError),
        (status = 500, description = "Every file failed", body = crate::error::ApiError),
        (status = 503, description = "Shutting down", body = crate::error::ApiError)
    )
)]
pub async fn upload_documents(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut items = Vec::new();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return Error::Validation(format!("malformed multipart body: {}", e))
                    .into_response();
            }
        };

        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .file_name()
            .map(str::to_string)
            .unwrap_or_else(|| DEFAULT_UPLOAD_NAME.to_string());
        let content_type = field.content_type().map(str::to_string);

        match field.bytes().await {
            Ok(bytes) => items.push(UploadItem {
                filename,
                content_type,
                bytes: bytes.to_vec(),
            }),
            Err(e) => {
                return Error::Validation(format!("failed to read file '{}': {}", filename, e))
                    .into_response();
            }
        }
    }

    match state.service.upload_batch(items).await {
        Ok(result) => summary_response(BatchKind::Upload, result, |doc: &StoredDocument| {
            Some(doc.clone())
        }),
        Err(e) => e.into_response(),
    }
}

/// POST /documents/batch/delete - Delete many documents
#[utoipa::path(
    post,
    path = "/api/v1/documents/batch/delete",
    tag = "documents",
    request_body = BatchIdsRequest,
    responses(
        (status = 200, description = "Every document was deleted", body = crate::types::BatchSummary),
        (status = 207, description = "Some documents were deleted; failures are itemized", body = crate::types::BatchSummary),
        (status = 400, description = "No ids, or every id was malformed", body = crate::error::ApiError),
        (status = 404, description = "No document was found", body = crate::error::ApiError),
        (status = 413, description = "Too many ids", body = crate::error::ApiError),
        (status = 504, description = "Batch deadline expired before any delete finished", body = crate::error::ApiError)
    )
)]
pub async fn delete_documents(
    State(state): State<AppState>,
    Json(request): Json<BatchIdsRequest>,
) -> Response {
    match state.service.delete_batch(request.into_identifiers()).await {
        Ok(result) => summary_response(BatchKind::Delete, result, |_| None),
        Err(e) => e.into_response(),
    }
}

/// POST /documents/batch/download - Fetch many documents as one zip archive
#[utoipa::path(
    post,
    path = "/api/v1/documents/batch/download",
    tag = "documents",
    request_body = BatchIdsRequest,
    responses(
        (status = 200, description = "Zip archive of every fetched document; X-Batch-Status tells whether some were missing", content_type = "application/zip", body = Vec<u8>),
        (status = 400, description = "No ids, or every id was malformed", body = crate::error::ApiError),
        (status = 404, description = "No document was found", body = crate::error::ApiError),
        (status = 413, description = "Too many ids", body = crate::error::ApiError),
        (status = 500, description = "Archive could not be finalized", body = crate::error::ApiError)
    )
)]
pub async fn download_documents(
    State(state): State<AppState>,
    Json(request): Json<BatchIdsRequest>,
) -> Response {
    let download = match state.service.download_batch(request.into_identifiers()).await {
        Ok(download) => download,
        Err(e) => return e.into_response(),
    };

    let result = download.result;
    let archive = match download.archive {
        Some(archive) if result.status != BatchStatus::AllFailed => archive,
        _ => return batch_failed(BatchKind::Download, &result).into_response(),
    };

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/zip"),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        content_disposition(&state.config.batch.archive.file_name),
    );
    headers.insert(
        HeaderName::from_static(BATCH_STATUS_HEADER),
        HeaderValue::from_static(result.status.as_str()),
    );
    headers.insert(
        HeaderName::from_static(BATCH_SUCCESS_COUNT_HEADER),
        HeaderValue::from(result.success_count()),
    );
    headers.insert(
        HeaderName::from_static(BATCH_FAILURE_COUNT_HEADER),
        HeaderValue::from(result.failure_count()),
    );

    (StatusCode::OK, headers, archive).into_response()
}

/// Render an upload or delete result: 200 when everything succeeded, 207 when
/// some items failed, the batch-failure error when nothing succeeded
fn summary_response<T>(
    kind: BatchKind,
    result: BatchResult<T>,
    describe: impl Fn(&T) -> Option<StoredDocument>,
) -> Response {
    match result.status {
        BatchStatus::AllSuccess => (StatusCode::OK, Json(result.summary_with(describe))).into_response(),
        BatchStatus::Partial => {
            (StatusCode::MULTI_STATUS, Json(result.summary_with(describe))).into_response()
        }
        BatchStatus::AllFailed => batch_failed(kind, &result).into_response(),
    }
}

fn batch_failed<T>(kind: BatchKind, result: &BatchResult<T>) -> Error {
    Error::BatchFailed {
        kind,
        total: result.total,
        failures: result.failure_entries(),
    }
}

fn content_disposition(file_name: &str) -> HeaderValue {
    let safe: String = file_name
        .chars()
        .map(|c| if c == '"' || c == '\\' || c.is_control() { '_' } else { c })
        .collect();

    HeaderValue::from_str(&format!("attachment; filename=\"{}\"", safe))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment; filename=\"documents.zip\""))
}
