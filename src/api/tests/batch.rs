use super::*;
use std::io::{Cursor, Read};

/// Upload files through the API and return their assigned ids
async fn upload_files(app: &Router, files: &[(&str, &[u8])]) -> Vec<i64> {
    let response = app.clone().oneshot(multipart_request(files)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    json["succeeded"]
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["document"]["id"].as_i64().unwrap())
        .collect()
}

#[tokio::test]
async fn test_upload_returns_summary_with_documents() {
    let (service, _temp_dir) = create_test_service(Config::default()).await;
    let app = create_router(service);

    let response = app
        .oneshot(multipart_request(&[
            ("invoice.pdf", b"%PDF-1.7"),
            ("notes.txt", b"hello"),
        ]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "all_success");
    assert_eq!(json["total"], 2);
    assert_eq!(json["success_count"], 2);
    assert_eq!(json["failure_count"], 0);
    assert_eq!(json["succeeded"][0]["identifier"], "invoice.pdf");
    assert_eq!(json["succeeded"][0]["document"]["size_bytes"], 8);
    assert_eq!(json["succeeded"][1]["document"]["name"], "notes.txt");
    assert!(json["failures"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_upload_without_files_is_rejected() {
    let (service, _temp_dir) = create_test_service(Config::default()).await;
    let app = create_router(service);

    let response = app.oneshot(multipart_request(&[])).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "empty_batch");
}

#[tokio::test]
async fn test_upload_over_item_limit_returns_413() {
    let mut config = Config::default();
    config.batch.upload.max_items = 1;
    let (service, _temp_dir) = create_test_service(config).await;
    let app = create_router(service);

    let response = app
        .oneshot(multipart_request(&[("a.txt", b"a"), ("b.txt", b"b")]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "batch_too_large");
    assert_eq!(json["error"]["details"]["max_items"], 1);
    assert_eq!(json["error"]["details"]["actual_items"], 2);
}

#[tokio::test]
async fn test_delete_partial_returns_multi_status() {
    let (service, _temp_dir) = create_test_service(Config::default()).await;
    let app = create_router(service);
    let ids = upload_files(&app, &[("a.txt", b"a")]).await;

    let response = app
        .oneshot(json_request(
            "/api/v1/documents/batch/delete",
            serde_json::json!({ "ids": [ids[0], "bad-id", 999_999] }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::MULTI_STATUS);
    let json = body_json(response).await;
    assert_eq!(json["status"], "partial");
    assert_eq!(json["success_count"], 1);
    assert_eq!(json["succeeded"][0]["index"], 0);
    assert_eq!(json["succeeded"][0]["identifier"], ids[0].to_string());

    let failures = json["failures"].as_array().unwrap();
    assert_eq!(failures.len(), 2);
    assert_eq!(failures[0]["index"], 1);
    assert_eq!(failures[0]["identifier"], "bad-id");
    assert_eq!(failures[0]["kind"], "invalid_identifier");
    assert_eq!(failures[1]["index"], 2);
    assert_eq!(failures[1]["identifier"], "999999");
    assert_eq!(failures[1]["kind"], "not_found_or_access_denied");
}

#[tokio::test]
async fn test_delete_all_missing_returns_404() {
    let (service, _temp_dir) = create_test_service(Config::default()).await;
    let app = create_router(service);

    let response = app
        .oneshot(json_request(
            "/api/v1/documents/batch/delete",
            serde_json::json!({ "ids": ["41", "42"] }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "batch_failed");
    assert_eq!(json["error"]["details"]["batch_kind"], "delete");
    assert_eq!(json["error"]["details"]["total"], 2);
    assert_eq!(
        json["error"]["details"]["failures"].as_array().unwrap().len(),
        2
    );
}

#[tokio::test]
async fn test_delete_mixed_failures_returns_500() {
    let (service, _temp_dir) = create_test_service(Config::default()).await;
    let app = create_router(service);

    let response = app
        .oneshot(json_request(
            "/api/v1/documents/batch/delete",
            serde_json::json!({ "ids": ["nope", "42"] }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "batch_failed");
}

#[tokio::test]
async fn test_delete_empty_ids_returns_400() {
    let (service, _temp_dir) = create_test_service(Config::default()).await;
    let app = create_router(service);

    let response = app
        .oneshot(json_request(
            "/api/v1/documents/batch/delete",
            serde_json::json!({ "ids": [] }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "empty_batch");
}

#[tokio::test]
async fn test_download_returns_zip_with_unique_names() {
    let (service, _temp_dir) = create_test_service(Config::default()).await;
    let app = create_router(service);
    let ids = upload_files(&app, &[("scan.png", b"first"), ("SCAN.png", b"second")]).await;

    let response = app
        .oneshot(json_request(
            "/api/v1/documents/batch/download",
            serde_json::json!({ "ids": ids }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers["content-type"], "application/zip");
    assert_eq!(
        headers["content-disposition"],
        "attachment; filename=\"documents.zip\""
    );
    assert_eq!(headers["x-batch-status"], "all_success");
    assert_eq!(headers["x-batch-success-count"], "2");
    assert_eq!(headers["x-batch-failure-count"], "0");

    let bytes = body_bytes(response).await;
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut contents = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).unwrap();
        let mut body = String::new();
        entry.read_to_string(&mut body).unwrap();
        contents.push((entry.name().to_string(), body));
    }
    contents.sort();

    // Names only collide case-insensitively; which one gets the suffix depends on completion order
    let names: Vec<String> = contents.iter().map(|(n, _)| n.to_ascii_lowercase()).collect();
    assert_eq!(names, vec!["scan.png", "scan_1.png"]);
    let mut bodies: Vec<&str> = contents.iter().map(|(_, b)| b.as_str()).collect();
    bodies.sort();
    assert_eq!(bodies, vec!["first", "second"]);
}

#[tokio::test]
async fn test_download_partial_reports_headers() {
    let (service, _temp_dir) = create_test_service(Config::default()).await;
    let app = create_router(service);
    let ids = upload_files(&app, &[("a.txt", b"a")]).await;

    let response = app
        .oneshot(json_request(
            "/api/v1/documents/batch/download",
            serde_json::json!({ "ids": [ids[0], 424_242] }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-batch-status"], "partial");
    assert_eq!(response.headers()["x-batch-success-count"], "1");
    assert_eq!(response.headers()["x-batch-failure-count"], "1");

    let bytes = body_bytes(response).await;
    let archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    assert_eq!(archive.len(), 1);
}

#[tokio::test]
async fn test_download_nothing_found_returns_404() {
    let (service, _temp_dir) = create_test_service(Config::default()).await;
    let app = create_router(service);

    let response = app
        .oneshot(json_request(
            "/api/v1/documents/batch/download",
            serde_json::json!({ "ids": [5, 6] }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "batch_failed");
    assert_eq!(json["error"]["details"]["batch_kind"], "download");
}

#[tokio::test]
async fn test_batch_after_shutdown_returns_503() {
    let (service, _temp_dir) = create_test_service(Config::default()).await;
    let app = create_router(service.clone());
    service.shutdown();

    let response = app
        .oneshot(json_request(
            "/api/v1/documents/batch/delete",
            serde_json::json!({ "ids": ["1"] }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "shutting_down");
}

#[tokio::test]
async fn test_malformed_json_body_is_rejected() {
    let (service, _temp_dir) = create_test_service(Config::default()).await;
    let app = create_router(service);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/documents/batch/delete")
                .header("content-type", "application/json")
                .body(Body::from("{\"ids\": "))
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}
