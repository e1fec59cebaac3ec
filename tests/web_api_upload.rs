//! Web API Upload Tests
//!
//! Integration tests for the multipart image upload endpoint.

mod common;

use std::time::Duration;

use axum::http::header::USER_AGENT;
use axum::http::{HeaderValue, StatusCode};
use axum_test::multipart::{MultipartForm, Part};
use serde_json::Value;

use common::{admin_cookie, create_test_server};

fn png(name: &str, size: usize) -> Part {
    Part::bytes(vec![0u8; size])
        .file_name(name)
        .mime_type("image/png")
}

#[tokio::test]
async fn test_upload_requires_session_and_is_audited() {
    let (server, _, backend) = create_test_server();

    let response = server
        .post("/api/admin/images/upload")
        .add_header(USER_AGENT, HeaderValue::from_static("test-agent/1.0"))
        .multipart(MultipartForm::new().add_part("files", png("a.png", 10)))
        .await;

    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    assert!(backend.objects().is_empty());

    let entries = backend.audit_entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, "unauthorized_upload_attempt");
    assert_eq!(entries[0].entity_type, "image");
    assert_eq!(entries[0].metadata["userAgent"], "test-agent/1.0");
}

#[tokio::test]
async fn test_upload_stores_files() {
    let (server, state, backend) = create_test_server();

    let form = MultipartForm::new()
        .add_text("bucket", "stories")
        .add_text("folder", "2024/../covers")
        .add_part("files", png("my photo.png", 64))
        .add_part("files", png("second.png", 32));

    let response = server
        .post("/api/admin/images/upload")
        .add_cookie(admin_cookie(&state))
        .multipart(form)
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["uploaded"], 2);
    assert_eq!(body["failed"], 0);
    assert_eq!(body["success"], true);

    let first = &body["files"][0];
    let path = first["path"].as_str().unwrap();
    assert!(path.starts_with("2024/covers/"), "path: {path}");
    assert!(path.ends_with("-my_photo.png"), "path: {path}");
    assert_eq!(first["size"], 64);
    assert!(first["thumbUrl"].as_str().unwrap().contains("width=400"));

    let objects = backend.objects();
    assert_eq!(objects.len(), 2);
    assert!(objects.iter().all(|o| o.bucket == "stories"));
    assert!(objects.iter().all(|o| o.content_type == "image/png"));
}

#[tokio::test]
async fn test_upload_single_file_field_and_default_bucket() {
    let (server, state, backend) = create_test_server();

    let response = server
        .post("/api/admin/images/upload")
        .add_cookie(admin_cookie(&state))
        .multipart(MultipartForm::new().add_part("file", png("one.png", 8)))
        .await;

    response.assert_status_ok();
    let objects = backend.objects();
    assert_eq!(objects.len(), 1);
    assert_eq!(objects[0].bucket, "gallery");
}

#[tokio::test]
async fn test_upload_partial_failure() {
    let (server, state, backend) = create_test_server();

    let form = MultipartForm::new()
        .add_part("files", png("ok.png", 16))
        .add_part(
            "files",
            Part::bytes(b"%PDF-1.4".to_vec())
                .file_name("doc.pdf")
                .mime_type("application/pdf"),
        )
        .add_part("files", png("huge.png", 6 * 1024 * 1024));

    let response = server
        .post("/api/admin/images/upload")
        .add_cookie(admin_cookie(&state))
        .multipart(form)
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["uploaded"], 1);
    assert_eq!(body["failed"], 2);
    assert_eq!(body["files"][1]["name"], "doc.pdf");
    assert_eq!(
        body["files"][1]["error"],
        "Unsupported file type. Allowed: JPG, PNG, GIF, WEBP"
    );
    assert_eq!(body["files"][2]["error"], "File too large. Max 5MB");
    assert_eq!(backend.objects().len(), 1);
}

#[tokio::test]
async fn test_upload_all_rejected_is_bad_request() {
    let (server, state, _) = create_test_server();

    let form = MultipartForm::new().add_part(
        "files",
        Part::bytes(b"GIF8".to_vec())
            .file_name("notes.txt")
            .mime_type("text/plain"),
    );

    let response = server
        .post("/api/admin/images/upload")
        .add_cookie(admin_cookie(&state))
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_upload_without_files() {
    let (server, state, _) = create_test_server();

    let response = server
        .post("/api/admin/images/upload")
        .add_cookie(admin_cookie(&state))
        .multipart(MultipartForm::new().add_text("bucket", "gallery"))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["error"], "No files provided");
}

#[tokio::test]
async fn test_upload_runs_at_most_four_at_once() {
    let (server, state, backend) = create_test_server();
    *backend.upload_delay.lock().unwrap() = Duration::from_millis(20);

    let mut form = MultipartForm::new();
    for i in 0..10 {
        form = form.add_part("files", png(&format!("p{i}.png"), 4));
    }

    let response = server
        .post("/api/admin/images/upload")
        .add_cookie(admin_cookie(&state))
        .multipart(form)
        .await;

    response.assert_status_ok();
    assert_eq!(backend.objects().len(), 10);
    assert_eq!(backend.max_in_flight(), 4);

    // Results keep the input order
    let body: Value = response.json();
    for i in 0..10 {
        let path = body["files"][i]["path"].as_str().unwrap();
        assert!(path.ends_with(&format!("-p{i}.png")), "path: {path}");
    }
}
