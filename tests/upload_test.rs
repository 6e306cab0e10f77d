use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use blood_donor_files::config::StorageConfig;
use blood_donor_files::services::blob::{BlobStore, CloudMirror, PassthroughMirror};
use blood_donor_files::models::StoredFile;
use blood_donor_files::services::storage::{
    LocalStorage, StorageBackend, StorageError, StorageResult, StoreOptions,
};
use blood_donor_files::utils::auth::{capabilities, create_jwt};
use blood_donor_files::{AppState, create_app};
use http_body_util::BodyExt;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::tempdir;
use tower::ServiceExt;

const BOUNDARY: &str = "---------------------------donorboundary0123456789";

fn setup_app(root: &Path) -> Router {
    let config = StorageConfig::development(root.to_path_buf());
    let local: Arc<dyn StorageBackend> = Arc::new(LocalStorage::new(root.to_path_buf()));
    create_app(AppState::new(config, local, Arc::new(PassthroughMirror)))
}

fn token(permissions: &[&str]) -> String {
    let permissions: Vec<String> = permissions.iter().map(|p| p.to_string()).collect();
    create_jwt(
        "donor_admin",
        &permissions,
        "dev_secret",
        chrono::Duration::hours(1),
    )
    .unwrap()
}

fn file_part(filename: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut part = format!(
        "--{BOUNDARY}\r\n\
        Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
        Content-Type: {content_type}\r\n\r\n"
    )
    .into_bytes();
    part.extend_from_slice(data);
    part.extend_from_slice(b"\r\n");
    part
}

fn text_part(name: &str, value: &str) -> Vec<u8> {
    format!(
        "--{BOUNDARY}\r\n\
        Content-Disposition: form-data; name=\"{name}\"\r\n\r\n\
        {value}\r\n"
    )
    .into_bytes()
}

fn finish(parts: Vec<Vec<u8>>) -> Vec<u8> {
    let mut body = parts.concat();
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn upload_request(uri: &str, token: Option<&str>, body: Vec<u8>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri(uri).header(
        header::CONTENT_TYPE,
        format!("multipart/form-data; boundary={}", BOUNDARY),
    );
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body)).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_report_upload_then_retrieve() {
    let temp_dir = tempdir().unwrap();
    let app = setup_app(temp_dir.path());
    let data = b"%PDF-1.4\n%";
    assert_eq!(data.len(), 10);

    let body = finish(vec![
        file_part("report.pdf", "application/pdf", data),
        text_part("folder", "blood-reports"),
    ]);
    let writer = token(&[capabilities::DONOR_UPDATE]);
    let response = app
        .clone()
        .oneshot(upload_request("/api/reports/upload", Some(&writer), body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["success"], true);
    let url = json["data"]["url"].as_str().unwrap().to_string();
    assert!(url.contains("blood-reports"));
    assert_eq!(json["data"]["size"], 10);
    assert_eq!(json["data"]["content_type"], "application/pdf");

    let reader = token(&[capabilities::DONOR_READ]);
    let response = app
        .oneshot(
            Request::builder()
                .uri(&url)
                .header(header::AUTHORIZATION, format!("Bearer {}", reader))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "inline; filename=\"report.pdf\""
    );
    assert_eq!(
        response.headers()[header::CACHE_CONTROL],
        "private, max-age=3600"
    );
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], data);
}

#[tokio::test]
async fn test_report_without_pdf_extension_round_trips_as_pdf() {
    let temp_dir = tempdir().unwrap();
    let app = setup_app(temp_dir.path());
    let writer = token(&[capabilities::DONOR_UPDATE]);
    let reader = token(&[capabilities::DONOR_READ]);

    for filename in ["lab-result", "scan.txt"] {
        let body = finish(vec![file_part(filename, "application/pdf", b"%PDF-1.7")]);
        let response = app
            .clone()
            .oneshot(upload_request("/api/reports/upload", Some(&writer), body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{}", filename);
        let url = json_body(response).await["data"]["url"]
            .as_str()
            .unwrap()
            .to_string();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(&url)
                    .header(header::AUTHORIZATION, format!("Bearer {}", reader))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK, "{}", filename);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/pdf",
            "{}",
            filename
        );
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"%PDF-1.7");
    }
}

#[tokio::test]
async fn test_default_folder_when_omitted() {
    let temp_dir = tempdir().unwrap();
    let app = setup_app(temp_dir.path());

    let body = finish(vec![file_part("cbc.pdf", "application/pdf", b"%PDF-cbc")]);
    let writer = token(&[capabilities::DONOR_UPDATE]);
    let response = app
        .oneshot(upload_request("/api/reports/upload", Some(&writer), body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["data"]["key"], "reports/blood-reports/cbc.pdf");
    assert!(temp_dir.path().join("reports/blood-reports/cbc.pdf").exists());
}

#[tokio::test]
async fn test_unauthenticated_upload_writes_nothing() {
    let temp_dir = tempdir().unwrap();
    let app = setup_app(temp_dir.path());

    let body = finish(vec![file_part("report.pdf", "application/pdf", b"%PDF")]);
    let response = app
        .clone()
        .oneshot(upload_request("/api/reports/upload", None, body.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(upload_request(
            "/api/reports/upload",
            Some("not-a-jwt"),
            body,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    assert!(!temp_dir.path().join("reports").exists());
}

#[tokio::test]
async fn test_upload_without_capability_is_forbidden() {
    let temp_dir = tempdir().unwrap();
    let app = setup_app(temp_dir.path());

    let body = finish(vec![file_part("report.pdf", "application/pdf", b"%PDF")]);
    let reader_only = token(&[capabilities::DONOR_READ]);
    let response = app
        .oneshot(upload_request(
            "/api/reports/upload",
            Some(&reader_only),
            body,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(!temp_dir.path().join("reports").exists());
}

#[tokio::test]
async fn test_non_pdf_report_rejected() {
    let temp_dir = tempdir().unwrap();
    let app = setup_app(temp_dir.path());
    let writer = token(&[capabilities::DONOR_UPDATE]);

    for content_type in ["image/png", "text/plain", "application/x-pdf"] {
        let body = finish(vec![file_part("report.pdf", content_type, b"%PDF")]);
        let response = app
            .clone()
            .oneshot(upload_request("/api/reports/upload", Some(&writer), body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", content_type);
        let json = json_body(response).await;
        assert!(json["error"].as_str().unwrap().contains("PDF"));
    }

    assert!(!temp_dir.path().join("reports").exists());
}

#[tokio::test]
async fn test_missing_or_duplicate_file_field() {
    let temp_dir = tempdir().unwrap();
    let app = setup_app(temp_dir.path());
    let writer = token(&[capabilities::DONOR_UPDATE]);

    let body = finish(vec![text_part("folder", "blood-reports")]);
    let response = app
        .clone()
        .oneshot(upload_request("/api/reports/upload", Some(&writer), body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "No file uploaded");

    let body = finish(vec![
        file_part("a.pdf", "application/pdf", b"%PDF-a"),
        file_part("b.pdf", "application/pdf", b"%PDF-b"),
    ]);
    let response = app
        .oneshot(upload_request("/api/reports/upload", Some(&writer), body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_traversal_folder_rejected() {
    let temp_dir = tempdir().unwrap();
    let root = temp_dir.path().join("storage");
    let app = setup_app(&root);
    let writer = token(&[capabilities::DONOR_UPDATE]);

    let body = finish(vec![
        file_part("report.pdf", "application/pdf", b"%PDF"),
        text_part("folder", "../../escaped"),
    ]);
    let response = app
        .oneshot(upload_request("/api/reports/upload", Some(&writer), body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(!temp_dir.path().join("escaped").exists());
}

#[tokio::test]
async fn test_media_upload_with_query_token() {
    let temp_dir = tempdir().unwrap();
    let app = setup_app(temp_dir.path());
    let writer = token(&[capabilities::DONOR_UPDATE]);

    let body = finish(vec![
        file_part("donor photo.png", "image/png", b"\x89PNG\r\n\x1a\n"),
        text_part("folder", "donors/42"),
    ]);
    let uri = format!("/api/media/upload?token={}", writer);
    let response = app
        .oneshot(upload_request(&uri, None, body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["data"]["key"], "media/donors/42/donor photo.png");
    assert_eq!(
        json["data"]["url"],
        "/api/storage/media/donors/42/donor%20photo.png"
    );
}

#[tokio::test]
async fn test_media_without_extension_served_with_its_type() {
    let temp_dir = tempdir().unwrap();
    let app = setup_app(temp_dir.path());
    let writer = token(&[capabilities::DONOR_UPDATE]);

    let body = finish(vec![file_part("avatar", "image/png", b"\x89PNG\r\n\x1a\n")]);
    let response = app
        .clone()
        .oneshot(upload_request("/api/media/upload", Some(&writer), body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["data"]["key"], "media/general/avatar.png");

    let reader = token(&[capabilities::DONOR_READ]);
    let response = app
        .oneshot(
            Request::builder()
                .uri(json["data"]["url"].as_str().unwrap())
                .header(header::AUTHORIZATION, format!("Bearer {}", reader))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
}

/// Backend whose writes always fail, as on a full or read-only disk
struct FailingStorage;

#[async_trait]
impl StorageBackend for FailingStorage {
    async fn store(
        &self,
        _data: &[u8],
        _filename: &str,
        _options: &StoreOptions,
    ) -> StorageResult<StoredFile> {
        Err(StorageError::Backend("disk quota exceeded".to_string()))
    }

    async fn exists(&self, _key: &str) -> StorageResult<bool> {
        Ok(false)
    }

    async fn read(&self, key: &str) -> StorageResult<Vec<u8>> {
        Err(StorageError::NotFound(key.to_string()))
    }

    async fn delete(&self, _key: &str) -> StorageResult<()> {
        Ok(())
    }

    async fn health_check(&self) -> bool {
        false
    }
}

#[tokio::test]
async fn test_storage_failure_reported_as_bad_request() {
    let temp_dir = tempdir().unwrap();
    let config = StorageConfig::development(temp_dir.path().to_path_buf());
    let app = create_app(AppState::new(
        config,
        Arc::new(FailingStorage),
        Arc::new(PassthroughMirror),
    ));

    let body = finish(vec![file_part("report.pdf", "application/pdf", b"%PDF")]);
    let writer = token(&[capabilities::DONOR_UPDATE]);
    let response = app
        .oneshot(upload_request("/api/reports/upload", Some(&writer), body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert!(
        json["error"]
            .as_str()
            .unwrap()
            .contains("disk quota exceeded")
    );
}

struct RejectingBlobStore;

#[async_trait]
impl BlobStore for RejectingBlobStore {
    async fn put_public(&self, _key: &str, _data: Vec<u8>, _content_type: &str) -> StorageResult<()> {
        Err(StorageError::Backend("bucket access denied".to_string()))
    }
}

#[tokio::test]
async fn test_mirror_failure_reported_and_local_copy_removed() {
    let temp_dir = tempdir().unwrap();
    let config = StorageConfig::development(temp_dir.path().to_path_buf());
    let local: Arc<dyn StorageBackend> =
        Arc::new(LocalStorage::new(temp_dir.path().to_path_buf()));
    let mirror = Arc::new(CloudMirror::new(
        local.clone(),
        Arc::new(RejectingBlobStore),
        "uploads".to_string(),
        "https://cdn.example.org".to_string(),
    ));
    let app = create_app(AppState::new(config, local, mirror));

    let body = finish(vec![file_part("report.pdf", "application/pdf", b"%PDF")]);
    let writer = token(&[capabilities::DONOR_UPDATE]);
    let response = app
        .oneshot(upload_request("/api/reports/upload", Some(&writer), body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert!(
        json["error"]
            .as_str()
            .unwrap()
            .contains("bucket access denied")
    );
    assert!(
        !temp_dir
            .path()
            .join("reports/blood-reports/report.pdf")
            .exists()
    );
}

#[derive(Default)]
struct MockBlobStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

#[async_trait]
impl BlobStore for MockBlobStore {
    async fn put_public(&self, key: &str, data: Vec<u8>, _content_type: &str) -> StorageResult<()> {
        self.objects.lock().unwrap().insert(key.to_string(), data);
        Ok(())
    }
}

#[tokio::test]
async fn test_upload_with_blob_mirror_returns_cloud_url() {
    let temp_dir = tempdir().unwrap();
    let config = StorageConfig::development(temp_dir.path().to_path_buf());
    let local: Arc<dyn StorageBackend> =
        Arc::new(LocalStorage::new(temp_dir.path().to_path_buf()));
    let blob = Arc::new(MockBlobStore::default());
    let mirror = Arc::new(CloudMirror::new(
        local.clone(),
        blob.clone(),
        "uploads".to_string(),
        "https://cdn.example.org".to_string(),
    ));
    let app = create_app(AppState::new(config, local, mirror));

    let body = finish(vec![
        file_part("report.pdf", "application/pdf", b"%PDF-mirror"),
        text_part("folder", "blood-reports"),
    ]);
    let writer = token(&[capabilities::DONOR_UPDATE]);
    let response = app
        .oneshot(upload_request("/api/reports/upload", Some(&writer), body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(
        json["data"]["url"],
        "https://cdn.example.org/uploads/reports/blood-reports/report.pdf"
    );
    // Local copy is kept alongside the mirrored object
    assert!(temp_dir.path().join("reports/blood-reports/report.pdf").exists());
    assert_eq!(
        blob.objects
            .lock()
            .unwrap()
            .get("uploads/reports/blood-reports/report.pdf")
            .unwrap(),
        b"%PDF-mirror"
    );
}
