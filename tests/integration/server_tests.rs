//! HTTP service tests driven through the router with `tower::ServiceExt`

use crate::support::{coordinator, site, Script, ScriptedBackend};
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use site_mirror::server::{build_router, AppState};
use std::io::{Cursor, Read};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

const BODY_LIMIT: usize = 16 * 1024 * 1024;

fn app(backend: &ScriptedBackend, backups: &Path, static_dir: Option<&Path>) -> Router {
    build_router(
        AppState::new(coordinator(backend, backups, 2, 20)),
        static_dir,
    )
}

fn backup_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/backup")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), BODY_LIMIT).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn site_backend() -> ScriptedBackend {
    ScriptedBackend::new([
        (site("/"), Script::links([site("/about"), site("/docs/")])),
        (site("/about"), Script::links([site("/")])),
    ])
}

#[tokio::test]
async fn test_backup_missing_url() {
    let temp = TempDir::new().unwrap();
    let app = app(&site_backend(), temp.path(), None);

    for body in ["{}", r#"{"url": "   "}"#, "not json"] {
        let response = app.clone().oneshot(backup_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {body:?}");
        assert_eq!(body_text(response).await, "Missing URL");
    }
}

#[tokio::test]
async fn test_backup_malformed_url_fails() {
    let temp = TempDir::new().unwrap();
    let app = app(&site_backend(), temp.path(), None);

    let response = app
        .oneshot(backup_request(r#"{"url": "definitely not a url"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_text(response).await, "Backup failed");
}

#[tokio::test]
async fn test_backup_launch_failure() {
    let temp = TempDir::new().unwrap();
    let app = app(&site_backend().failing_launch(), temp.path(), None);

    let response = app
        .oneshot(backup_request(&format!(r#"{{"url": "{}"}}"#, site("/"))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_backup_list_download_cycle() {
    let temp = TempDir::new().unwrap();
    let backups = temp.path().join("backups");
    let app = app(&site_backend(), &backups, None);

    let response = app
        .clone()
        .oneshot(backup_request(&format!(r#"{{"url": "{}"}}"#, site("/"))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(json["message"], "Backup completed!");
    assert_eq!(json["domain"], "example.test");
    assert_eq!(json["stats"]["pages_claimed"], 3);

    let response = app.clone().oneshot(get("/list")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let names: Vec<String> = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(names, vec!["example.test".to_string()]);

    let response = app
        .clone()
        .oneshot(get("/download/example.test"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/zip"
    );
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"example.test.zip\""
    );

    let bytes = to_bytes(response.into_body(), BODY_LIMIT).await.unwrap();
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    assert_eq!(
        names,
        vec!["about.html", "docs/", "docs/index.html", "index.html"]
    );

    let mut about = String::new();
    archive
        .by_name("about.html")
        .unwrap()
        .read_to_string(&mut about)
        .unwrap();
    assert_eq!(about, "<html><body>/about</body></html>");
}

#[tokio::test]
async fn test_list_creates_backups_dir() {
    let temp = TempDir::new().unwrap();
    let backups = temp.path().join("backups");
    let app = app(&site_backend(), &backups, None);

    let response = app.oneshot(get("/list")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "[]");
    assert!(backups.is_dir());
}

#[tokio::test]
async fn test_download_missing_and_invalid() {
    let temp = TempDir::new().unwrap();
    let app = app(&site_backend(), temp.path(), None);

    let response = app
        .clone()
        .oneshot(get("/download/nothing.test"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.oneshot(get("/download/%2E%2E")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_concurrent_backup_of_same_domain_rejected() {
    let temp = TempDir::new().unwrap();
    let backend = site_backend().with_delay(Duration::from_millis(300));
    let app = app(&backend, temp.path(), None);

    let first = tokio::spawn(
        app.clone()
            .oneshot(backup_request(&format!(r#"{{"url": "{}"}}"#, site("/")))),
    );

    // Wait until the first crawl is rendering
    while backend.probe.calls().is_empty() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let response = app
        .clone()
        .oneshot(backup_request(&format!(r#"{{"url": "{}"}}"#, site("/about"))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app.clone().oneshot(get("/list")).await.unwrap();
    assert_eq!(body_text(response).await, "[]");

    let response = app
        .clone()
        .oneshot(get("/download/example.test"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = first.await.unwrap().unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get("/list")).await.unwrap();
    assert_eq!(body_text(response).await, r#"["example.test"]"#);
}

#[tokio::test]
async fn test_static_files_served_as_fallback() {
    let temp = TempDir::new().unwrap();
    let public = temp.path().join("public");
    std::fs::create_dir_all(&public).unwrap();
    std::fs::write(public.join("index.html"), "<h1>Site Mirror</h1>").unwrap();

    let app = app(&site_backend(), &temp.path().join("backups"), Some(&public));

    let response = app.clone().oneshot(get("/index.html")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "<h1>Site Mirror</h1>");

    let response = app.oneshot(get("/missing.js")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
