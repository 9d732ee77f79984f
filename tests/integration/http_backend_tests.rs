//! End-to-end crawls with the plain HTTP render backend
//!
//! These tests use wiremock to create mock HTTP servers and test the full
//! crawl cycle from seed to files on disk.

use crate::support::files_under;
use site_mirror::config::{CrawlerConfig, RenderBackendKind, RenderConfig};
use site_mirror::crawler::Coordinator;
use site_mirror::render::build_backend;
use site_mirror::storage::MirrorRoot;
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/html; charset=utf-8")
}

async fn mount(server: &MockServer, route: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(response)
        .mount(server)
        .await;
}

fn http_coordinator(root: &Path, max_pages: usize) -> Coordinator {
    let render = RenderConfig {
        backend: RenderBackendKind::Http,
        navigation_timeout: 5000,
        ..RenderConfig::default()
    };

    Coordinator::new(
        CrawlerConfig {
            max_concurrent: 2,
            max_pages,
        },
        build_backend(&render),
        MirrorRoot::new(root),
    )
}

#[tokio::test]
async fn test_full_crawl_single_site() {
    let server = MockServer::start().await;

    mount(
        &server,
        "/",
        html(
            r#"<html><head><title>Home</title><link rel="stylesheet" href="/css/site.css"></head>
            <body>
                <a href="/about">About</a>
                <a href="/blog/">Blog</a>
                <a href="https://external.test/">External</a>
                <img src="https://cdn.external.test/logo.png">
            </body></html>"#,
        ),
    )
    .await;
    mount(
        &server,
        "/about",
        html(r#"<html><body><a href="/">Home</a><img src="/img/team.jpg"></body></html>"#),
    )
    .await;
    mount(
        &server,
        "/blog/",
        html(r#"<html><body><a href="/blog/first-post">First</a></body></html>"#),
    )
    .await;
    mount(
        &server,
        "/blog/first-post",
        html("<html><body><p>Hello</p></body></html>"),
    )
    .await;
    mount(
        &server,
        "/css/site.css",
        ResponseTemplate::new(200)
            .insert_header("content-type", "text/css")
            .set_body_string("body { margin: 0 }"),
    )
    .await;
    mount(
        &server,
        "/img/team.jpg",
        ResponseTemplate::new(200)
            .insert_header("content-type", "image/jpeg")
            .set_body_bytes(vec![0xFF, 0xD8, 0xFF]),
    )
    .await;

    let temp = TempDir::new().unwrap();
    let report = http_coordinator(temp.path(), 20)
        .run(&format!("{}/", server.uri()))
        .await
        .unwrap();

    assert_eq!(report.origin.host(), "127.0.0.1");
    assert_eq!(report.stats.pages_claimed, 4);
    assert_eq!(report.stats.render_errors, 0);
    assert_eq!(
        files_under(&report.mirror_dir),
        vec![
            "about.html",
            "blog/first-post.html",
            "blog/index.html",
            "css/site.css",
            "img/team.jpg",
            "index.html",
        ]
    );
    assert_eq!(
        std::fs::read(report.mirror_dir.join("img/team.jpg")).unwrap(),
        vec![0xFF, 0xD8, 0xFF]
    );
}

#[tokio::test]
async fn test_broken_link_counted_not_saved() {
    let server = MockServer::start().await;

    mount(
        &server,
        "/",
        html(r#"<html><body><a href="/gone">Gone</a><a href="/here">Here</a></body></html>"#),
    )
    .await;
    mount(&server, "/gone", ResponseTemplate::new(404)).await;
    mount(&server, "/here", html("<html><body>here</body></html>")).await;

    let temp = TempDir::new().unwrap();
    let report = http_coordinator(temp.path(), 20)
        .run(&format!("{}/", server.uri()))
        .await
        .unwrap();

    assert_eq!(report.stats.pages_claimed, 3);
    assert_eq!(report.stats.render_errors, 1);
    assert!(report.stats.failures[0].error.contains("404"));
    assert_eq!(
        files_under(&report.mirror_dir),
        vec!["here.html", "index.html"]
    );
}

#[tokio::test]
async fn test_page_budget_respected_over_http() {
    let server = MockServer::start().await;

    let links: String = (0..10)
        .map(|i| format!(r#"<a href="/p{i}">{i}</a>"#))
        .collect();
    mount(&server, "/", html(&format!("<html><body>{links}</body></html>"))).await;
    for i in 0..10 {
        mount(
            &server,
            &format!("/p{i}"),
            html("<html><body>leaf</body></html>"),
        )
        .await;
    }

    let temp = TempDir::new().unwrap();
    let report = http_coordinator(temp.path(), 4)
        .run(&format!("{}/", server.uri()))
        .await
        .unwrap();

    assert_eq!(report.stats.pages_claimed, 4);
    assert_eq!(files_under(&report.mirror_dir).len(), 4);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 4);
}
