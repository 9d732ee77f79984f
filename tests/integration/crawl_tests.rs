//! Crawl behaviour against a scripted render backend

use crate::support::{coordinator, files_under, site, Script, ScriptedBackend};
use site_mirror::MirrorError;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tempfile::TempDir;

#[tokio::test]
async fn test_same_origin_links_followed_off_origin_ignored() {
    let backend = ScriptedBackend::new([(
        site("/"),
        Script::Page {
            links: vec![
                site("/p1"),
                site("/p2"),
                site("/p3"),
                site("/p4"),
                site("/p5"),
                "https://other.test/x".to_string(),
                "https://cdn.example.net/y".to_string(),
            ],
            resources: vec![
                (site("/css/site.css"), "body{}".to_string()),
                ("https://cdn.example.net/lib.js".to_string(), "lib".to_string()),
            ],
        },
    )]);
    let temp = TempDir::new().unwrap();

    let report = coordinator(&backend, temp.path(), 2, 20)
        .run(&site("/"))
        .await
        .unwrap();

    assert_eq!(report.stats.pages_claimed, 6);
    assert_eq!(report.stats.pages_rendered, 6);
    assert_eq!(report.stats.resources_off_origin, 1);
    assert_eq!(backend.probe.calls().len(), 6);

    assert_eq!(report.mirror_dir, temp.path().join("example.test"));
    assert_eq!(
        files_under(temp.path()),
        vec![
            "example.test/css/site.css",
            "example.test/index.html",
            "example.test/p1.html",
            "example.test/p2.html",
            "example.test/p3.html",
            "example.test/p4.html",
            "example.test/p5.html",
        ]
    );
}

#[tokio::test]
async fn test_self_loop_claimed_once() {
    let backend = ScriptedBackend::new([(
        site("/"),
        Script::links([site("/"), site("/#top"), site("/")]),
    )]);
    let temp = TempDir::new().unwrap();

    let report = coordinator(&backend, temp.path(), 2, 20)
        .run(&site("/"))
        .await
        .unwrap();

    assert_eq!(report.stats.pages_claimed, 1);
    assert_eq!(report.stats.links_queued, 0);
    assert_eq!(backend.probe.calls(), vec![site("/")]);
}

#[tokio::test]
async fn test_render_timeout_does_not_stop_crawl() {
    let backend = ScriptedBackend::new([
        (site("/"), Script::links([site("/slow"), site("/ok")])),
        (site("/slow"), Script::Timeout),
        (site("/ok"), Script::links([site("/slow"), site("/after")])),
    ]);
    let temp = TempDir::new().unwrap();

    let report = coordinator(&backend, temp.path(), 2, 20)
        .run(&site("/"))
        .await
        .unwrap();

    assert_eq!(report.stats.render_errors, 1);
    assert_eq!(report.stats.failures[0].url, site("/slow"));
    assert_eq!(report.stats.pages_claimed, 4);

    let calls = backend.probe.calls();
    assert_eq!(calls.iter().filter(|c| **c == site("/slow")).count(), 1);
    assert!(calls.contains(&site("/after")));

    let files = files_under(&report.mirror_dir);
    assert!(!files.contains(&"slow.html".to_string()));
    assert!(files.contains(&"ok.html".to_string()));
}

#[tokio::test]
async fn test_page_budget_discards_remaining_frontier() {
    let mut pages: Vec<(String, Script)> = Vec::new();
    pages.push((
        site("/"),
        Script::links((0..10).map(|i| site(&format!("/level1/{i}")))),
    ));
    for i in 0..10 {
        pages.push((
            site(&format!("/level1/{i}")),
            Script::links((0..10).map(|j| site(&format!("/level2/{i}/{j}")))),
        ));
    }
    let backend = ScriptedBackend::new(pages);
    let temp = TempDir::new().unwrap();

    let report = coordinator(&backend, temp.path(), 2, 3)
        .run(&site("/"))
        .await
        .unwrap();

    assert_eq!(report.stats.pages_claimed, 3);
    assert_eq!(backend.probe.calls().len(), 3);
    assert_eq!(files_under(&report.mirror_dir).len(), 3);
}

#[tokio::test]
async fn test_slash_and_no_slash_saved_separately() {
    let backend = ScriptedBackend::new([(site("/"), Script::links([site("/a"), site("/a/")]))]);
    let temp = TempDir::new().unwrap();

    let report = coordinator(&backend, temp.path(), 2, 20)
        .run(&site("/"))
        .await
        .unwrap();

    assert_eq!(report.stats.aliased_overwrites, 0);
    assert_eq!(
        files_under(&report.mirror_dir),
        vec!["a.html", "a/index.html", "index.html"]
    );
    assert_eq!(
        std::fs::read_to_string(report.mirror_dir.join("a.html")).unwrap(),
        "<html><body>/a</body></html>"
    );
    assert_eq!(
        std::fs::read_to_string(report.mirror_dir.join("a/index.html")).unwrap(),
        "<html><body>/a/</body></html>"
    );
}

#[tokio::test]
async fn test_concurrency_never_exceeds_limit() {
    let backend = ScriptedBackend::new([(
        site("/"),
        Script::links((0..12).map(|i| site(&format!("/page/{i}")))),
    )])
    .with_delay(Duration::from_millis(30));
    let temp = TempDir::new().unwrap();

    let report = coordinator(&backend, temp.path(), 3, 50)
        .run(&site("/"))
        .await
        .unwrap();

    assert_eq!(report.stats.pages_claimed, 13);
    assert!(backend.probe.peak() <= 3, "peak was {}", backend.probe.peak());
    assert!(backend.probe.peak() > 1, "renders never overlapped");
}

#[tokio::test]
async fn test_panicking_render_counted_as_failure() {
    let backend = ScriptedBackend::new([
        (site("/"), Script::links([site("/boom"), site("/fine")])),
        (site("/boom"), Script::Panic),
    ]);
    let temp = TempDir::new().unwrap();

    let report = coordinator(&backend, temp.path(), 2, 20)
        .run(&site("/"))
        .await
        .unwrap();

    assert_eq!(report.stats.pages_claimed, 3);
    assert_eq!(report.stats.pages_rendered, 2);
    assert_eq!(report.stats.render_errors, 1);
    assert!(backend.probe.closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_context_closed_after_crawl() {
    let backend = ScriptedBackend::new([]);
    let temp = TempDir::new().unwrap();

    coordinator(&backend, temp.path(), 2, 20)
        .run(&site("/"))
        .await
        .unwrap();

    assert_eq!(backend.probe.launches.load(Ordering::SeqCst), 1);
    assert!(backend.probe.closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_malformed_seed_rejected_before_launch() {
    let backend = ScriptedBackend::new([]);
    let temp = TempDir::new().unwrap();
    let coordinator = coordinator(&backend, temp.path(), 2, 20);

    for seed in ["not a url", "ftp://example.test/", "/relative/path"] {
        let err = coordinator.run(seed).await.unwrap_err();
        assert!(matches!(err, MirrorError::MalformedSeed { .. }), "{seed}: {err}");
    }

    assert_eq!(backend.probe.launches.load(Ordering::SeqCst), 0);
    assert!(files_under(temp.path()).is_empty());
}

#[tokio::test]
async fn test_launch_failure_is_fatal() {
    let backend = ScriptedBackend::new([]).failing_launch();
    let temp = TempDir::new().unwrap();

    let err = coordinator(&backend, temp.path(), 2, 20)
        .run(&site("/"))
        .await
        .unwrap_err();

    assert!(matches!(err, MirrorError::FatalLaunch(_)));
    assert!(backend.probe.calls().is_empty());
}

#[tokio::test]
async fn test_rerun_replaces_previous_mirror() {
    let backend = ScriptedBackend::new([]);
    let temp = TempDir::new().unwrap();
    let coordinator = coordinator(&backend, temp.path(), 2, 20);

    let stale = temp.path().join("example.test/old-page.html");
    std::fs::create_dir_all(stale.parent().unwrap()).unwrap();
    std::fs::write(&stale, "stale").unwrap();

    let report = coordinator.run(&site("/")).await.unwrap();

    assert!(!stale.exists());
    assert_eq!(files_under(&report.mirror_dir), vec!["index.html"]);
}
