//! HTTP service
//!
//! Exposes crawling, listing and zip export of mirrors over HTTP, and serves
//! a static front-end from the configured directory.

mod routes;

pub use routes::{BackupRequest, BackupResponse};

use crate::config::Config;
use crate::crawler::Coordinator;
use axum::routing::{get, post};
use axum::Router;
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Shared state of the HTTP service
#[derive(Clone)]
pub struct AppState {
    coordinator: Arc<Coordinator>,

    /// Hosts with a crawl in progress
    active: Arc<Mutex<HashSet<String>>>,
}

impl AppState {
    pub fn new(coordinator: Coordinator) -> Self {
        Self {
            coordinator: Arc::new(coordinator),
            active: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    /// Marks `host` as being crawled; `None` if it already is
    fn begin_crawl(&self, host: &str) -> Option<ActiveCrawl> {
        let inserted = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(host.to_string());

        inserted.then(|| ActiveCrawl {
            active: Arc::clone(&self.active),
            host: host.to_string(),
        })
    }

    pub fn is_crawling(&self, host: &str) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(host)
    }
}

/// Clears the in-progress mark for a host when dropped
struct ActiveCrawl {
    active: Arc<Mutex<HashSet<String>>>,
    host: String,
}

impl Drop for ActiveCrawl {
    fn drop(&mut self) {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.host);
    }
}

/// Builds the application router
///
/// | Route | Handler |
/// |-------|---------|
/// | `POST /backup` | crawl a site into its mirror |
/// | `GET /list` | names of finished mirrors |
/// | `GET /download/:domain` | zip archive of one mirror |
///
/// Anything else falls through to `static_dir` when one is given.
pub fn build_router(state: AppState, static_dir: Option<&Path>) -> Router {
    let router = Router::new()
        .route("/backup", post(routes::backup))
        .route("/list", get(routes::list))
        .route("/download/:domain", get(routes::download))
        .with_state(state);

    let router = match static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    };

    router.layer(TraceLayer::new_for_http())
}

/// Binds the configured address and serves until Ctrl-C
pub async fn serve(config: &Config) -> crate::Result<()> {
    let state = AppState::new(Coordinator::from_config(config));
    let app = build_router(state, config.server.static_dir.as_deref());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server running on http://{}", listener.local_addr()?);
    tracing::info!(
        "Mirrors stored in {}",
        config.output.backups_dir.display()
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
