use crate::output::{zip_directory, CrawlStats};
use crate::server::AppState;
use crate::storage::StorageError;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct BackupRequest {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BackupResponse {
    pub message: String,
    pub domain: String,
    pub stats: CrawlStats,
}

/// Failures reported to HTTP clients as plain text
#[derive(Debug)]
pub(super) enum ApiError {
    MissingUrl,
    CrawlInProgress(String),
    BackupFailed,
    InvalidDomain,
    NotFound,
    ListFailed,
    ExportFailed,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::MissingUrl => (StatusCode::BAD_REQUEST, "Missing URL".to_string()),
            ApiError::CrawlInProgress(domain) => (
                StatusCode::CONFLICT,
                format!("Backup of {} already in progress", domain),
            ),
            ApiError::BackupFailed => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Backup failed".to_string())
            }
            ApiError::InvalidDomain => (StatusCode::BAD_REQUEST, "Invalid domain".to_string()),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "Backup not found".to_string()),
            ApiError::ListFailed => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to list backups".to_string(),
            ),
            ApiError::ExportFailed => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Export failed".to_string())
            }
        };
        (status, message).into_response()
    }
}

/// `POST /backup`: mirrors the site at `url` and reports its statistics
pub(super) async fn backup(
    State(state): State<AppState>,
    payload: Result<Json<BackupRequest>, JsonRejection>,
) -> Result<Json<BackupResponse>, ApiError> {
    let seed = payload
        .ok()
        .and_then(|Json(request)| request.url)
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty())
        .ok_or(ApiError::MissingUrl)?;

    let (_, origin) = crate::crawler::parse_seed(&seed).map_err(|e| {
        tracing::warn!("Rejected backup request: {}", e);
        ApiError::BackupFailed
    })?;
    let domain = origin.host().to_string();

    let guard = state
        .begin_crawl(&domain)
        .ok_or_else(|| ApiError::CrawlInProgress(domain.clone()))?;

    // Runs to completion even if the client disconnects
    let coordinator = state.coordinator.clone();
    let job = tokio::spawn(async move {
        let _guard = guard;
        coordinator.run(&seed).await
    });

    match job.await {
        Ok(Ok(report)) => Ok(Json(BackupResponse {
            message: "Backup completed!".to_string(),
            domain,
            stats: report.stats,
        })),
        Ok(Err(e)) => {
            tracing::error!("Backup of {} failed: {}", domain, e);
            Err(ApiError::BackupFailed)
        }
        Err(e) => {
            tracing::error!("Backup task for {} did not complete: {}", domain, e);
            Err(ApiError::BackupFailed)
        }
    }
}

/// `GET /list`: names of mirrors that are not being crawled right now
pub(super) async fn list(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    let names = state
        .coordinator
        .mirror_root()
        .list()
        .await
        .map_err(|e| {
            tracing::error!("Failed to list backups: {}", e);
            ApiError::ListFailed
        })?;

    Ok(Json(
        names
            .into_iter()
            .filter(|name| !state.is_crawling(name))
            .collect(),
    ))
}

/// `GET /download/:domain`: zip archive of one mirror
pub(super) async fn download(
    State(state): State<AppState>,
    Path(domain): Path<String>,
) -> Result<Response, ApiError> {
    if state.is_crawling(&domain) {
        return Err(ApiError::CrawlInProgress(domain));
    }

    let dir = state
        .coordinator
        .mirror_root()
        .existing(&domain)
        .await
        .map_err(|e| match e {
            StorageError::InvalidName(_) => ApiError::InvalidDomain,
            StorageError::NotFound(_) => ApiError::NotFound,
            other => {
                tracing::error!("Failed to locate backup {}: {}", domain, other);
                ApiError::ExportFailed
            }
        })?;

    let archive = tokio::task::spawn_blocking(move || zip_directory(&dir))
        .await
        .map_err(|e| {
            tracing::error!("Archive task for {} did not complete: {}", domain, e);
            ApiError::ExportFailed
        })?
        .map_err(|e| {
            tracing::error!("Failed to archive {}: {}", domain, e);
            ApiError::ExportFailed
        })?;

    tracing::info!("Exported {} ({} bytes)", domain, archive.len());

    let disposition = format!("attachment; filename=\"{}.zip\"", domain);
    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        archive,
    )
        .into_response())
}
