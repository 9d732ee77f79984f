//! Storage module for mirror directories
//!
//! This module handles everything that touches the backups directory:
//! - Mapping captured URLs to file paths inside a mirror
//! - Writing captured resources with same-origin filtering
//! - Resetting, locating, and listing mirror directories

mod layout;
mod writer;

pub use layout::{map_url_path, DEFAULT_EXTENSION, INDEX_FILE};
pub use writer::{ResourceWriter, SaveOutcome, SaveTally};

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid mirror name: {0:?}")]
    InvalidName(String),

    #[error("Mirror not found: {0}")]
    NotFound(String),
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// The backups directory holding one mirror directory per host
#[derive(Debug, Clone)]
pub struct MirrorRoot {
    path: PathBuf,
}

impl MirrorRoot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the mirror for `name` (a host), without touching the disk
    ///
    /// Names that could resolve outside the root are rejected.
    pub fn mirror_dir(&self, name: &str) -> StorageResult<PathBuf> {
        validate_name(name)?;
        Ok(self.path.join(name))
    }

    /// Deletes any previous mirror for `name` and creates an empty one
    pub async fn reset(&self, name: &str) -> StorageResult<PathBuf> {
        let dir = self.mirror_dir(name)?;

        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => tracing::debug!("Removed previous mirror {}", dir.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(StorageError::io(&dir, e)),
        }

        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| StorageError::io(&dir, e))?;

        Ok(dir)
    }

    /// Path of an existing mirror directory
    pub async fn existing(&self, name: &str) -> StorageResult<PathBuf> {
        let dir = self.mirror_dir(name)?;
        match tokio::fs::metadata(&dir).await {
            Ok(meta) if meta.is_dir() => Ok(dir),
            Ok(_) => Err(StorageError::NotFound(name.to_string())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(name.to_string()))
            }
            Err(e) => Err(StorageError::io(&dir, e)),
        }
    }

    /// Names of all mirror directories, sorted
    ///
    /// The root is created if it does not exist yet.
    pub async fn list(&self) -> StorageResult<Vec<String>> {
        tokio::fs::create_dir_all(&self.path)
            .await
            .map_err(|e| StorageError::io(&self.path, e))?;

        let mut entries = tokio::fs::read_dir(&self.path)
            .await
            .map_err(|e| StorageError::io(&self.path, e))?;

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::io(&self.path, e))?
        {
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            if !is_dir {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }

        names.sort();
        Ok(names)
    }
}

fn validate_name(name: &str) -> StorageResult<()> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0']);

    if invalid {
        return Err(StorageError::InvalidName(name.to_string()));
    }
    Ok(())
}
