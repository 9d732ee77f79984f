//! Resource writer
//!
//! Persists captured responses into a mirror directory. Resources from other
//! hosts are dropped, and every write is independent: one failure never
//! affects the others.

use crate::render::CapturedResource;
use crate::storage::{map_url_path, StorageError};
use crate::url::Origin;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

/// What happened to a single captured resource
#[derive(Debug)]
pub enum SaveOutcome {
    /// Written at the given path
    Written(PathBuf),

    /// Written at a path that already held a different URL's content
    Overwrote { path: PathBuf, previous: String },

    /// Dropped because its host is not the crawl origin
    OffOrigin,

    /// Write failed; the crawl continues
    Failed(StorageError),
}

/// Aggregated outcomes of a batch of saves
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SaveTally {
    pub written: usize,
    pub off_origin: usize,
    pub failed: usize,
    pub aliased: usize,
}

impl SaveTally {
    fn record(&mut self, outcome: &SaveOutcome) {
        match outcome {
            SaveOutcome::Written(_) => self.written += 1,
            SaveOutcome::Overwrote { .. } => {
                self.written += 1;
                self.aliased += 1;
            }
            SaveOutcome::OffOrigin => self.off_origin += 1,
            SaveOutcome::Failed(_) => self.failed += 1,
        }
    }
}

/// Writes captured resources of one crawl into its mirror directory
#[derive(Debug)]
pub struct ResourceWriter {
    origin: Origin,
    mirror_dir: PathBuf,

    /// Which URL last wrote each path
    written: Mutex<HashMap<PathBuf, String>>,

    staging_counter: AtomicU64,
}

impl ResourceWriter {
    pub fn new(origin: Origin, mirror_dir: PathBuf) -> Self {
        Self {
            origin,
            mirror_dir,
            written: Mutex::new(HashMap::new()),
            staging_counter: AtomicU64::new(0),
        }
    }

    pub fn mirror_dir(&self) -> &Path {
        &self.mirror_dir
    }

    /// Saves one resource if it belongs to the crawl origin
    ///
    /// Parent directories are created as needed. The body is staged in a
    /// sibling file and renamed into place, so concurrent saves of the same
    /// path never interleave. When two different URLs map to the same path
    /// the later write wins and is reported as [`SaveOutcome::Overwrote`].
    pub async fn save(&self, resource: &CapturedResource) -> SaveOutcome {
        if !self.origin.matches_host(&resource.origin_host) {
            tracing::trace!("Skipping off-origin resource {}", resource.url);
            return SaveOutcome::OffOrigin;
        }

        let path = self.mirror_dir.join(map_url_path(&resource.url));

        if let Err(e) = self.write_file(&path, &resource.body).await {
            tracing::warn!("Failed to save {}: {}", resource.url, e);
            return SaveOutcome::Failed(e);
        }

        let previous = self
            .written
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.clone(), resource.url.to_string());

        match previous {
            Some(previous) if previous != resource.url.as_str() => {
                tracing::warn!(
                    "{} overwrote {} at {}",
                    resource.url,
                    previous,
                    path.display()
                );
                SaveOutcome::Overwrote { path, previous }
            }
            _ => {
                tracing::trace!("Saved {} to {}", resource.url, path.display());
                SaveOutcome::Written(path)
            }
        }
    }

    /// Saves every resource in order and tallies the outcomes
    pub async fn save_all(&self, resources: &[CapturedResource]) -> SaveTally {
        let mut tally = SaveTally::default();
        for resource in resources {
            let outcome = self.save(resource).await;
            tally.record(&outcome);
        }
        tally
    }

    async fn write_file(&self, path: &Path, body: &[u8]) -> Result<(), StorageError> {
        let parent = path.parent().unwrap_or(&self.mirror_dir);
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| StorageError::io(parent, e))?;

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let staging = parent.join(format!(
            ".{}.{}.part",
            file_name,
            self.staging_counter.fetch_add(1, Ordering::Relaxed)
        ));

        if let Err(e) = tokio::fs::write(&staging, body).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(StorageError::io(&staging, e));
        }

        if let Err(e) = tokio::fs::rename(&staging, path).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(StorageError::io(path, e));
        }

        Ok(())
    }
}
