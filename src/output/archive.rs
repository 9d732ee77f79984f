//! Zip export of mirror directories

use std::fs;
use std::io::{self, Cursor, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const COMPRESSION_LEVEL: i64 = 9;

/// Errors that can occur while building an archive
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// Packs a directory into an in-memory zip archive
///
/// Entry names are relative to `dir` and use `/` separators; directories get
/// their own entries so empty ones survive extraction. This does blocking
/// I/O: call it from `spawn_blocking` inside async code.
pub fn zip_directory(dir: &Path) -> Result<Vec<u8>, ArchiveError> {
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(COMPRESSION_LEVEL));

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    add_entries(&mut zip, dir, dir, options)?;
    let cursor = zip.finish()?;

    Ok(cursor.into_inner())
}

fn add_entries(
    zip: &mut ZipWriter<Cursor<Vec<u8>>>,
    root: &Path,
    dir: &Path,
    options: SimpleFileOptions,
) -> Result<(), ArchiveError> {
    let mut entries = fs::read_dir(dir)
        .map_err(io_error(dir))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(io_error(dir))?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let path = entry.path();
        let name = entry_name(root, &path);
        let file_type = entry.file_type().map_err(io_error(&path))?;

        if file_type.is_dir() {
            zip.add_directory(format!("{name}/"), options)?;
            add_entries(zip, root, &path, options)?;
        } else if file_type.is_file() {
            let body = fs::read(&path).map_err(io_error(&path))?;
            zip.start_file(name, options)?;
            zip.write_all(&body).map_err(io_error(&path))?;
        }
    }

    Ok(())
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> ArchiveError {
    let path = path.to_path_buf();
    move |source| ArchiveError::Io { path, source }
}

fn entry_name(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
