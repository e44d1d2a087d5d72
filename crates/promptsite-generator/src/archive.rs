//! Zip packaging of generated bundles.

use std::{
    fs,
    io::{Cursor, Seek, Write},
    path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;
use zip::{CompressionMethod, ZipWriter, write::FileOptions};

/// Archive errors.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Directory traversal error.
    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// Zip encoding error.
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// The bundle directory does not exist.
    #[error("bundle directory not found: {0}")]
    NotFound(PathBuf),
}

/// Result type for archive operations.
pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Write every file under `bundle_dir` into a zip on `writer`.
///
/// Entry names are relative to `bundle_dir` with forward slashes.
pub fn write_zip<W: Write + Seek>(bundle_dir: &Path, writer: W) -> Result<W> {
    if !bundle_dir.is_dir() {
        return Err(ArchiveError::NotFound(bundle_dir.to_path_buf()));
    }

    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(writer);
    let mut entries = 0usize;

    for entry in WalkDir::new(bundle_dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let Ok(relative) = entry.path().strip_prefix(bundle_dir) else {
            continue;
        };
        let name = relative.to_string_lossy().replace('\\', "/");

        zip.start_file(name.as_str(), options)?;
        zip.write_all(&fs::read(entry.path())?)?;
        entries += 1;
        debug!(entry = %name, "added to archive");
    }

    debug!(dir = %bundle_dir.display(), entries, "archive written");
    Ok(zip.finish()?)
}

/// Zip `bundle_dir` into memory.
pub fn zip_bundle(bundle_dir: &Path) -> Result<Vec<u8>> {
    let cursor = write_zip(bundle_dir, Cursor::new(Vec::new()))?;
    Ok(cursor.into_inner())
}
