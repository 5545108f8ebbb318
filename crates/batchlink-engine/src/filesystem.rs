//! Local file adapter (secondary/driven adapter)
//!
//! Implements [`ILocalFiles`] using `tokio::fs`, and turns host-selected
//! paths into [`SourceFile`] references.
//!
//! ## Design Decisions
//!
//! - **Vanished files**: a file missing at read time is reported as
//!   `ServiceError::NotFound`, which the upload maps to `Ineligible{noFile}`.
//! - **Other I/O failures** are terminal rejections; retrying a local read
//!   does not help.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use batchlink_core::domain::{ServiceError, SourceFile};
use batchlink_core::ports::ILocalFiles;

use crate::EngineError;

/// Adapter that bridges the [`ILocalFiles`] port to the real filesystem
#[derive(Debug, Clone, Default)]
pub struct LocalFileReader;

impl LocalFileReader {
    /// Create a new `LocalFileReader`.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Describes a selected file
    ///
    /// # Errors
    ///
    /// Returns `EngineError::NotAFile` for directories and other non-files,
    /// or the underlying I/O error.
    pub async fn describe(&self, path: &Path) -> Result<SourceFile, EngineError> {
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(EngineError::NotAFile(path.to_path_buf()));
        }
        Ok(SourceFile::new(path, metadata.len()))
    }

    /// Describes every regular file directly inside `dir`, sorted by path
    ///
    /// Subdirectories are not descended into.
    pub async fn scan_dir(&self, dir: &Path) -> Result<Vec<SourceFile>, EngineError> {
        let mut entries = tokio::fs::read_dir(dir).await?;
        let mut paths: Vec<PathBuf> = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                paths.push(entry.path());
            }
        }
        paths.sort();

        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            files.push(self.describe(&path).await?);
        }
        debug!(dir = %dir.display(), count = files.len(), "Scanned directory");
        Ok(files)
    }
}

fn map_io_error(path: &Path, err: std::io::Error) -> ServiceError {
    match err.kind() {
        ErrorKind::NotFound => ServiceError::NotFound(path.display().to_string()),
        _ => ServiceError::Rejected(format!("{}: {err}", path.display())),
    }
}

#[async_trait::async_trait]
impl ILocalFiles for LocalFileReader {
    #[instrument(skip(self, file), fields(path = %file.path().display()))]
    async fn read(&self, file: &SourceFile) -> Result<Vec<u8>, ServiceError> {
        let bytes = tokio::fs::read(file.path())
            .await
            .map_err(|e| map_io_error(file.path(), e))?;
        debug!(bytes = bytes.len(), "Read local file");
        Ok(bytes)
    }
}
