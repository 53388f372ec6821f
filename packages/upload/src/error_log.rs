//! Append-only record of the files a run failed to upload.
//!
//! Each errored task adds one `UPLOAD_ERROR: {file} - {reason}` line. The
//! file is opened in append mode so repeated runs accumulate.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt as _;

use crate::UploadError;

/// An open error log.
pub struct ErrorLog {
    path: PathBuf,
    file: tokio::fs::File,
}

impl ErrorLog {
    /// Opens `path` for appending, creating it and its parent directory if
    /// needed.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::ErrorLog`] if the file cannot be opened.
    pub async fn open(path: &Path) -> Result<Self, UploadError> {
        let io_err = |source: std::io::Error| UploadError::ErrorLog {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }

        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(io_err)?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// Appends one failure line.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::ErrorLog`] if the write fails.
    pub async fn record(&mut self, file_name: &str, reason: &str) -> Result<(), UploadError> {
        let line = format!("UPLOAD_ERROR: {file_name} - {reason}\n");
        self.file
            .write_all(line.as_bytes())
            .await
            .map_err(|source| UploadError::ErrorLog {
                path: self.path.clone(),
                source,
            })
    }

    /// Flushes buffered lines to disk.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::ErrorLog`] if the flush fails.
    pub async fn flush(&mut self) -> Result<(), UploadError> {
        self.file
            .flush()
            .await
            .map_err(|source| UploadError::ErrorLog {
                path: self.path.clone(),
                source,
            })
    }

    /// Where the log is written.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}
