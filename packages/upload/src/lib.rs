#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Bulk uploader that pushes extracted archive images to R2.
//!
//! Lists a local directory, then uploads only the images the bucket does
//! not already have. Files are processed in fixed-width groups: every task
//! in a group runs concurrently, and the next group starts only after the
//! whole group has reached a terminal outcome. Re-running over the same
//! directory is safe because keys are derived from file names and existing
//! keys are skipped.
//!
//! Per-file failures are contained in the pipeline (see [`pipeline`]) and
//! only show up in the final [`BatchResult`] and, optionally, an
//! [`error_log::ErrorLog`]. The only fatal errors are bad configuration, an
//! inaccessible bucket, an unreadable source directory and an unwritable
//! error log.

pub mod discover;
pub mod error_log;
pub mod pipeline;
pub mod progress;

#[cfg(test)]
mod test_store;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use doc_archive_r2::{ObjectStore, R2Error};
use doc_archive_upload_models::progress::ProgressCallback;
use doc_archive_upload_models::{BatchResult, ProbeFailurePolicy, TaskOutcome, UploadTask};

use crate::error_log::ErrorLog;
use crate::progress::ProgressReporter;

/// Default directory of extracted images.
pub const DEFAULT_SOURCE_DIR: &str = "extracted/DataSet_1";

/// Default remote key prefix.
pub const DEFAULT_KEY_PREFIX: &str = "images";

/// Default number of files uploaded concurrently per group.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Default number of processed files between progress lines.
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 100;

/// Errors that abort a whole run.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// The source directory could not be listed.
    #[error("Failed to list {}: {source}", .path.display())]
    ListDir {
        /// Directory that was being listed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The bucket check failed, so no file could be uploaded.
    #[error("Bucket check failed: {0}")]
    Bucket(#[source] R2Error),

    /// The error log could not be opened or written.
    #[error("Failed to write error log {}: {source}", .path.display())]
    ErrorLog {
        /// Error log path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration value is out of range.
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the bad value.
        message: String,
    },
}

/// Settings for one upload run.
///
/// Built once at startup and passed by reference into the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadConfig {
    /// Directory to list for images.
    pub source_dir: PathBuf,
    /// Prefix joined with each file name to form the remote key.
    pub key_prefix: String,
    /// Maximum files in flight per group. Must be at least 1.
    pub concurrency: usize,
    /// Processed-file cadence for progress lines. Must be at least 1.
    pub progress_interval: u64,
    /// Per-task limit; a task that exceeds it ends errored.
    pub task_timeout: Option<Duration>,
    /// How a failed existence probe is treated.
    pub probe_failure: ProbeFailurePolicy,
    /// Total upload tries per file. Must be at least 1.
    pub upload_attempts: u32,
    /// Delay before retry `n` is `retry_base_delay * n`.
    pub retry_base_delay: Duration,
    /// Probe only; never read or put.
    pub dry_run: bool,
    /// File that errored tasks are appended to, if any.
    pub error_log: Option<PathBuf>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from(DEFAULT_SOURCE_DIR),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            concurrency: DEFAULT_CONCURRENCY,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            task_timeout: None,
            probe_failure: ProbeFailurePolicy::default(),
            upload_attempts: 1,
            retry_base_delay: Duration::from_secs(1),
            dry_run: false,
            error_log: None,
        }
    }
}

impl UploadConfig {
    /// Checks that the counts the scheduler divides or loops by are nonzero.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> Result<(), UploadError> {
        let invalid = |field: &str| {
            Err(UploadError::InvalidConfig {
                message: format!("{field} must be at least 1"),
            })
        };

        if self.concurrency == 0 {
            return invalid("concurrency");
        }
        if self.progress_interval == 0 {
            return invalid("progress interval");
        }
        if self.upload_attempts == 0 {
            return invalid("upload attempts");
        }
        Ok(())
    }
}

/// Number of groups a run over `files` files makes at width `width`.
#[must_use]
pub const fn group_count(files: usize, width: usize) -> usize {
    if width == 0 {
        return 0;
    }
    files.div_ceil(width)
}

/// Checks the bucket, discovers the images in `config.source_dir` and
/// uploads them.
///
/// # Errors
///
/// Returns [`UploadError::InvalidConfig`] for a bad config,
/// [`UploadError::Bucket`] if the bucket cannot be accessed,
/// [`UploadError::ListDir`] if the directory cannot be listed and
/// [`UploadError::ErrorLog`] if the error log cannot be written. Per-file
/// failures are counted, not returned.
pub async fn upload_directory(
    store: &dyn ObjectStore,
    config: &UploadConfig,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<BatchResult, UploadError> {
    config.validate()?;
    store.check_bucket().await.map_err(UploadError::Bucket)?;

    let tasks = discover::discover(&config.source_dir, &config.key_prefix)?;
    log::info!(
        "Found {} images to upload in {}",
        tasks.len(),
        config.source_dir.display()
    );

    run(store, &tasks, config, progress).await
}

/// Uploads `tasks` in sequential groups of `config.concurrency`.
///
/// Each group's pipelines run concurrently and are joined before the next
/// group starts. Outcomes are folded into the tally only at that join
/// point, which is also where errored tasks are appended to the error log.
/// Always returns a tally covering every task.
///
/// # Errors
///
/// Returns [`UploadError::InvalidConfig`] if `config` fails validation and
/// [`UploadError::ErrorLog`] if the error log cannot be written.
pub async fn run(
    store: &dyn ObjectStore,
    tasks: &[UploadTask],
    config: &UploadConfig,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<BatchResult, UploadError> {
    config.validate()?;

    let total = tasks.len() as u64;
    let reporter = ProgressReporter::new(total, config.progress_interval);
    let groups = group_count(tasks.len(), config.concurrency);
    let mut error_log = match &config.error_log {
        Some(path) => Some(ErrorLog::open(path).await?),
        None => None,
    };
    progress.set_total(total);

    let mut result = BatchResult::default();

    for (index, group) in tasks.chunks(config.concurrency).enumerate() {
        log::debug!("Group {}/{groups}: {} file(s)", index + 1, group.len());

        let outcomes = futures::future::join_all(group.iter().map(|task| async move {
            let outcome = pipeline::run_task(store, task, config).await;
            progress.task_done(&outcome);
            outcome
        }))
        .await;

        for (task, outcome) in group.iter().zip(&outcomes) {
            result.record(outcome);
            if let (Some(failures), TaskOutcome::Errored { reason }) = (error_log.as_mut(), outcome)
            {
                failures.record(task.file_name(), reason).await?;
            }
        }

        if let Some(line) = reporter.after_group(&result, index + 1 == groups) {
            progress.checkpoint(&line);
        }
    }

    if let Some(failures) = error_log.as_mut() {
        failures.flush().await?;
    }

    progress.finish(&result);
    Ok(result)
}
