//! Per-file pipeline: probe, then upload, then a single terminal outcome.
//!
//! A pipeline never returns an error to the scheduler. Every failure is
//! logged with the file name and folded into [`TaskOutcome::Errored`], so one
//! bad file cannot abort its group or the run.

use std::path::PathBuf;
use std::time::Duration;

use doc_archive_r2::{ObjectStore, R2Error};
use doc_archive_upload_models::{ProbeFailurePolicy, TaskOutcome, UploadTask};

use crate::UploadConfig;

/// Why a single task ended up errored.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// The existence probe failed and the policy escalates probe failures.
    #[error("existence probe failed: {0}")]
    Probe(#[source] R2Error),

    /// The local file could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        /// Local file path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The store rejected the put.
    #[error("{0}")]
    Put(#[source] R2Error),

    /// The pipeline did not finish within the configured limit.
    #[error("timed out after {after:?}")]
    TimedOut {
        /// The configured per-task limit.
        after: Duration,
    },
}

/// Runs one task to its terminal outcome.
///
/// Applies the per-task timeout from `config`, if any.
pub async fn run_task(
    store: &dyn ObjectStore,
    task: &UploadTask,
    config: &UploadConfig,
) -> TaskOutcome {
    let pipeline = process(store, task, config);

    let result = match config.task_timeout {
        Some(limit) => tokio::time::timeout(limit, pipeline)
            .await
            .unwrap_or_else(|_| Err(TaskError::TimedOut { after: limit })),
        None => pipeline.await,
    };

    match result {
        Ok(outcome) => outcome,
        Err(e) => {
            log::error!("Error uploading {}: {e}", task.file_name());
            TaskOutcome::Errored {
                reason: e.to_string(),
            }
        }
    }
}

async fn process(
    store: &dyn ObjectStore,
    task: &UploadTask,
    config: &UploadConfig,
) -> Result<TaskOutcome, TaskError> {
    if probe(store, task, config.probe_failure).await? {
        log::debug!("{} already exists, skipping", task.key());
        return Ok(TaskOutcome::Skipped);
    }

    if config.dry_run {
        log::info!(
            "[dry-run] would upload {} -> {} ({})",
            task.path().display(),
            task.key(),
            task.content_type()
        );
        return Ok(TaskOutcome::Uploaded);
    }

    upload_with_retry(store, task, config.upload_attempts, config.retry_base_delay).await?;
    log::debug!("uploaded {}", task.key());
    Ok(TaskOutcome::Uploaded)
}

/// Asks the store whether the task's key already exists.
///
/// With [`ProbeFailurePolicy::Absent`] a failed probe reads as "does not
/// exist", so the file is still attempted.
///
/// # Errors
///
/// Returns [`TaskError::Probe`] if the probe fails and `policy` is
/// [`ProbeFailurePolicy::Error`].
pub async fn probe(
    store: &dyn ObjectStore,
    task: &UploadTask,
    policy: ProbeFailurePolicy,
) -> Result<bool, TaskError> {
    match store.exists(task.key()).await {
        Ok(exists) => Ok(exists),
        Err(e) => match policy {
            ProbeFailurePolicy::Absent => {
                log::warn!("Probe failed for {}, treating as absent: {e}", task.key());
                Ok(false)
            }
            ProbeFailurePolicy::Error => Err(TaskError::Probe(e)),
        },
    }
}

/// Reads the whole file and puts it once under the task's key.
///
/// # Errors
///
/// Returns [`TaskError::Read`] if the file cannot be read, or
/// [`TaskError::Put`] if the store rejects the put.
pub async fn upload(store: &dyn ObjectStore, task: &UploadTask) -> Result<(), TaskError> {
    let body = tokio::fs::read(task.path())
        .await
        .map_err(|source| TaskError::Read {
            path: task.path().to_path_buf(),
            source,
        })?;

    store
        .put(task.key(), body, task.content_type().as_ref())
        .await
        .map_err(TaskError::Put)
}

/// Calls [`upload`] up to `attempts` times, sleeping `base_delay * attempt`
/// between tries.
async fn upload_with_retry(
    store: &dyn ObjectStore,
    task: &UploadTask,
    attempts: u32,
    base_delay: Duration,
) -> Result<(), TaskError> {
    let mut attempt = 1;
    loop {
        match upload(store, task).await {
            Ok(()) => return Ok(()),
            Err(e) if attempt < attempts => {
                let delay = base_delay * attempt;
                log::warn!(
                    "  upload attempt {attempt}/{attempts} for {} failed, \
                     retrying in {delay:.1?}: {e}",
                    task.file_name()
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
