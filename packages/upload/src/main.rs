#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for uploading extracted archive images to R2.
//!
//! Credentials come from the environment (see [`doc_archive_r2`]); every
//! other setting is a flag. The bucket is checked before any file is
//! touched, and an inaccessible bucket fails the process. Per-file failures
//! never do: the run always finishes and prints its final tally.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Parser;
use doc_archive_cli_utils::IndicatifProgress;
use doc_archive_r2::R2Client;
use doc_archive_upload::{
    DEFAULT_CONCURRENCY, DEFAULT_KEY_PREFIX, DEFAULT_PROGRESS_INTERVAL, DEFAULT_SOURCE_DIR,
    UploadConfig, UploadError,
};
use doc_archive_upload_models::ProbeFailurePolicy;

#[derive(Parser)]
#[command(name = "doc_archive_upload", about = "Upload extracted images to R2")]
struct Cli {
    /// Directory of extracted images to upload
    #[arg(default_value = DEFAULT_SOURCE_DIR)]
    dir: PathBuf,
    /// Key prefix the file name is joined to (e.g., "images")
    #[arg(long, default_value = DEFAULT_KEY_PREFIX)]
    prefix: String,
    /// Number of files uploaded concurrently per group
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,
    /// Log a progress line every N processed files
    #[arg(long, default_value_t = DEFAULT_PROGRESS_INTERVAL)]
    progress_interval: u64,
    /// Give up on a single file after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,
    /// How to treat a failed existence check: `absent` uploads anyway,
    /// `error` counts the file as errored
    #[arg(long, default_value_t = ProbeFailurePolicy::Absent)]
    probe_failure: ProbeFailurePolicy,
    /// Total upload tries per file
    #[arg(long, default_value_t = 1)]
    upload_attempts: u32,
    /// Base delay between upload retries, in milliseconds
    #[arg(long, default_value_t = 1000)]
    retry_delay_ms: u64,
    /// Check which files are missing without uploading anything
    #[arg(long)]
    dry_run: bool,
    /// Append `UPLOAD_ERROR: <file> - <reason>` lines for failed files here
    #[arg(long)]
    error_log: Option<PathBuf>,
}

impl Cli {
    fn into_config(self) -> UploadConfig {
        UploadConfig {
            source_dir: self.dir,
            key_prefix: self.prefix,
            concurrency: self.concurrency,
            progress_interval: self.progress_interval,
            task_timeout: self.timeout_secs.map(Duration::from_secs),
            probe_failure: self.probe_failure,
            upload_attempts: self.upload_attempts,
            retry_base_delay: Duration::from_millis(self.retry_delay_ms),
            dry_run: self.dry_run,
            error_log: self.error_log,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = doc_archive_cli_utils::init_logger();
    let config = Cli::parse().into_config();
    config.validate()?;

    let store = match R2Client::from_env() {
        Ok(client) => client,
        Err(e) => {
            log::error!("R2 not configured: {e}");
            log::error!(
                "Required env vars: R2_ENDPOINT (or CLOUDFLARE_ACCOUNT_ID), \
                 R2_ACCESS_KEY_ID, R2_SECRET_ACCESS_KEY, R2_BUCKET_NAME"
            );
            return Err(e.into());
        }
    };

    log::info!(
        "Uploading {} to s3://{}/{}{}",
        config.source_dir.display(),
        store.bucket(),
        config.key_prefix.trim_matches('/'),
        if config.dry_run { " (dry run)" } else { "" }
    );

    let progress = IndicatifProgress::upload_bar(&multi, "Checking bucket...");
    let start = Instant::now();
    let result = match doc_archive_upload::upload_directory(&store, &config, &progress).await {
        Ok(result) => result,
        Err(e @ UploadError::Bucket(_)) => {
            log::error!("{e}");
            log::error!("Check R2_BUCKET_NAME and that the credentials can access it");
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };

    log::info!(
        "Done! Uploaded: {}, Skipped: {}, Errors: {} in {:.1}s",
        result.uploaded,
        result.skipped,
        result.errored,
        start.elapsed().as_secs_f64()
    );

    if let Some(path) = config.error_log.as_ref().filter(|_| result.errored > 0) {
        log::info!("Error log: {}", path.display());
    }

    Ok(())
}
