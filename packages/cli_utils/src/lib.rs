#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared CLI utilities for the doc archive tools.
//!
//! Provides an `indicatif`-backed upload bar behind the
//! [`ProgressCallback`] trait, plus [`init_logger`] which sets up
//! `indicatif-log-bridge` so that `log::info!` and friends are suspended
//! while progress bars redraw.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use doc_archive_upload_models::progress::ProgressCallback;
use doc_archive_upload_models::{BatchResult, TaskOutcome};
use indicatif::{ProgressBar, ProgressStyle};

pub use indicatif::MultiProgress;

/// An `indicatif` [`ProgressBar`] for an upload run.
///
/// Keeps its own uploaded/skipped/errored counts from the outcomes it is
/// handed and shows them next to the bar.
pub struct IndicatifProgress {
    bar: ProgressBar,
    /// Style to switch to once `set_total()` provides a known length.
    bar_style: ProgressStyle,
    uploaded: AtomicU64,
    skipped: AtomicU64,
    errored: AtomicU64,
}

impl IndicatifProgress {
    /// Creates the upload bar.
    ///
    /// Starts as a spinner while the directory is listed and transitions to
    /// a full bar with percentage/ETA and the running tally once
    /// [`ProgressCallback::set_total()`] is called.
    #[must_use]
    pub fn upload_bar(multi: &MultiProgress, message: &str) -> Arc<dyn ProgressCallback> {
        let bar = multi.add(ProgressBar::new_spinner());
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_message(message.to_string());
        Arc::new(Self::with_bar(bar))
    }

    fn with_bar(bar: ProgressBar) -> Self {
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );

        let bar_style = ProgressStyle::with_template(
            "  {wide_bar:.cyan/dim} {pos}/{len} {percent}% [{eta}] {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");

        Self {
            bar,
            bar_style,
            uploaded: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            errored: AtomicU64::new(0),
        }
    }

    /// Counts seen so far.
    #[must_use]
    pub fn tally(&self) -> BatchResult {
        BatchResult {
            uploaded: self.uploaded.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            errored: self.errored.load(Ordering::Relaxed),
        }
    }
}

impl ProgressCallback for IndicatifProgress {
    fn set_total(&self, total: u64) {
        self.bar.set_length(total);
        self.bar.set_position(0);
        self.bar.set_style(self.bar_style.clone());
        self.bar.set_message(self.tally().to_string());
    }

    fn task_done(&self, outcome: &TaskOutcome) {
        let counter = match outcome {
            TaskOutcome::Uploaded => &self.uploaded,
            TaskOutcome::Skipped => &self.skipped,
            TaskOutcome::Errored { .. } => &self.errored,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        self.bar.inc(1);
        self.bar.set_message(self.tally().to_string());
    }

    fn finish(&self, result: &BatchResult) {
        self.bar.finish_with_message(format!("Done: {result}"));
    }
}

/// Initializes the global logger wrapped in `indicatif-log-bridge` so that
/// `log::info!` and friends are suspended while progress bars redraw.
///
/// Returns the [`MultiProgress`] that all progress bars must be added to.
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let logger = pretty_env_logger::formatted_builder()
        .parse_env("RUST_LOG")
        .build();
    let level = logger.filter();

    indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .ok(); // already set (e.g., in tests)

    log::set_max_level(level);

    multi
}
