//! Periodic progress lines for an upload run.

use doc_archive_upload_models::BatchResult;

/// Emits `Progress: P/N | Uploaded: U | Skipped: S | Errors: E` after a
/// group when the processed count hits the interval or the run is on its
/// last group.
///
/// Purely observational: it reads the tally and never changes it.
#[derive(Debug, Clone, Copy)]
pub struct ProgressReporter {
    total: u64,
    interval: u64,
}

impl ProgressReporter {
    /// Creates a reporter for a run over `total` files.
    ///
    /// An `interval` of zero is treated as one.
    #[must_use]
    pub fn new(total: u64, interval: u64) -> Self {
        Self {
            total,
            interval: interval.max(1),
        }
    }

    /// Whether a line is due after a group that left `processed` files done.
    #[must_use]
    pub const fn is_due(&self, processed: u64, final_group: bool) -> bool {
        final_group || processed % self.interval == 0
    }

    /// Formats the progress line for the current tally.
    #[must_use]
    pub fn line(&self, result: &BatchResult) -> String {
        format!("Progress: {}/{} | {result}", result.total(), self.total)
    }

    /// Logs the progress line if one is due, returning what was logged.
    pub fn after_group(&self, result: &BatchResult, final_group: bool) -> Option<String> {
        if !self.is_due(result.total(), final_group) {
            return None;
        }
        let line = self.line(result);
        log::info!("{line}");
        Some(line)
    }
}
