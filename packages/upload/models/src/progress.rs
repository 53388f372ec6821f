//! Progress reporting trait for upload runs.
//!
//! Decouples per-file progress from any rendering backend. The CLI renders
//! an `indicatif` bar; tests and library callers can pass [`NullProgress`].

use std::sync::Arc;

use crate::{BatchResult, TaskOutcome};

/// Trait for reporting progress from a long-running upload.
///
/// Implementations must be `Send + Sync` so one instance can be shared by
/// every task in a group.
pub trait ProgressCallback: Send + Sync {
    /// Set the number of files the run will process (enables percentage/ETA).
    fn set_total(&self, total: u64);

    /// Called once per task, as soon as it reaches its terminal outcome.
    ///
    /// Tasks in the same group finish in any order.
    fn task_done(&self, outcome: &TaskOutcome);

    /// Called with each periodic `Progress: ...` line the run logs.
    fn checkpoint(&self, _line: &str) {}

    /// Mark the run as complete with its final tally.
    fn finish(&self, result: &BatchResult);
}

/// A no-op implementation of [`ProgressCallback`].
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn task_done(&self, _outcome: &TaskOutcome) {}
    fn finish(&self, _result: &BatchResult) {}
}

/// Returns a shared [`NullProgress`] instance for convenient use.
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
