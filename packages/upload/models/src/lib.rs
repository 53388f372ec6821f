#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Upload task, outcome, and run tally types for the bulk image uploader.
//!
//! Every discovered local image becomes exactly one [`UploadTask`]. Running
//! a task produces exactly one [`TaskOutcome`], and the scheduler folds
//! outcomes into a [`BatchResult`] at each group's join point.

pub mod progress;

use std::path::{Path, PathBuf};

use strum_macros::{AsRefStr, Display, EnumString};

/// File extensions picked up by directory discovery.
///
/// Matching is case-sensitive: `photo.PNG` is not an image here.
pub const IMAGE_EXTENSIONS: &[&str] = &[".png", ".jpg", ".jpeg"];

/// Content type sent with each `PutObject`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
pub enum ContentType {
    /// `.png` files.
    #[strum(serialize = "image/png")]
    Png,
    /// `.jpg` and `.jpeg` files.
    #[strum(serialize = "image/jpeg")]
    Jpeg,
    /// Anything else.
    #[strum(serialize = "application/octet-stream")]
    OctetStream,
}

impl ContentType {
    /// Infers the content type from a file name's extension.
    #[must_use]
    pub fn from_file_name(name: &str) -> Self {
        if name.ends_with(".png") {
            Self::Png
        } else if name.ends_with(".jpg") || name.ends_with(".jpeg") {
            Self::Jpeg
        } else {
            Self::OctetStream
        }
    }
}

/// Builds the remote key for a file: `{prefix}/{file_name}`.
///
/// Leading and trailing slashes on `prefix` are ignored. An empty prefix
/// yields the bare file name.
#[must_use]
pub fn object_key(prefix: &str, file_name: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        file_name.to_string()
    } else {
        format!("{prefix}/{file_name}")
    }
}

/// A single file to push to the object store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTask {
    path: PathBuf,
    file_name: String,
    key: String,
    content_type: ContentType,
}

impl UploadTask {
    /// Derives a task from a local path and the remote key prefix.
    ///
    /// Returns `None` if the path has no UTF-8 file name.
    #[must_use]
    pub fn from_path(path: impl Into<PathBuf>, prefix: &str) -> Option<Self> {
        let path = path.into();
        let file_name = path.file_name()?.to_str()?.to_string();
        let key = object_key(prefix, &file_name);
        let content_type = ContentType::from_file_name(&file_name);

        Some(Self {
            path,
            file_name,
            key,
            content_type,
        })
    }

    /// Local file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name component of [`Self::path`].
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Remote object key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Content type inferred from the extension.
    #[must_use]
    pub const fn content_type(&self) -> ContentType {
        self.content_type
    }
}

/// Terminal state of one task pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The object was put to the store.
    Uploaded,
    /// An object already existed at the key.
    Skipped,
    /// The probe or the upload failed.
    Errored {
        /// Human-readable failure message.
        reason: String,
    },
}

/// What to do when the existence probe itself fails.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, AsRefStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum ProbeFailurePolicy {
    /// Treat the object as missing and attempt the upload anyway.
    #[default]
    Absent,
    /// Mark the task errored without uploading.
    Error,
}

/// Running tally of task outcomes for one run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchResult {
    /// Tasks whose object was put to the store.
    pub uploaded: u64,
    /// Tasks skipped because the object already existed.
    pub skipped: u64,
    /// Tasks that failed.
    pub errored: u64,
}

impl BatchResult {
    /// Counts a single outcome.
    pub const fn record(&mut self, outcome: &TaskOutcome) {
        match outcome {
            TaskOutcome::Uploaded => self.uploaded += 1,
            TaskOutcome::Skipped => self.skipped += 1,
            TaskOutcome::Errored { .. } => self.errored += 1,
        }
    }

    /// Total number of tasks that reached a terminal outcome.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.uploaded + self.skipped + self.errored
    }
}

impl std::fmt::Display for BatchResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Uploaded: {} | Skipped: {} | Errors: {}",
            self.uploaded, self.skipped, self.errored
        )
    }
}
