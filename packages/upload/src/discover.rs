//! Local directory discovery.
//!
//! Lists a single directory (no recursion) and turns every image file into
//! an [`UploadTask`]. Tasks come back sorted by file name so repeated runs
//! over the same directory form the same groups.

use std::path::Path;

use doc_archive_upload_models::{IMAGE_EXTENSIONS, UploadTask};

use crate::UploadError;

/// Lists `dir` and builds one task per image file, keyed under `prefix`.
///
/// Only regular files whose name ends in `.png`, `.jpg` or `.jpeg`
/// (case-sensitive) are kept. Image files whose names are not valid UTF-8
/// are skipped with a warning; other entries are skipped silently.
///
/// # Errors
///
/// Returns [`UploadError::ListDir`] if the directory cannot be listed.
pub fn discover(dir: &Path, prefix: &str) -> Result<Vec<UploadTask>, UploadError> {
    let list_err = |source: std::io::Error| UploadError::ListDir {
        path: dir.to_path_buf(),
        source,
    };

    let mut tasks = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(list_err)? {
        let path = entry.map_err(list_err)?.path();

        match candidate(&path) {
            Candidate::Image if path.is_file() => {
                if let Some(task) = UploadTask::from_path(&path, prefix) {
                    tasks.push(task);
                }
            }
            Candidate::Undecodable if path.is_file() => {
                log::warn!("Skipping non-UTF-8 file name: {}", path.display());
            }
            _ => {}
        }
    }

    tasks.sort_by(|a, b| a.file_name().cmp(b.file_name()));
    Ok(tasks)
}

#[derive(Debug, PartialEq, Eq)]
enum Candidate {
    Image,
    /// Image extension, but the name is not valid UTF-8.
    Undecodable,
    Other,
}

/// Classifies a directory entry by its raw file name, so non-image
/// entries are rejected before any UTF-8 decoding.
fn candidate(path: &Path) -> Candidate {
    let Some(name) = path.file_name() else {
        return Candidate::Other;
    };
    let raw = name.as_encoded_bytes();
    if !IMAGE_EXTENSIONS
        .iter()
        .any(|ext| raw.ends_with(ext.as_bytes()))
    {
        return Candidate::Other;
    }
    if name.to_str().is_some() {
        Candidate::Image
    } else {
        Candidate::Undecodable
    }
}
