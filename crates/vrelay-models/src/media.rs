//! Acquired media and split parts.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A file produced by the acquisition step.
///
/// The backing file lives inside the job's temporary working directory and
/// disappears with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquiredMedia {
    /// Path of the downloaded file
    pub local_path: PathBuf,
    /// Title reported by the backend
    pub title: String,
    /// File size in bytes
    pub size_bytes: u64,
    /// Duration in seconds (0.0 when the backend did not report one)
    pub duration_seconds: f64,
    /// `scheme://host` of the source URL
    pub origin_domain: Option<String>,
}

/// One segment of a split file. Sequence indices are 1-based and contiguous.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    pub path: PathBuf,
    pub sequence_index: usize,
    pub total_parts: usize,
}

impl Part {
    /// Caption label, e.g. `Part 3/14`.
    pub fn label(&self) -> String {
        format!("Part {}/{}", self.sequence_index, self.total_parts)
    }

    pub fn is_last(&self) -> bool {
        self.sequence_index == self.total_parts
    }
}
