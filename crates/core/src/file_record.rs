// SPDX-License-Identifier: MIT

//! Per-file processing record.
//!
//! One [`FileRecord`] exists per distinct relative path under the input
//! root. `status` is the only field that moves through a lifecycle:
//! `(nothing) -> InProgress -> {Completed | Failed}`, with a failed file
//! eligible to be re-enqueued back to `InProgress`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Lifecycle status of a single file's processing attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    InProgress,
    Completed,
    Failed,
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileStatus::InProgress => write!(f, "in_progress"),
            FileStatus::Completed => write!(f, "completed"),
            FileStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Durable record of one input file's processing outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub relative_path: String,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    /// First 16 bytes of SHA-256 over the input content (128-bit, MD5-equivalent).
    pub input_hash: String,
    pub file_size: u64,
    pub status: FileStatus,
    pub started_at_ms: u64,
    pub ended_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default)]
    pub concepts_found: u64,
    #[serde(default)]
    pub processing_time_secs: f64,
}

impl FileRecord {
    pub fn new_in_progress(
        relative_path: impl Into<String>,
        input_path: PathBuf,
        output_path: PathBuf,
        input_hash: impl Into<String>,
        file_size: u64,
        started_at_ms: u64,
    ) -> Self {
        Self {
            relative_path: relative_path.into(),
            input_path,
            output_path,
            input_hash: input_hash.into(),
            file_size,
            status: FileStatus::InProgress,
            started_at_ms,
            ended_at_ms: None,
            error_message: None,
            concepts_found: 0,
            processing_time_secs: 0.0,
        }
    }

    pub fn mark_completed(&mut self, concepts_found: u64, processing_time_secs: f64, ended_at_ms: u64) {
        self.status = FileStatus::Completed;
        self.concepts_found = concepts_found;
        self.processing_time_secs = processing_time_secs;
        self.ended_at_ms = Some(ended_at_ms);
        self.error_message = None;
    }

    pub fn mark_failed(&mut self, error_message: impl Into<String>, ended_at_ms: u64) {
        self.status = FileStatus::Failed;
        self.error_message = Some(error_message.into());
        self.ended_at_ms = Some(ended_at_ms);
    }

    pub fn is_completed(&self) -> bool {
        self.status == FileStatus::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> FileRecord {
        FileRecord::new_in_progress(
            "a.txt",
            PathBuf::from("/in/a.txt"),
            PathBuf::from("/out/a.csv"),
            "deadbeefdeadbeef",
            42,
            1_000,
        )
    }

    #[test]
    fn new_record_is_in_progress() {
        let r = record();
        assert_eq!(r.status, FileStatus::InProgress);
        assert!(!r.is_completed());
    }

    #[test]
    fn mark_completed_sets_fields() {
        let mut r = record();
        r.mark_completed(12, 1.5, 2_000);
        assert!(r.is_completed());
        assert_eq!(r.concepts_found, 12);
        assert_eq!(r.ended_at_ms, Some(2_000));
        assert!(r.error_message.is_none());
    }

    #[test]
    fn mark_failed_sets_error() {
        let mut r = record();
        r.mark_failed("timeout", 2_000);
        assert_eq!(r.status, FileStatus::Failed);
        assert_eq!(r.error_message.as_deref(), Some("timeout"));
    }
}
