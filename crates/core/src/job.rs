// SPDX-License-Identifier: MIT

//! Job record: a coarse container grouping one scheduler run.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub kind: String,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub status: JobStatus,
    pub started_at_ms: u64,
    pub ended_at_ms: Option<u64>,
    /// Integer percentage 0-100, rate-limited by the scheduler when updated.
    pub progress: u8,
    pub error: Option<String>,
}

impl JobRecord {
    pub fn new(id: impl Into<String>, kind: impl Into<String>, input_dir: PathBuf, output_dir: PathBuf, started_at_ms: u64) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            input_dir,
            output_dir,
            status: JobStatus::Pending,
            started_at_ms,
            ended_at_ms: None,
            progress: 0,
            error: None,
        }
    }

    pub fn start(&mut self) {
        self.status = JobStatus::Running;
    }

    pub fn finish(&mut self, status: JobStatus, ended_at_ms: u64) {
        self.status = status;
        self.ended_at_ms = Some(ended_at_ms);
        if status == JobStatus::Completed {
            self.progress = 100;
        }
    }

    pub fn fail(&mut self, error: impl Into<String>, ended_at_ms: u64) {
        self.error = Some(error.into());
        self.finish(JobStatus::Failed, ended_at_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_job_is_pending() {
        let j = JobRecord::new("job-1", "batch", PathBuf::from("/in"), PathBuf::from("/out"), 0);
        assert_eq!(j.status, JobStatus::Pending);
    }

    #[test]
    fn finish_completed_sets_progress_full() {
        let mut j = JobRecord::new("job-1", "batch", PathBuf::from("/in"), PathBuf::from("/out"), 0);
        j.start();
        j.finish(JobStatus::Completed, 10);
        assert_eq!(j.progress, 100);
        assert_eq!(j.ended_at_ms, Some(10));
    }

    #[test]
    fn fail_records_error() {
        let mut j = JobRecord::new("job-1", "batch", PathBuf::from("/in"), PathBuf::from("/out"), 0);
        j.fail("ports unavailable", 5);
        assert_eq!(j.status, JobStatus::Failed);
        assert_eq!(j.error.as_deref(), Some("ports unavailable"));
    }
}
