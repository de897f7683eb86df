//! # Scheduler Events
//!
//! Messages flowing from worker slots back to the dispatcher.

use serde::Serialize;

/// What a job reports when it returns normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Completed,
    /// Nothing to do (e.g. the output already exists).
    Skipped,
}

/// How a job ended, as observed by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum JobOutcome {
    Completed,
    Skipped,
    /// Returned error or panic, already written to the slot log.
    Failed(String),
}

impl JobOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, JobOutcome::Failed(_))
    }
}

impl From<JobStatus> for JobOutcome {
    fn from(status: JobStatus) -> Self {
        match status {
            JobStatus::Completed => JobOutcome::Completed,
            JobStatus::Skipped => JobOutcome::Skipped,
        }
    }
}

/// Sent by a slot each time it finishes a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Position of the job in the submitted list.
    pub index: usize,
    pub slot: usize,
    pub outcome: JobOutcome,
}
