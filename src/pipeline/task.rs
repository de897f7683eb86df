//! Scheduler adapter for scan jobs.

use std::sync::Arc;

use anyhow::Result;

use crate::logging::SlotLog;
use crate::scheduler::{JobStatus, PoolJob};

use super::{ScanJob, ScanOutcome, ScanPipeline};

pub struct ScanTask {
    pipeline: Arc<ScanPipeline>,
    job: ScanJob,
}

impl ScanTask {
    pub fn new(pipeline: Arc<ScanPipeline>, job: ScanJob) -> Self {
        Self { pipeline, job }
    }

    pub fn job(&self) -> &ScanJob {
        &self.job
    }
}

impl PoolJob for ScanTask {
    fn describe(&self) -> String {
        format!(
            "{}({}) roi={}",
            self.job.scan_id, self.job.roi_type_label, self.job.roi_name
        )
    }

    fn run(&self, log: &SlotLog) -> Result<JobStatus> {
        match self.pipeline.process(&self.job, log)? {
            ScanOutcome::Saved(_) => Ok(JobStatus::Completed),
            ScanOutcome::Skipped(_) => Ok(JobStatus::Skipped),
        }
    }
}
