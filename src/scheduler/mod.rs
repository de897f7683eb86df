//! # Scheduler Module
//!
//! Bounded worker pool with per-slot log sinks. At most `width` jobs run at
//! once; whenever any job finishes, the slot that ran it receives the next
//! unsubmitted job. A job's error or panic is confined to its own outcome.

pub mod events;
mod workers;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use crossbeam_channel::bounded;
use tracing::{info, warn};

use crate::logging::SlotLog;

pub use events::{Completion, JobOutcome, JobStatus};
use workers::{Assignment, spawn_slot};

/// Unit of work accepted by [`WorkerPool`].
pub trait PoolJob: Send + 'static {
    /// Short label written to the slot log.
    fn describe(&self) -> String;

    fn run(&self, log: &SlotLog) -> Result<JobStatus>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolTally {
    pub completed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl PoolTally {
    pub fn total(&self) -> usize {
        self.completed + self.skipped + self.failed
    }

    pub fn absorb(&mut self, other: &PoolTally) {
        self.completed += other.completed;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }

    fn record(&mut self, outcome: &JobOutcome) {
        match outcome {
            JobOutcome::Completed => self.completed += 1,
            JobOutcome::Skipped => self.skipped += 1,
            JobOutcome::Failed(_) => self.failed += 1,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PoolReport {
    /// One entry per job, in completion order.
    pub completions: Vec<Completion>,
    pub tally: PoolTally,
    /// Number of slots actually started.
    pub width: usize,
}

impl PoolReport {
    pub fn outcome_of(&self, index: usize) -> Option<&JobOutcome> {
        self.completions
            .iter()
            .find(|c| c.index == index)
            .map(|c| &c.outcome)
    }
}

/// `max(1, min(requested, jobs))`, or 0 when there is nothing to run.
pub fn effective_width(requested: usize, jobs: usize) -> usize {
    if jobs == 0 { 0 } else { requested.min(jobs).max(1) }
}

#[derive(Debug, Clone)]
pub struct WorkerPool {
    name: String,
    width: usize,
    log_dir: Option<PathBuf>,
}

impl WorkerPool {
    pub fn new(name: &str, width: usize) -> Self {
        Self {
            name: name.to_string(),
            width,
            log_dir: None,
        }
    }

    /// Write one `log_file_<slot>.log` per slot into `dir`.
    pub fn with_log_dir(mut self, dir: &Path) -> Self {
        self.log_dir = Some(dir.to_path_buf());
        self
    }

    /// Run every job to completion and report each outcome.
    pub fn run<J: PoolJob>(&self, jobs: Vec<J>) -> Result<PoolReport> {
        let width = effective_width(self.width, jobs.len());
        if width == 0 {
            return Ok(PoolReport::default());
        }
        let total = jobs.len();
        info!("{}: {} jobs on {} slots", self.name, total, width);

        let (done_tx, done_rx) = bounded::<Completion>(width);
        let mut senders = Vec::with_capacity(width);
        let mut handles = Vec::with_capacity(width);
        for slot in 0..width {
            let log = match &self.log_dir {
                Some(dir) => SlotLog::open(dir, slot)?,
                None => SlotLog::detached(slot),
            };
            let (tx, rx) = bounded::<Assignment<J>>(1);
            handles.push(spawn_slot(&self.name, slot, log, rx, done_tx.clone())?);
            senders.push(tx);
        }
        drop(done_tx);

        let mut pending = jobs.into_iter().enumerate();
        let mut in_flight = 0usize;
        for tx in &senders {
            if let Some((index, job)) = pending.next() {
                tx.send(Assignment { index, job })
                    .map_err(|_| anyhow!("worker slot closed before first job"))?;
                in_flight += 1;
            }
        }

        let mut report = PoolReport {
            completions: Vec::with_capacity(total),
            tally: PoolTally::default(),
            width,
        };
        while in_flight > 0 {
            let completion = done_rx
                .recv()
                .context("all worker slots exited with jobs in flight")?;
            in_flight -= 1;
            report.tally.record(&completion.outcome);
            if let Some((index, job)) = pending.next() {
                senders[completion.slot]
                    .send(Assignment { index, job })
                    .map_err(|_| anyhow!("worker slot {} closed", completion.slot))?;
                in_flight += 1;
            }
            report.completions.push(completion);
        }

        drop(senders);
        for handle in handles {
            if handle.join().is_err() {
                warn!("{}: a worker slot terminated abnormally", self.name);
            }
        }
        info!(
            "{}: finished completed={} skipped={} failed={}",
            self.name, report.tally.completed, report.tally.skipped, report.tally.failed
        );
        Ok(report)
    }
}
