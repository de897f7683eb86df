use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, bail};
use radiobatch::logging::SlotLog;
use radiobatch::scheduler::{JobOutcome, JobStatus, PoolJob, WorkerPool};
use tempfile::tempdir;

struct Recorded {
    index: usize,
    calls: Arc<Mutex<Vec<(usize, usize)>>>,
}

impl PoolJob for Recorded {
    fn describe(&self) -> String {
        format!("job #{}", self.index)
    }

    fn run(&self, log: &SlotLog) -> Result<JobStatus> {
        self.calls
            .lock()
            .expect("calls")
            .push((self.index, log.slot()));
        std::thread::sleep(Duration::from_millis(2 + (self.index as u64 % 4) * 3));
        match self.index {
            4 => bail!("job four always fails"),
            7 => panic!("job seven panics"),
            9 => Ok(JobStatus::Skipped),
            _ => Ok(JobStatus::Completed),
        }
    }
}

#[test]
fn every_job_runs_once_and_failures_stay_isolated() {
    let dir = tempdir().expect("tempdir");
    let calls = Arc::new(Mutex::new(Vec::new()));
    let jobs: Vec<Recorded> = (0..10)
        .map(|index| Recorded {
            index,
            calls: Arc::clone(&calls),
        })
        .collect();

    let report = WorkerPool::new("contract", 3)
        .with_log_dir(dir.path())
        .run(jobs)
        .expect("run");

    assert_eq!(report.width, 3);
    assert_eq!(report.completions.len(), 10);
    assert_eq!(report.tally.completed, 7);
    assert_eq!(report.tally.skipped, 1);
    assert_eq!(report.tally.failed, 2);
    assert!(matches!(report.outcome_of(4), Some(JobOutcome::Failed(reason)) if reason.contains("always fails")));
    assert!(matches!(report.outcome_of(7), Some(JobOutcome::Failed(reason)) if reason.contains("panics")));

    let mut indices: Vec<usize> = calls.lock().expect("calls").iter().map(|(i, _)| *i).collect();
    indices.sort_unstable();
    assert_eq!(indices, (0..10).collect::<Vec<_>>());

    // Each completion is reported by the slot that ran the job.
    for (index, slot) in calls.lock().expect("calls").iter() {
        let completion = report
            .completions
            .iter()
            .find(|c| c.index == *index)
            .expect("completion");
        assert_eq!(completion.slot, *slot);
    }

    let logs: Vec<String> = std::fs::read_dir(dir.path())
        .expect("list")
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect();
    assert!(logs.len() <= 3);
    assert!(logs.iter().all(|name| name.starts_with("log_file_") && name.ends_with(".log")));
    let all_logs: String = logs
        .iter()
        .map(|name| std::fs::read_to_string(dir.path().join(name)).expect("read log"))
        .collect();
    assert!(all_logs.contains("job #4"));
    assert!(all_logs.contains("always fails"));
}

#[test]
fn width_larger_than_job_count_starts_one_slot_per_job() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let jobs: Vec<Recorded> = [0, 1]
        .into_iter()
        .map(|index| Recorded {
            index,
            calls: Arc::clone(&calls),
        })
        .collect();
    let report = WorkerPool::new("wide", 16).run(jobs).expect("run");
    assert_eq!(report.width, 2);
    assert_eq!(report.tally.completed, 2);
}
