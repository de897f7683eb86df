//! # Scheduler Workers
//!
//! Slot threads. Each slot owns one log sink and a single-entry job channel;
//! it runs whatever the dispatcher hands it until the channel closes.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::thread;
use std::time::Instant;

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender};

use crate::logging::SlotLog;

use super::PoolJob;
use super::events::{Completion, JobOutcome};

/// A job paired with its position in the submitted list.
pub(super) struct Assignment<J> {
    pub index: usize,
    pub job: J,
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Run one job inside its failure boundary.
pub(super) fn execute<J: PoolJob>(index: usize, job: &J, log: &SlotLog) -> JobOutcome {
    let label = job.describe();
    log.info(&format!("job {index} started: {label}"));
    let started = Instant::now();
    let outcome = match catch_unwind(AssertUnwindSafe(|| job.run(log))) {
        Ok(Ok(status)) => JobOutcome::from(status),
        Ok(Err(err)) => {
            let reason = format!("{err:#}");
            log.error(&format!("job {index} failed: {reason}"));
            JobOutcome::Failed(reason)
        }
        Err(payload) => {
            let reason = format!("panicked: {}", panic_message(payload));
            log.error(&format!("job {index} {reason}"));
            JobOutcome::Failed(reason)
        }
    };
    log.info(&format!(
        "job {index} finished in {:.2}s: {outcome:?}",
        started.elapsed().as_secs_f64()
    ));
    outcome
}

/// Spawn the thread backing one slot.
pub(super) fn spawn_slot<J: PoolJob>(
    pool_name: &str,
    slot: usize,
    log: SlotLog,
    rx: Receiver<Assignment<J>>,
    done_tx: Sender<Completion>,
) -> Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("{pool_name}-{slot}"))
        .spawn(move || {
            for Assignment { index, job } in rx {
                let outcome = execute(index, &job, &log);
                if let Err(err) = log.flush() {
                    tracing::warn!("slot {slot}: {err:#}");
                }
                if done_tx.send(Completion { index, slot, outcome }).is_err() {
                    break;
                }
            }
        })
        .with_context(|| format!("spawning worker slot {slot}"))
}
