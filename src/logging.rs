//! # Logging Module
//!
//! Process-wide `tracing` setup plus the per-slot log files written by the
//! worker pool. Each slot owns one append-only file for the whole run, so a
//! file holds the history of every job its slot executed.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::constants::SLOT_LOG_PREFIX;

/// Install the global subscriber. `RUST_LOG` selects the filter (default
/// `info`); `RADIOBATCH_LOG_FORMAT=json` switches to JSON lines.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("RADIOBATCH_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    // A subscriber may already be installed (tests, embedding callers).
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Info,
    Warn,
    Error,
}

impl Level {
    fn tag(self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }
}

/// Log sink bound to one worker slot.
pub struct SlotLog {
    slot: usize,
    path: Option<PathBuf>,
    writer: Option<Mutex<BufWriter<File>>>,
}

impl SlotLog {
    /// Open (append) `log_file_<slot>.log` inside `dir`.
    pub fn open(dir: &Path, slot: usize) -> Result<Self> {
        let path = dir.join(format!("{SLOT_LOG_PREFIX}{slot}.log"));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening slot log {}", path.display()))?;
        Ok(Self {
            slot,
            path: Some(path),
            writer: Some(Mutex::new(BufWriter::new(file))),
        })
    }

    /// A sink that only mirrors to `tracing`.
    pub fn detached(slot: usize) -> Self {
        Self {
            slot,
            path: None,
            writer: None,
        }
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn info(&self, message: &str) {
        self.write(Level::Info, message);
    }

    pub fn warn(&self, message: &str) {
        self.write(Level::Warn, message);
    }

    pub fn error(&self, message: &str) {
        self.write(Level::Error, message);
    }

    fn write(&self, level: Level, message: &str) {
        match level {
            Level::Info => info!(slot = self.slot, "{message}"),
            Level::Warn => warn!(slot = self.slot, "{message}"),
            Level::Error => error!(slot = self.slot, "{message}"),
        }
        let Some(writer) = &self.writer else {
            return;
        };
        let now: DateTime<Local> = Local::now();
        let line = format!("{} {:<5} {}\n", now.format("%Y-%m-%d %H:%M:%S%.3f"), level.tag(), message);
        let mut guard = writer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(err) = guard.write_all(line.as_bytes()) {
            warn!("slot {} log write failed: {err}", self.slot);
        }
    }

    pub fn flush(&self) -> Result<()> {
        if let Some(writer) = &self.writer {
            let mut guard = writer.lock().unwrap_or_else(PoisonError::into_inner);
            guard.flush().context("flushing slot log")?;
        }
        Ok(())
    }
}

impl Drop for SlotLog {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

/// Create a fresh log directory `parent/name`. A directory left by an earlier
/// run is renamed with its modification time as suffix.
pub fn prepare_log_dir(parent: &Path, name: &str) -> Result<PathBuf> {
    let dir = parent.join(name);
    if dir.exists() {
        let modified = std::fs::metadata(&dir)
            .and_then(|m| m.modified())
            .with_context(|| format!("reading mtime of {}", dir.display()))?;
        let stamp: DateTime<Local> = modified.into();
        let mut rotated = parent.join(format!("{name}_{}", stamp.format("%d-%b-%Y_%HH%MM%SS")));
        let mut n = 1;
        while rotated.exists() {
            rotated = parent.join(format!("{name}_{}_{n}", stamp.format("%d-%b-%Y_%HH%MM%SS")));
            n += 1;
        }
        std::fs::rename(&dir, &rotated)
            .with_context(|| format!("rotating {} to {}", dir.display(), rotated.display()))?;
        info!("rotated previous log directory to {}", rotated.display());
    }
    std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
    Ok(dir)
}
