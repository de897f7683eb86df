//! # Batch Module
//!
//! Orchestrates one run: the scan phase for every ROI type, then (after all
//! scan jobs have finished) the table phase.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::aggregate::{self, ExportFormat, TableTask};
use crate::catalog;
use crate::config::{ComputationConfig, LoadedConfig};
use crate::constants::{SCAN_LOG_DIR_PREFIX, TABLE_LOG_DIR};
use crate::logging::prepare_log_dir;
use crate::pipeline::{ScanJob, ScanPipeline, ScanTask};
use crate::scan::{FileScanSource, ScanSource};
use crate::scheduler::{JobOutcome, PoolJob, PoolReport, PoolTally, WorkerPool};
use crate::store::ResultStore;
use crate::util;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub scans: PoolTally,
    /// `None` when the table phase was disabled.
    pub tables: Option<PoolTally>,
}

pub struct BatchExtractor {
    config: Arc<ComputationConfig>,
    config_hash: String,
    catalog_dir: PathBuf,
    save_dir: PathBuf,
    source: Arc<dyn ScanSource>,
    width: Option<usize>,
    create_tables: bool,
    table_format: ExportFormat,
}

impl BatchExtractor {
    /// Scans are read from `read_dir`, catalogs from `catalog_dir`; every
    /// output lands under `save_dir`.
    pub fn new(loaded: LoadedConfig, read_dir: &Path, catalog_dir: &Path, save_dir: &Path) -> Self {
        Self {
            config: Arc::new(loaded.config),
            config_hash: loaded.config_hash,
            catalog_dir: catalog_dir.to_path_buf(),
            save_dir: save_dir.to_path_buf(),
            source: Arc::new(FileScanSource::new(read_dir)),
            width: None,
            create_tables: true,
            table_format: ExportFormat::default(),
        }
    }

    pub fn with_source(mut self, source: Arc<dyn ScanSource>) -> Self {
        self.source = source;
        self
    }

    /// Overrides the configured pool width.
    pub fn with_width(mut self, width: usize) -> Self {
        self.width = Some(width);
        self
    }

    pub fn with_tables(mut self, create_tables: bool) -> Self {
        self.create_tables = create_tables;
        self
    }

    pub fn with_table_format(mut self, format: ExportFormat) -> Self {
        self.table_format = format;
        self
    }

    fn width(&self) -> usize {
        self.width
            .filter(|w| *w > 0)
            .unwrap_or_else(|| self.config.pool_width())
    }

    pub fn run(&self) -> Result<BatchSummary> {
        let started = Instant::now();
        util::ensure_output_dir(&self.save_dir)?;
        let store = ResultStore::new(&self.save_dir);
        let pipeline = Arc::new(ScanPipeline::new(
            &self.config_hash,
            Arc::clone(&self.source),
            store.clone(),
        ));

        let mut summary = BatchSummary::default();
        for (roi_type, label) in self.config.roi_type_pairs() {
            let tally = self.scan_phase(&pipeline, roi_type, label)?;
            summary.scans.absorb(&tally);
        }

        if self.create_tables {
            summary.tables = Some(self.table_phase(&store)?);
        } else {
            info!("table creation disabled");
        }

        info!(
            "batch finished in {:.1}s: scans completed={} skipped={} failed={}",
            started.elapsed().as_secs_f64(),
            summary.scans.completed,
            summary.scans.skipped,
            summary.scans.failed
        );
        if let Some(tables) = summary.tables {
            info!(
                "tables completed={} failed={}",
                tables.completed, tables.failed
            );
        }
        Ok(summary)
    }

    fn scan_phase(&self, pipeline: &Arc<ScanPipeline>, roi_type: &str, label: &str) -> Result<PoolTally> {
        let entries = catalog::read_catalog(&self.catalog_dir, label)
            .with_context(|| format!("reading catalog for `{label}`"))?;
        let log_dir = prepare_log_dir(&self.save_dir, &format!("{SCAN_LOG_DIR_PREFIX}{label}"))?;
        let tasks: Vec<ScanTask> = entries
            .into_iter()
            .map(|entry| {
                ScanTask::new(
                    Arc::clone(pipeline),
                    ScanJob {
                        scan_id: entry.scan_id,
                        roi_name: entry.roi_name,
                        roi_type: roi_type.to_string(),
                        roi_type_label: label.to_string(),
                        config: Arc::clone(&self.config),
                    },
                )
            })
            .collect();
        info!("{roi_type}({label}): {} scans", tasks.len());
        let report = self.run_pool(&format!("scan-{label}"), &log_dir, tasks)?;
        Ok(report.tally)
    }

    fn table_phase(&self, store: &ResultStore) -> Result<PoolTally> {
        let log_dir = prepare_log_dir(&self.save_dir, TABLE_LOG_DIR)?;
        let mut tasks = Vec::new();
        for (roi_type, label) in self.config.roi_type_pairs() {
            for group in aggregate::discover_tables(store, roi_type, label)? {
                tasks.push(TableTask::new(store.clone(), group, self.table_format));
            }
        }
        info!("{} tables to build", tasks.len());
        let report = self.run_pool("tables", &log_dir, tasks)?;
        Ok(report.tally)
    }

    fn run_pool<J: PoolJob>(&self, name: &str, log_dir: &Path, jobs: Vec<J>) -> Result<PoolReport> {
        let labels: Vec<String> = jobs.iter().map(PoolJob::describe).collect();
        let report = WorkerPool::new(name, self.width())
            .with_log_dir(log_dir)
            .run(jobs)?;
        for completion in &report.completions {
            if let JobOutcome::Failed(reason) = &completion.outcome {
                warn!(
                    "{name}: {} failed: {reason}",
                    labels.get(completion.index).map(String::as_str).unwrap_or("?")
                );
            }
        }
        Ok(report)
    }
}
