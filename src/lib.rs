//! Batch radiomics feature extraction.
//!
//! A run reads one ROI catalog per ROI type, extracts features for every
//! listed scan on a bounded [`scheduler::WorkerPool`], persists one record per
//! scan, and then aggregates the records into per-scan-type tables.

pub mod aggregate;
pub mod batch;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod constants;
pub mod features;
pub mod logging;
pub mod pipeline;
pub mod processing;
pub mod record;
pub mod scan;
pub mod scheduler;
pub mod store;
pub mod util;
