//! # Aggregate Module
//!
//! Groups saved per-scan records into tables, one table per scan type,
//! ROI label and feature space. Groups come from the per-scan manifests;
//! every table is built by one [`TableTask`] under the worker pool.

pub mod export;

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Result;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::constants::{COLUMN_SEPARATOR, TABLE_PREFIX};
use crate::features::FeatureGroup;
use crate::logging::SlotLog;
use crate::record::{GroupOutcome, ScanManifest, SpaceFeatures};
use crate::scheduler::{JobStatus, PoolJob};
use crate::store::{ResultStore, StoreError};

pub use export::ExportFormat;

#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("table {table}: scan {scan_id} lists feature spaces {found:?}, expected {expected:?}")]
    Heterogeneous {
        table: String,
        scan_id: String,
        expected: Vec<String>,
        found: Vec<String>,
    },
    #[error("table {table}: record for {scan_id} has no `{space}` space")]
    MissingSpace {
        table: String,
        scan_id: String,
        space: String,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("csv error: {0}")]
    Csv(#[from] ::csv::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("parquet error: {0}")]
    Parquet(String),
}

/// Grouping key of one output table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TableTag {
    pub scan_type: String,
    pub roi_type_label: String,
    pub roi_type: String,
    pub space: String,
    pub modality: String,
}

impl TableTag {
    pub fn table_name(&self) -> String {
        format!(
            "{TABLE_PREFIX}{}({}){COLUMN_SEPARATOR}{}",
            self.scan_type, self.roi_type_label, self.space
        )
    }
}

/// One table to build: its tag and the scans that belong to it.
#[derive(Debug, Clone)]
pub struct TableGroup {
    pub tag: TableTag,
    /// Feature spaces of the representative (first) scan.
    pub spaces: Vec<String>,
    pub members: Vec<ScanManifest>,
}

/// Discover tables for one ROI type and label from the saved manifests.
pub fn discover_tables(store: &ResultStore, roi_type: &str, roi_type_label: &str) -> Result<Vec<TableGroup>, StoreError> {
    let mut by_scan_type: BTreeMap<(String, String), Vec<ScanManifest>> = BTreeMap::new();
    for manifest in store.manifests(roi_type, roi_type_label)? {
        let key = (manifest.scan_id.scan_name.clone(), manifest.scan_id.modality.clone());
        by_scan_type.entry(key).or_default().push(manifest);
    }

    let mut groups = Vec::new();
    for ((scan_type, modality), members) in by_scan_type {
        let Some(representative) = members.first() else {
            continue;
        };
        let spaces = representative.spaces.clone();
        for space in &spaces {
            groups.push(TableGroup {
                tag: TableTag {
                    scan_type: scan_type.clone(),
                    roi_type_label: roi_type_label.to_string(),
                    roi_type: roi_type.to_string(),
                    space: space.clone(),
                    modality: modality.clone(),
                },
                spaces: spaces.clone(),
                members: members.clone(),
            });
        }
    }
    debug!("{roi_type}/{roi_type_label}: {} tables", groups.len());
    Ok(groups)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRow {
    pub scan_id: String,
    pub values: Vec<Option<f64>>,
}

/// Flattened table: one row per scan, one column per `<group>__<feature>`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RadiomicsTable {
    pub name: String,
    pub tag: TableTag,
    pub columns: Vec<String>,
    pub rows: Vec<TableRow>,
}

/// Structured table artifact: every scan's groups with their outcomes.
#[derive(Debug, Clone, Serialize)]
pub struct StructuredTable<'a> {
    pub name: &'a str,
    pub tag: &'a TableTag,
    pub scans: &'a BTreeMap<String, SpaceFeatures>,
}

/// Rank of a group key in canonical group order; texture keys rank with
/// their group.
fn group_rank(key: &str) -> usize {
    FeatureGroup::NON_TEXTURE
        .iter()
        .chain(FeatureGroup::TEXTURE.iter())
        .position(|g| key == g.key() || key.starts_with(&format!("{}_scale", g.key())))
        .unwrap_or(usize::MAX)
}

/// Flatten per-scan groups into a table. Rows are sorted by scan id; columns
/// are the union over all scans, ordered by canonical group order, then group
/// key, then feature name.
pub fn build_table(tag: &TableTag, scans: &BTreeMap<String, SpaceFeatures>) -> RadiomicsTable {
    let mut keyed: Vec<(usize, &str, &str)> = Vec::new();
    for groups in scans.values() {
        for (key, outcome) in groups {
            let Some(features) = outcome.features() else {
                continue;
            };
            for feature in features.keys() {
                keyed.push((group_rank(key), key.as_str(), feature.as_str()));
            }
        }
    }
    keyed.sort_unstable();
    keyed.dedup();

    let columns: Vec<String> = keyed
        .iter()
        .map(|(_, key, feature)| format!("{key}{COLUMN_SEPARATOR}{feature}"))
        .collect();
    let rows = scans
        .iter()
        .map(|(scan_id, groups)| TableRow {
            scan_id: scan_id.clone(),
            values: keyed
                .iter()
                .map(|(_, key, feature)| {
                    groups
                        .get(*key)
                        .and_then(GroupOutcome::features)
                        .and_then(|f| f.get(*feature).copied().flatten())
                })
                .collect(),
        })
        .collect();
    RadiomicsTable {
        name: tag.table_name(),
        tag: tag.clone(),
        columns,
        rows,
    }
}

/// Builds and writes one table.
pub struct TableTask {
    store: ResultStore,
    group: TableGroup,
    format: ExportFormat,
}

impl TableTask {
    pub fn new(store: ResultStore, group: TableGroup, format: ExportFormat) -> Self {
        Self { store, group, format }
    }

    fn check_homogeneous(&self) -> Result<(), AggregateError> {
        for member in &self.group.members {
            if member.spaces != self.group.spaces {
                return Err(AggregateError::Heterogeneous {
                    table: self.group.tag.table_name(),
                    scan_id: member.scan_id.to_string(),
                    expected: self.group.spaces.clone(),
                    found: member.spaces.clone(),
                });
            }
        }
        Ok(())
    }

    /// Load every member record and write the table artifacts.
    pub fn build(&self) -> Result<Vec<PathBuf>, AggregateError> {
        self.check_homogeneous()?;
        let tag = &self.group.tag;
        let name = tag.table_name();
        let mut scans = BTreeMap::new();
        for member in &self.group.members {
            let path = self.store.record_path(&tag.roi_type, &member.scan_id, &tag.roi_type_label);
            let mut record = self.store.load_record(&path)?;
            let groups = record
                .spaces
                .remove(&tag.space)
                .ok_or_else(|| AggregateError::MissingSpace {
                    table: name.clone(),
                    scan_id: member.scan_id.to_string(),
                    space: tag.space.clone(),
                })?;
            scans.insert(member.scan_id.to_string(), groups);
        }

        let dir = self.store.features_dir(&tag.roi_type);
        let structured = StructuredTable {
            name: &name,
            tag,
            scans: &scans,
        };
        let json_path = dir.join(format!("{name}.json"));
        export::write_structured(&json_path, &structured)?;
        let table = build_table(tag, &scans);
        let flat_path = export::write_flat(&dir, &table, self.format)?;
        Ok(vec![json_path, flat_path])
    }
}

impl PoolJob for TableTask {
    fn describe(&self) -> String {
        format!(
            "{} ({} scans)",
            self.group.tag.table_name(),
            self.group.members.len()
        )
    }

    fn run(&self, log: &SlotLog) -> Result<JobStatus> {
        let written = self.build()?;
        for path in written {
            log.info(&format!("wrote {}", path.display()));
        }
        Ok(JobStatus::Completed)
    }
}
