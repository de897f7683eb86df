//! # Store Module
//!
//! On-disk layout of per-scan records and their manifests:
//!
//! ```text
//! <save>/features(<roi_type>)/<patient>__<scan>(<label>).<modality>.json
//! <save>/features(<roi_type>)/manifests/<same name>
//! ```
//!
//! Records are written through a temporary file and renamed into place, so
//! an existing record is always complete.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};

use crate::constants::{MANIFEST_DIR, RECORD_EXTENSION};
use crate::record::{FeatureRecord, ScanManifest};
use crate::scan::ScanId;

static RECORD_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<patient>.+?)__(?P<scan>[^()]+)\((?P<label>[^()]+)\)\.(?P<modality>[^.]+)\.json$")
        .expect("record name pattern")
});

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("serde error at {path}: {source}")]
    Serde {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Split a record file name into scan identity and ROI type label.
pub fn parse_record_name(file_name: &str) -> Option<(ScanId, String)> {
    let caps = RECORD_NAME.captures(file_name)?;
    let scan_id = ScanId::new(&caps["patient"], &caps["scan"], &caps["modality"]);
    Some((scan_id, caps["label"].to_string()))
}

#[derive(Debug, Clone)]
pub struct ResultStore {
    root: PathBuf,
}

impl ResultStore {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn features_dir(&self, roi_type: &str) -> PathBuf {
        self.root.join(format!("features({roi_type})"))
    }

    pub fn record_path(&self, roi_type: &str, scan_id: &ScanId, roi_type_label: &str) -> PathBuf {
        self.features_dir(roi_type)
            .join(format!("{}.{RECORD_EXTENSION}", scan_id.record_stem(roi_type_label)))
    }

    pub fn manifest_path(&self, roi_type: &str, scan_id: &ScanId, roi_type_label: &str) -> PathBuf {
        self.features_dir(roi_type)
            .join(MANIFEST_DIR)
            .join(format!("{}.{RECORD_EXTENSION}", scan_id.record_stem(roi_type_label)))
    }

    /// Resume signal: a record for this scan and label is already on disk.
    pub fn exists(&self, roi_type: &str, scan_id: &ScanId, roi_type_label: &str) -> bool {
        self.record_path(roi_type, scan_id, roi_type_label).is_file()
    }

    /// Persist the manifest, then the record. Returns the record path.
    pub fn save(&self, record: &FeatureRecord) -> Result<PathBuf, StoreError> {
        let manifest_path = self.manifest_path(&record.roi_type, &record.scan_id, &record.roi_type_label);
        write_json_atomic(&manifest_path, &record.manifest())?;
        let path = self.record_path(&record.roi_type, &record.scan_id, &record.roi_type_label);
        write_json_atomic(&path, record)?;
        debug!("saved record {}", path.display());
        Ok(path)
    }

    pub fn load_record(&self, path: &Path) -> Result<FeatureRecord, StoreError> {
        read_json(path)
    }

    /// Manifests of every saved scan for one ROI type and label, sorted by scan id.
    pub fn manifests(&self, roi_type: &str, roi_type_label: &str) -> Result<Vec<ScanManifest>, StoreError> {
        let dir = self.features_dir(roi_type).join(MANIFEST_DIR);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        for entry in std::fs::read_dir(&dir).map_err(io_err(&dir))? {
            let entry = entry.map_err(io_err(&dir))?;
            let name = entry.file_name();
            let Some((_, label)) = name.to_str().and_then(parse_record_name) else {
                warn!("ignoring unrecognised manifest name {}", entry.path().display());
                continue;
            };
            if label != roi_type_label {
                continue;
            }
            let manifest: ScanManifest = match read_json(&entry.path()) {
                Ok(manifest) => manifest,
                Err(err) => {
                    warn!("skipping unreadable manifest: {err}");
                    continue;
                }
            };
            // A manifest without its record belongs to an interrupted save.
            if self.exists(roi_type, &manifest.scan_id, roi_type_label) {
                out.push(manifest);
            }
        }
        out.sort_by(|a, b| a.scan_id.cmp(&b.scan_id));
        Ok(out)
    }
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let file = File::open(path).map_err(io_err(path))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| StoreError::Serde {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err(parent))?;
    }
    let tmp = path.with_extension("json.tmp");
    {
        let file = File::create(&tmp).map_err(io_err(&tmp))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, value).map_err(|source| StoreError::Serde {
            path: tmp.clone(),
            source,
        })?;
        writer.flush().map_err(io_err(&tmp))?;
    }
    std::fs::rename(&tmp, path).map_err(io_err(path))
}
