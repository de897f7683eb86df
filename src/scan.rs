//! # Scan Module
//!
//! Scan identities and the serialized scan artifacts the pipeline reads.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ndarray::Array3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::SCAN_EXTENSION;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScanIdError {
    #[error("scan id `{0}` is missing the `__` patient separator")]
    MissingPatient(String),
    #[error("scan id `{0}` is missing the `.` modality separator")]
    MissingModality(String),
    #[error("scan id `{0}` has an empty component")]
    EmptyComponent(String),
}

/// Identity of one scan: `<patientID>__<scanName>.<modality>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ScanId {
    pub patient_id: String,
    pub scan_name: String,
    pub modality: String,
}

impl ScanId {
    pub fn new(patient_id: &str, scan_name: &str, modality: &str) -> Self {
        Self {
            patient_id: patient_id.to_string(),
            scan_name: scan_name.to_string(),
            modality: modality.to_string(),
        }
    }

    /// File stem of the persisted record for this scan and ROI type label.
    pub fn record_stem(&self, roi_type_label: &str) -> String {
        format!(
            "{}__{}({}).{}",
            self.patient_id, self.scan_name, roi_type_label, self.modality
        )
    }
}

impl fmt::Display for ScanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}__{}.{}", self.patient_id, self.scan_name, self.modality)
    }
}

impl FromStr for ScanId {
    type Err = ScanIdError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (patient, rest) = raw
            .split_once("__")
            .ok_or_else(|| ScanIdError::MissingPatient(raw.to_string()))?;
        let (scan_name, modality) = rest
            .split_once('.')
            .ok_or_else(|| ScanIdError::MissingModality(raw.to_string()))?;
        // Tolerate a trailing artifact extension such as `.bin`.
        let modality = modality.split('.').next().unwrap_or_default();
        if patient.is_empty() || scan_name.is_empty() || modality.is_empty() {
            return Err(ScanIdError::EmptyComponent(raw.to_string()));
        }
        Ok(Self::new(patient, scan_name, modality))
    }
}

#[derive(Debug, Error)]
pub enum ScanLoadError {
    #[error("scan artifact not found: {0}")]
    NotFound(PathBuf),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt scan artifact: {0}")]
    Decode(#[from] bincode::Error),
    #[error("scan grid and ROI `{roi}` have different shapes")]
    ShapeMismatch { roi: String },
}

/// One imaging scan with its named ROI masks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicalScan {
    /// Voxel spacing in mm, one entry per array axis.
    pub spacing: [f64; 3],
    pub data: Array3<f32>,
    pub rois: BTreeMap<String, Array3<u8>>,
}

impl MedicalScan {
    pub fn new(spacing: [f64; 3], data: Array3<f32>) -> Self {
        Self {
            spacing,
            data,
            rois: BTreeMap::new(),
        }
    }

    pub fn with_roi(mut self, name: &str, mask: Array3<u8>) -> Self {
        self.rois.insert(name.to_string(), mask);
        self
    }

    pub fn open(path: &Path) -> Result<Self, ScanLoadError> {
        if !path.exists() {
            return Err(ScanLoadError::NotFound(path.to_path_buf()));
        }
        let reader = BufReader::new(File::open(path)?);
        let scan: MedicalScan = bincode::deserialize_from(reader)?;
        for (name, mask) in &scan.rois {
            if mask.dim() != scan.data.dim() {
                return Err(ScanLoadError::ShapeMismatch { roi: name.clone() });
            }
        }
        Ok(scan)
    }

    pub fn save(&self, path: &Path) -> Result<(), ScanLoadError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(writer, self)?;
        Ok(())
    }
}

/// Source of scan artifacts addressed by identity.
pub trait ScanSource: Send + Sync {
    fn load(&self, scan_id: &ScanId) -> Result<MedicalScan, ScanLoadError>;
}

/// Reads `<root>/<scanID>.bin` artifacts.
#[derive(Debug, Clone)]
pub struct FileScanSource {
    root: PathBuf,
}

impl FileScanSource {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    pub fn path_for(&self, scan_id: &ScanId) -> PathBuf {
        self.root.join(format!("{scan_id}.{SCAN_EXTENSION}"))
    }
}

impl ScanSource for FileScanSource {
    fn load(&self, scan_id: &ScanId) -> Result<MedicalScan, ScanLoadError> {
        MedicalScan::open(&self.path_for(scan_id))
    }
}
