//! Shared test infrastructure: synthetic scans, catalogs and configs.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use ndarray::Array3;

use radiobatch::config::{self, ComputationConfig, LoadedConfig};
use radiobatch::pipeline::{ScanJob, ScanPipeline};
use radiobatch::scan::{FileScanSource, MedicalScan, ScanId};
use radiobatch::store::ResultStore;

pub const GRID: usize = 12;

/// 12^3 grid with a textured intensity pattern and a centred 4^3 `GTV` cube.
pub fn synthetic_scan(seed: usize) -> MedicalScan {
    let data = Array3::from_shape_fn((GRID, GRID, GRID), |(i, j, k)| {
        (10 + (i * 7 + j * 3 + k * 5 + seed) % 40) as f32
    });
    let roi = Array3::from_shape_fn((GRID, GRID, GRID), |(i, j, k)| {
        u8::from((4..8).contains(&i) && (4..8).contains(&j) && (4..8).contains(&k))
    });
    MedicalScan::new([1.0, 1.0, 1.0], data).with_roi("GTV", roi)
}

pub fn scan_id(patient: &str) -> ScanId {
    ScanId::new(patient, "CT", "CTscan")
}

pub fn write_scan(read_dir: &Path, scan_id: &ScanId, scan: &MedicalScan) {
    let path = FileScanSource::new(read_dir).path_for(scan_id);
    scan.save(&path).expect("save scan");
}

pub fn write_catalog(dir: &Path, label: &str, rows: &[(&ScanId, &str)]) {
    let mut text = String::from("PatientID,ImagingScanName,ImagingModality,ROIname\n");
    for (id, roi) in rows {
        text.push_str(&format!(
            "{},{},{},{}\n",
            id.patient_id, id.scan_name, id.modality, roi
        ));
    }
    std::fs::write(dir.join(format!("roiNames_{label}.csv")), text).expect("write catalog");
}

/// Small CT configuration. `extract` is a YAML flow map of group toggles and
/// `extra` is spliced into the CTscan block.
pub fn config_yaml(extract: &str, extra: &str) -> String {
    format!(
        r#"
roi_types: [tumour]
roi_type_labels: [GTV]
n_batch: 2
extract: {extract}
filters:
  tex:
    family: textural
  mean3:
    family: mean
    size: 3
    name_save: mean3
modalities:
  CTscan:
    box_margin: 2
    scale_non_text: [1, 1, 1]
    scale_text: [[1, 1, 1]]
    vol_interp: linear
    roi_interp: nearest
    roi_pv: 0.5
    outliers: none
    discretisation:
      algos: [FBN]
      gray_levels: [[8]]
      ih: {{type: FBN, val: 8}}
{extra}
"#
    )
}

pub fn load(extract: &str, extra: &str) -> LoadedConfig {
    config::parse_config(config_yaml(extract, extra).as_bytes()).expect("config")
}

/// Same as [`load`] with the texture scales replaced by `scale_text`.
pub fn load_with_text_scales(extract: &str, scale_text: &str) -> LoadedConfig {
    let yaml = config_yaml(extract, "").replace(
        "scale_text: [[1, 1, 1]]",
        &format!("scale_text: {scale_text}"),
    );
    config::parse_config(yaml.as_bytes()).expect("config")
}

pub fn pipeline(loaded: &LoadedConfig, read_dir: &Path, save_dir: &Path) -> ScanPipeline {
    ScanPipeline::new(
        &loaded.config_hash,
        Arc::new(FileScanSource::new(read_dir)),
        ResultStore::new(save_dir),
    )
}

pub fn job(config: &Arc<ComputationConfig>, scan_id: &ScanId, roi: &str) -> ScanJob {
    ScanJob {
        scan_id: scan_id.clone(),
        roi_name: roi.to_string(),
        roi_type: "tumour".to_string(),
        roi_type_label: "GTV".to_string(),
        config: Arc::clone(config),
    }
}
