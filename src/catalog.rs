//! ROI catalogs: `roiNames_<label>.csv`, one row per scan and ROI.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::constants::CATALOG_PREFIX;
use crate::scan::ScanId;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog not found: {0}")]
    NotFound(PathBuf),
    #[error("catalog {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

#[derive(Debug, Clone, Deserialize)]
struct CatalogRow {
    #[serde(rename = "PatientID")]
    patient_id: String,
    #[serde(rename = "ImagingScanName")]
    scan_name: String,
    #[serde(rename = "ImagingModality")]
    modality: String,
    #[serde(rename = "ROIname")]
    roi_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub scan_id: ScanId,
    pub roi_name: String,
}

pub fn catalog_path(dir: &Path, roi_type_label: &str) -> PathBuf {
    dir.join(format!("{CATALOG_PREFIX}{roi_type_label}.csv"))
}

/// Read the catalog for one ROI type label. Rows with a blank field are
/// skipped with a warning.
pub fn read_catalog(dir: &Path, roi_type_label: &str) -> Result<Vec<CatalogEntry>, CatalogError> {
    let path = catalog_path(dir, roi_type_label);
    if !path.is_file() {
        return Err(CatalogError::NotFound(path));
    }
    let csv_err = |source: csv::Error| CatalogError::Csv {
        path: path.clone(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(&path)
        .map_err(csv_err)?;

    let mut entries = Vec::new();
    for (line, row) in reader.deserialize::<CatalogRow>().enumerate() {
        let row = row.map_err(csv_err)?;
        if [&row.patient_id, &row.scan_name, &row.modality, &row.roi_name]
            .iter()
            .any(|field| field.is_empty())
        {
            warn!("{}: row {} has an empty field, skipped", path.display(), line + 2);
            continue;
        }
        entries.push(CatalogEntry {
            scan_id: ScanId::new(&row.patient_id, &row.scan_name, &row.modality),
            roi_name: row.roi_name,
        });
    }
    debug!("{}: {} entries", path.display(), entries.len());
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn reads_rows_into_scan_ids() {
        let dir = tempdir().expect("tempdir");
        std::fs::write(
            catalog_path(dir.path(), "GTV"),
            "PatientID,ImagingScanName,ImagingModality,ROIname\n\
             P-01,CT, CTscan ,GTV_1\n\
             P-02,CT,CTscan,\n\
             P-03,PET,PTscan,GTV_1+GTV_2\n",
        )
        .expect("write");
        let entries = read_catalog(dir.path(), "GTV").expect("read");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].scan_id.to_string(), "P-01__CT.CTscan");
        assert_eq!(entries[1].roi_name, "GTV_1+GTV_2");
    }

    #[test]
    fn missing_catalog_is_reported() {
        let dir = tempdir().expect("tempdir");
        assert!(matches!(
            read_catalog(dir.path(), "GTV"),
            Err(CatalogError::NotFound(_))
        ));
    }
}
