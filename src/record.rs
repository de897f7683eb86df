//! # Record Module
//!
//! Per-scan results as persisted by the pipeline and read back by the
//! aggregation phase.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::features::FeatureValues;
use crate::scan::ScanId;

/// Result of one feature group for one feature space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GroupOutcome {
    /// Non-finite values are stored as `None` (JSON `null`).
    Computed { features: BTreeMap<String, Option<f64>> },
    Disabled,
    Failed { reason: String },
}

impl GroupOutcome {
    pub fn computed(values: FeatureValues) -> Self {
        let features = values
            .into_iter()
            .map(|(name, value)| (name, value.is_finite().then_some(value)))
            .collect();
        GroupOutcome::Computed { features }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        GroupOutcome::Failed {
            reason: reason.into(),
        }
    }

    pub fn features(&self) -> Option<&BTreeMap<String, Option<f64>>> {
        match self {
            GroupOutcome::Computed { features } => Some(features),
            _ => None,
        }
    }

    pub fn is_computed(&self) -> bool {
        matches!(self, GroupOutcome::Computed { .. })
    }
}

/// Group key to outcome, within one feature space.
pub type SpaceFeatures = BTreeMap<String, GroupOutcome>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub scan_id: ScanId,
    pub roi_name: String,
    pub roi_type: String,
    pub roi_type_label: String,
    pub config_hash: String,
    /// Feature-space key (`original` or a filter name) to its groups.
    pub spaces: BTreeMap<String, SpaceFeatures>,
}

impl FeatureRecord {
    pub fn new(scan_id: ScanId, roi_name: &str, roi_type: &str, roi_type_label: &str, config_hash: &str) -> Self {
        Self {
            scan_id,
            roi_name: roi_name.to_string(),
            roi_type: roi_type.to_string(),
            roi_type_label: roi_type_label.to_string(),
            config_hash: config_hash.to_string(),
            spaces: BTreeMap::new(),
        }
    }

    pub fn space_mut(&mut self, space: &str) -> &mut SpaceFeatures {
        self.spaces.entry(space.to_string()).or_default()
    }

    pub fn group(&self, space: &str, key: &str) -> Option<&GroupOutcome> {
        self.spaces.get(space)?.get(key)
    }

    pub fn manifest(&self) -> ScanManifest {
        ScanManifest {
            scan_id: self.scan_id.clone(),
            roi_type: self.roi_type.clone(),
            roi_type_label: self.roi_type_label.clone(),
            spaces: self.spaces.keys().cloned().collect(),
        }
    }
}

/// Sidecar written next to each record listing what the record contains, so
/// aggregation can group scans without reading record bodies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanManifest {
    pub scan_id: ScanId,
    pub roi_type: String,
    pub roi_type_label: String,
    pub spaces: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_finite_values_become_null() {
        let mut values = FeatureValues::new();
        values.insert("ok".into(), 1.5);
        values.insert("nan".into(), f64::NAN);
        values.insert("inf".into(), f64::INFINITY);
        let outcome = GroupOutcome::computed(values);
        let json = serde_json::to_value(&outcome).expect("json");
        assert_eq!(json["status"], "computed");
        assert_eq!(json["features"]["ok"], 1.5);
        assert!(json["features"]["nan"].is_null());
        assert!(json["features"]["inf"].is_null());
    }

    #[test]
    fn disabled_and_failed_are_distinguishable() {
        let disabled = serde_json::to_string(&GroupOutcome::Disabled).expect("json");
        let failed = serde_json::to_string(&GroupOutcome::failed("boom")).expect("json");
        assert_eq!(disabled, r#"{"status":"disabled"}"#);
        assert_eq!(failed, r#"{"status":"failed","reason":"boom"}"#);
    }

    #[test]
    fn manifest_lists_feature_spaces() {
        let mut record = FeatureRecord::new(ScanId::new("P1", "CT", "CTscan"), "GTV", "tumour", "GTV", "abc");
        record.space_mut("original").insert("morph".into(), GroupOutcome::Disabled);
        record.space_mut("mean3");
        let manifest = record.manifest();
        assert_eq!(manifest.spaces, vec!["mean3", "original"]);
        assert_eq!(manifest.roi_type, "tumour");
    }
}
