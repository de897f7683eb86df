use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::constants::{MAX_GREY_LEVELS, ORIGINAL_SPACE};
use crate::features::FeatureGroup;
use crate::processing::discretize::{BinSpec, DiscretizationAlgo};
use crate::processing::filter::FilterSpec;
use crate::processing::interp::Interpolation;
use crate::processing::resegment::{IntensityRange, OutlierRule};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntensityType {
    #[default]
    Definite,
    Arbitrary,
    Filtered,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscretisationParams {
    pub algos: Vec<DiscretizationAlgo>,
    /// Grey-level counts (FBN) or bin widths (FBS), one list per algorithm.
    pub gray_levels: Vec<Vec<f64>>,
    pub ih: BinSpec,
    #[serde(default)]
    pub ivh: Option<BinSpec>,
    #[serde(default)]
    pub user_set_min_value: Option<f64>,
}

/// Processing parameters for one imaging modality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagingParams {
    /// Voxel margin around the ROI bounding box; `None` keeps the whole grid.
    #[serde(default)]
    pub box_margin: Option<usize>,
    pub scale_non_text: [f64; 3],
    #[serde(default)]
    pub scale_text: Vec<[f64; 3]>,
    #[serde(default)]
    pub vol_interp: Interpolation,
    #[serde(default)]
    pub roi_interp: Interpolation,
    #[serde(default)]
    pub gl_round: Option<f64>,
    #[serde(default = "default_roi_pv")]
    pub roi_pv: f64,
    #[serde(default)]
    pub im_range: IntensityRange,
    #[serde(default)]
    pub outliers: OutlierRule,
    #[serde(default)]
    pub intensity_type: IntensityType,
    pub discretisation: DiscretisationParams,
    #[serde(default)]
    pub filter_type: Option<String>,
}

fn default_roi_pv() -> f64 {
    0.5
}

/// Immutable computation settings shared read-only by every job of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationConfig {
    pub roi_types: Vec<String>,
    pub roi_type_labels: Vec<String>,
    #[serde(default)]
    pub n_batch: Option<usize>,
    #[serde(default)]
    pub skip_existing: bool,
    #[serde(default)]
    pub extract: BTreeMap<FeatureGroup, bool>,
    #[serde(default)]
    pub filters: BTreeMap<String, FilterSpec>,
    pub modalities: BTreeMap<String, ImagingParams>,
}

impl ComputationConfig {
    /// Groups absent from the toggle map are treated as disabled.
    pub fn is_enabled(&self, group: FeatureGroup) -> bool {
        self.extract.get(&group).copied().unwrap_or(false)
    }

    pub fn imaging(&self, modality: &str) -> Option<&ImagingParams> {
        self.modalities.get(modality)
    }

    pub fn filter_for<'a>(&'a self, params: &'a ImagingParams) -> Option<(&'a str, &'a FilterSpec)> {
        let id = params.filter_type.as_deref()?;
        self.filters.get(id).map(|spec| (id, spec))
    }

    /// Feature-space key the pipeline records features under.
    pub fn feature_space(&self, params: &ImagingParams) -> String {
        match self.filter_for(params) {
            Some((id, spec)) => spec.name_save.clone().unwrap_or_else(|| id.to_string()),
            None => ORIGINAL_SPACE.to_string(),
        }
    }

    /// `(roi_type, roi_type_label)` pairs in configured order.
    pub fn roi_type_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.roi_types
            .iter()
            .map(String::as_str)
            .zip(self.roi_type_labels.iter().map(String::as_str))
    }

    pub fn pool_width(&self) -> usize {
        self.n_batch
            .filter(|width| *width > 0)
            .unwrap_or_else(num_cpus::get)
    }

    pub fn validate(&self) -> Result<()> {
        if self.roi_types.is_empty() {
            bail!("roi_types must not be empty");
        }
        if self.roi_types.len() != self.roi_type_labels.len() {
            bail!(
                "roi_types ({}) and roi_type_labels ({}) must have the same length",
                self.roi_types.len(),
                self.roi_type_labels.len()
            );
        }
        for (modality, params) in &self.modalities {
            let disc = &params.discretisation;
            if disc.algos.len() != disc.gray_levels.len() {
                bail!(
                    "{modality}: {} discretisation algorithms but {} grey-level lists",
                    disc.algos.len(),
                    disc.gray_levels.len()
                );
            }
            if disc.gray_levels.iter().any(|levels| levels.is_empty()) {
                bail!("{modality}: every discretisation algorithm needs at least one grey level");
            }
            for (algo, levels) in disc.algos.iter().zip(&disc.gray_levels) {
                if *algo == DiscretizationAlgo::FBN
                    && let Some(n) = levels.iter().find(|n| **n > MAX_GREY_LEVELS as f64)
                {
                    bail!("{modality}: FBN grey-level count {n} exceeds {MAX_GREY_LEVELS}");
                }
            }
            if !(params.roi_pv > 0.0 && params.roi_pv <= 1.0) {
                bail!("{modality}: roi_pv must be in (0, 1], got {}", params.roi_pv);
            }
            if let Some(id) = &params.filter_type {
                if !self.filters.contains_key(id) {
                    bail!("{modality}: filter_type `{id}` is not declared under filters");
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: ComputationConfig,
    pub config_hash: String,
}

pub fn load_config(path: Option<&Path>) -> Result<LoadedConfig> {
    let bytes: Vec<u8> = if let Some(p) = path {
        std::fs::read(p).with_context(|| format!("reading config {}", p.display()))?
    } else {
        include_bytes!("../config/default.yml").to_vec()
    };
    parse_config(&bytes)
}

/// Parse a YAML (or JSON) configuration document.
pub fn parse_config(bytes: &[u8]) -> Result<LoadedConfig> {
    let config: ComputationConfig =
        serde_yaml::from_slice(bytes).context("parsing computation config")?;
    config.validate()?;
    let config_hash = hash_bytes(bytes);
    Ok(LoadedConfig {
        config,
        config_hash,
    })
}

fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    hex::encode(digest)
}
