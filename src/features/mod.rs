//! # Features Module
//!
//! Feature groups computed per scan. The pipeline talks to a
//! [`FeatureBackend`]; [`StandardBackend`] implements every group.

pub mod intensity;
pub mod morph;
pub mod texture;

use std::collections::BTreeMap;
use std::fmt;

use ndarray::Array3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::processing::discretize::Discretized;
use crate::processing::{Mask, Volume, finite_values};

/// Feature name to value for one computed group.
pub type FeatureValues = BTreeMap<String, f64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FeatureGroup {
    Morph,
    LocalIntensity,
    Stats,
    IntensityHistogram,
    IntensityVolumeHistogram,
    #[serde(rename = "GLCM")]
    Glcm,
    #[serde(rename = "GLRLM")]
    Glrlm,
    #[serde(rename = "GLSZM")]
    Glszm,
    #[serde(rename = "GLDZM")]
    Gldzm,
    #[serde(rename = "NGTDM")]
    Ngtdm,
    #[serde(rename = "NGLDM")]
    Ngldm,
}

impl FeatureGroup {
    pub const NON_TEXTURE: [FeatureGroup; 5] = [
        FeatureGroup::Morph,
        FeatureGroup::LocalIntensity,
        FeatureGroup::Stats,
        FeatureGroup::IntensityHistogram,
        FeatureGroup::IntensityVolumeHistogram,
    ];

    pub const TEXTURE: [FeatureGroup; 6] = [
        FeatureGroup::Glcm,
        FeatureGroup::Glrlm,
        FeatureGroup::Glszm,
        FeatureGroup::Gldzm,
        FeatureGroup::Ngtdm,
        FeatureGroup::Ngldm,
    ];

    /// Key used in persisted records and table columns.
    pub fn key(self) -> &'static str {
        match self {
            FeatureGroup::Morph => "morph",
            FeatureGroup::LocalIntensity => "local_intensity",
            FeatureGroup::Stats => "stats",
            FeatureGroup::IntensityHistogram => "intensity_histogram",
            FeatureGroup::IntensityVolumeHistogram => "intensity_volume_histogram",
            FeatureGroup::Glcm => "glcm",
            FeatureGroup::Glrlm => "glrlm",
            FeatureGroup::Glszm => "glszm",
            FeatureGroup::Gldzm => "gldzm",
            FeatureGroup::Ngtdm => "ngtdm",
            FeatureGroup::Ngldm => "ngldm",
        }
    }

    pub fn is_texture(self) -> bool {
        Self::TEXTURE.contains(&self)
    }
}

impl fmt::Display for FeatureGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("roi contains no voxels")]
    EmptyRoi,
    #[error("missing input: {0}")]
    MissingInput(&'static str),
    #[error("degenerate input: {0}")]
    Degenerate(String),
}

/// Everything a feature group may read for one computation.
#[derive(Debug, Clone, Copy)]
pub struct GroupInput<'a> {
    /// Resampled (and filtered, when configured) intensity volume.
    pub volume: &'a Volume,
    pub mask_int: &'a Mask,
    pub mask_morph: &'a Mask,
    /// Intensities inside the intensity mask, NaN elsewhere.
    pub intensities: &'a Array3<f64>,
    /// Discretized intensities, when the group needs them.
    pub quantized: Option<&'a Discretized>,
}

impl<'a> GroupInput<'a> {
    fn quantized(&self) -> Result<&'a Discretized, FeatureError> {
        self.quantized
            .ok_or(FeatureError::MissingInput("discretized intensities"))
    }
}

pub trait FeatureBackend: Send + Sync {
    fn compute(&self, group: FeatureGroup, input: &GroupInput<'_>) -> Result<FeatureValues, FeatureError>;
}

/// Built-in implementation of every feature group.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardBackend;

impl FeatureBackend for StandardBackend {
    fn compute(&self, group: FeatureGroup, input: &GroupInput<'_>) -> Result<FeatureValues, FeatureError> {
        match group {
            FeatureGroup::Morph => morph::extract_all(input.volume, input.mask_int, input.mask_morph),
            FeatureGroup::LocalIntensity => intensity::local_intensity(input.volume, input.mask_int),
            FeatureGroup::Stats => intensity::statistics(&finite_values(input.intensities)),
            FeatureGroup::IntensityHistogram => {
                intensity::intensity_histogram(&finite_values(&input.quantized()?.data))
            }
            FeatureGroup::IntensityVolumeHistogram => {
                let q = input.quantized()?;
                intensity::intensity_volume_histogram(&finite_values(&q.data), q.bin_width)
            }
            texture_group => texture::extract(texture_group, input.quantized()?, input.mask_morph),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_names_match_config_keys() {
        let parsed: BTreeMap<FeatureGroup, bool> =
            serde_yaml::from_str("{Morph: true, GLCM: false, IntensityVolumeHistogram: true}")
                .expect("toggles");
        assert_eq!(parsed.get(&FeatureGroup::Morph), Some(&true));
        assert_eq!(parsed.get(&FeatureGroup::Glcm), Some(&false));
        assert!(parsed.contains_key(&FeatureGroup::IntensityVolumeHistogram));
    }

    #[test]
    fn texture_partition_is_exhaustive() {
        assert_eq!(FeatureGroup::NON_TEXTURE.len() + FeatureGroup::TEXTURE.len(), 11);
        assert!(FeatureGroup::NON_TEXTURE.iter().all(|g| !g.is_texture()));
        assert!(FeatureGroup::TEXTURE.iter().all(|g| g.is_texture()));
    }
}
