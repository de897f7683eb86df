//! Linear spatial filters applied to resampled intensity volumes.

use ndarray::Array3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::processing::Volume;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterFamily {
    Mean,
    Gaussian,
    /// Texture-domain filtering; handled by a separate pipeline variant.
    Textural,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub family: FilterFamily,
    /// Mean filter edge length in voxels (odd).
    #[serde(default = "default_size")]
    pub size: usize,
    /// Gaussian standard deviation in mm.
    #[serde(default)]
    pub sigma_mm: f64,
    /// Gaussian kernel half-width, in standard deviations.
    #[serde(default = "default_truncate")]
    pub truncate: f64,
    /// Feature-space key and table suffix for filtered features.
    #[serde(default)]
    pub name_save: Option<String>,
}

fn default_size() -> usize {
    3
}

fn default_truncate() -> f64 {
    3.0
}

impl FilterSpec {
    pub fn is_textural(&self) -> bool {
        self.family == FilterFamily::Textural
    }
}

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("textural filters are not supported by the linear pipeline")]
    Textural,
    #[error("invalid filter parameter: {0}")]
    InvalidParameter(String),
}

/// Convolve `data` along `axis` with a centred kernel, replicating edges.
fn convolve_axis(data: &Array3<f64>, axis: usize, kernel: &[f64]) -> Array3<f64> {
    let radius = (kernel.len() / 2) as isize;
    let len = data.shape()[axis] as isize;
    Array3::from_shape_fn(data.dim(), |(i, j, k)| {
        let centre = [i, j, k];
        let mut acc = 0.0;
        for (offset, weight) in kernel.iter().enumerate() {
            let pos = (centre[axis] as isize + offset as isize - radius).clamp(0, len - 1);
            let mut idx = centre;
            idx[axis] = pos as usize;
            acc += weight * data[idx];
        }
        acc
    })
}

fn gaussian_kernel(sigma_vox: f64, truncate: f64) -> Vec<f64> {
    let radius = (truncate * sigma_vox).ceil().max(1.0) as isize;
    let weights: Vec<f64> = (-radius..=radius)
        .map(|x| (-(x * x) as f64 / (2.0 * sigma_vox * sigma_vox)).exp())
        .collect();
    let total: f64 = weights.iter().sum();
    weights.into_iter().map(|w| w / total).collect()
}

pub fn apply_filter(volume: &Volume, spec: &FilterSpec) -> Result<Volume, FilterError> {
    let kernels: [Vec<f64>; 3] = match spec.family {
        FilterFamily::Textural => return Err(FilterError::Textural),
        FilterFamily::Mean => {
            if spec.size == 0 || spec.size % 2 == 0 {
                return Err(FilterError::InvalidParameter(format!(
                    "mean filter size must be odd, got {}",
                    spec.size
                )));
            }
            let kernel = vec![1.0 / spec.size as f64; spec.size];
            [kernel.clone(), kernel.clone(), kernel]
        }
        FilterFamily::Gaussian => {
            if !(spec.sigma_mm > 0.0) {
                return Err(FilterError::InvalidParameter(format!(
                    "gaussian sigma must be positive, got {}",
                    spec.sigma_mm
                )));
            }
            let per_axis = |axis: usize| gaussian_kernel(spec.sigma_mm / volume.spacing[axis], spec.truncate);
            [per_axis(0), per_axis(1), per_axis(2)]
        }
    };

    let mut data = volume.data.clone();
    for (axis, kernel) in kernels.iter().enumerate() {
        data = convolve_axis(&data, axis, kernel);
    }
    Ok(Volume::new(data, volume.spacing))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(family: FilterFamily) -> FilterSpec {
        FilterSpec {
            family,
            size: 3,
            sigma_mm: 1.0,
            truncate: 3.0,
            name_save: None,
        }
    }

    #[test]
    fn mean_filter_preserves_constant_volume() {
        let vol = Volume::new(Array3::from_elem((4, 4, 4), 7.0), [1.0; 3]);
        let out = apply_filter(&vol, &spec(FilterFamily::Mean)).expect("mean");
        assert!(out.data.iter().all(|v| (*v - 7.0).abs() < 1e-9));
    }

    #[test]
    fn mean_filter_spreads_an_impulse() {
        let mut data = Array3::zeros((5, 5, 5));
        data[[2, 2, 2]] = 27.0;
        let out = apply_filter(&Volume::new(data, [1.0; 3]), &spec(FilterFamily::Mean)).expect("mean");
        assert!((out.data[[2, 2, 2]] - 1.0).abs() < 1e-9);
        assert!((out.data[[1, 1, 1]] - 1.0).abs() < 1e-9);
        assert_eq!(out.data[[0, 0, 0]], 0.0);
    }

    #[test]
    fn gaussian_kernel_is_normalized() {
        let kernel = gaussian_kernel(1.5, 3.0);
        assert_eq!(kernel.len(), 11);
        assert!((kernel.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn textural_family_is_rejected() {
        let vol = Volume::new(Array3::zeros((2, 2, 2)), [1.0; 3]);
        assert!(matches!(
            apply_filter(&vol, &spec(FilterFamily::Textural)),
            Err(FilterError::Textural)
        ));
    }

    #[test]
    fn even_mean_size_is_invalid() {
        let vol = Volume::new(Array3::zeros((2, 2, 2)), [1.0; 3]);
        let mut even = spec(FilterFamily::Mean);
        even.size = 4;
        assert!(matches!(
            apply_filter(&vol, &even),
            Err(FilterError::InvalidParameter(_))
        ));
    }
}
