//! # Processing Module
//!
//! Volume preparation ahead of feature computation: ROI extraction,
//! resampling, re-segmentation, linear filtering and discretization.

pub mod discretize;
pub mod filter;
pub mod interp;
pub mod resegment;
pub mod roi;

use ndarray::{Array3, Zip};

/// A voxel grid with its spacing in mm (one entry per array axis).
#[derive(Debug, Clone, PartialEq)]
pub struct Volume<T = f64> {
    pub data: Array3<T>,
    pub spacing: [f64; 3],
}

/// Boolean voxel mask on the same grid as a [`Volume`].
pub type Mask = Volume<bool>;

impl<T> Volume<T> {
    pub fn new(data: Array3<T>, spacing: [f64; 3]) -> Self {
        Self { data, spacing }
    }

    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    pub fn voxel_volume(&self) -> f64 {
        self.spacing.iter().product()
    }
}

impl Mask {
    pub fn count(&self) -> usize {
        self.data.iter().filter(|v| **v).count()
    }

    pub fn and(&self, other: &Mask) -> Mask {
        let mut data = self.data.clone();
        Zip::from(&mut data)
            .and(&other.data)
            .for_each(|a, &b| *a = *a && b);
        Mask::new(data, self.spacing)
    }
}

/// Intensities inside `mask`, NaN elsewhere.
pub fn roi_extract(volume: &Volume, mask: &Mask) -> Array3<f64> {
    let mut out = volume.data.clone();
    Zip::from(&mut out)
        .and(&mask.data)
        .for_each(|v, &inside| {
            if !inside {
                *v = f64::NAN;
            }
        });
    out
}

/// Finite values of an extracted intensity grid, in storage order.
pub fn finite_values(values: &Array3<f64>) -> Vec<f64> {
    values.iter().copied().filter(|v| v.is_finite()).collect()
}

/// Finite minimum and maximum, or `None` when no finite value exists.
pub fn finite_range(values: &Array3<f64>) -> Option<(f64, f64)> {
    values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}
