//! Resampling of intensity volumes and ROI masks to a target voxel spacing.

use ndarray::Array3;
use serde::{Deserialize, Serialize};

use crate::processing::{Mask, Volume};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    Nearest,
    #[default]
    Linear,
}

/// Non-positive requested components keep the native spacing of that axis.
fn target_spacing(current: [f64; 3], requested: [f64; 3]) -> [f64; 3] {
    let mut out = current;
    for axis in 0..3 {
        if requested[axis] > 0.0 {
            out[axis] = requested[axis];
        }
    }
    out
}

/// Source-grid coordinate of every target voxel centre along one axis.
fn axis_coords(src_len: usize, current: f64, target: f64) -> Vec<f64> {
    let dst_len = ((src_len as f64 * current / target).round() as usize).max(1);
    let max = src_len.saturating_sub(1) as f64;
    (0..dst_len)
        .map(|i| ((i as f64 + 0.5) * target / current - 0.5).clamp(0.0, max))
        .collect()
}

fn interpolate(data: &Array3<f64>, spacing: [f64; 3], target: [f64; 3], method: Interpolation) -> Array3<f64> {
    let (d0, d1, d2) = data.dim();
    let c0 = axis_coords(d0, spacing[0], target[0]);
    let c1 = axis_coords(d1, spacing[1], target[1]);
    let c2 = axis_coords(d2, spacing[2], target[2]);

    Array3::from_shape_fn((c0.len(), c1.len(), c2.len()), |(i, j, k)| {
        let at = [c0[i], c1[j], c2[k]];
        match method {
            Interpolation::Nearest => {
                data[[at[0].round() as usize, at[1].round() as usize, at[2].round() as usize]]
            }
            Interpolation::Linear => trilinear(data, at),
        }
    })
}

fn trilinear(data: &Array3<f64>, at: [f64; 3]) -> f64 {
    let dims = [data.dim().0, data.dim().1, data.dim().2];
    let mut lo = [0usize; 3];
    let mut hi = [0usize; 3];
    let mut t = [0f64; 3];
    for axis in 0..3 {
        lo[axis] = at[axis].floor() as usize;
        hi[axis] = (lo[axis] + 1).min(dims[axis] - 1);
        t[axis] = at[axis] - lo[axis] as f64;
    }

    let mut acc = 0.0;
    for corner in 0..8usize {
        let mut weight = 1.0;
        let mut idx = [0usize; 3];
        for axis in 0..3 {
            if corner & (1 << axis) != 0 {
                idx[axis] = hi[axis];
                weight *= t[axis];
            } else {
                idx[axis] = lo[axis];
                weight *= 1.0 - t[axis];
            }
        }
        if weight != 0.0 {
            acc += weight * data[idx];
        }
    }
    acc
}

/// Resample an intensity volume, optionally rounding to a multiple of `round`.
pub fn resample(volume: &Volume, scale: [f64; 3], method: Interpolation, round: Option<f64>) -> Volume {
    let target = target_spacing(volume.spacing, scale);
    let mut data = if target == volume.spacing {
        volume.data.clone()
    } else {
        interpolate(&volume.data, volume.spacing, target, method)
    };
    if let Some(step) = round.filter(|step| *step > 0.0) {
        data.mapv_inplace(|v| (v / step).round() * step);
    }
    Volume::new(data, target)
}

/// Resample a mask; interpolated occupancy at or above `partial_volume` is kept.
pub fn resample_mask(mask: &Mask, scale: [f64; 3], method: Interpolation, partial_volume: f64) -> Mask {
    let target = target_spacing(mask.spacing, scale);
    if target == mask.spacing {
        return mask.clone();
    }
    let occupancy = mask.data.mapv(|v| if v { 1.0 } else { 0.0 });
    let resampled = interpolate(&occupancy, mask.spacing, target, method);
    Mask::new(resampled.mapv(|v| v >= partial_volume - 1e-9), target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_spacing_is_a_copy() {
        let vol = Volume::new(Array3::from_shape_fn((3, 3, 3), |(i, j, k)| (i + j + k) as f64), [1.0; 3]);
        let out = resample(&vol, [1.0, 1.0, 1.0], Interpolation::Linear, None);
        assert_eq!(out, vol);
    }

    #[test]
    fn downsampling_halves_the_grid() {
        let vol = Volume::new(Array3::from_elem((8, 8, 4), 3.0), [1.0; 3]);
        let out = resample(&vol, [2.0, 2.0, 0.0], Interpolation::Linear, None);
        assert_eq!(out.dim(), (4, 4, 4));
        assert_eq!(out.spacing, [2.0, 2.0, 1.0]);
        assert!(out.data.iter().all(|v| (*v - 3.0).abs() < 1e-12));
    }

    #[test]
    fn linear_upsampling_interpolates_between_voxels() {
        let vol = Volume::new(Array3::from_shape_fn((2, 1, 1), |(i, _, _)| i as f64 * 10.0), [2.0, 1.0, 1.0]);
        let out = resample(&vol, [1.0, 1.0, 1.0], Interpolation::Linear, None);
        let values: Vec<f64> = out.data.iter().copied().collect();
        assert_eq!(values, vec![0.0, 2.5, 7.5, 10.0]);
    }

    #[test]
    fn rounding_snaps_to_step() {
        let vol = Volume::new(Array3::from_shape_fn((2, 1, 1), |(i, _, _)| i as f64 * 10.0), [2.0, 1.0, 1.0]);
        let out = resample(&vol, [1.0, 1.0, 1.0], Interpolation::Linear, Some(5.0));
        let values: Vec<f64> = out.data.iter().copied().collect();
        assert_eq!(values, vec![0.0, 5.0, 10.0, 10.0]);
    }

    #[test]
    fn mask_threshold_uses_partial_volume() {
        let mut data = Array3::from_elem((2, 1, 1), false);
        data[[1, 0, 0]] = true;
        let mask = Mask::new(data, [2.0, 1.0, 1.0]);
        let out = resample_mask(&mask, [1.0, 1.0, 1.0], Interpolation::Linear, 0.5);
        let values: Vec<bool> = out.data.iter().copied().collect();
        assert_eq!(values, vec![false, false, true, true]);
    }
}
