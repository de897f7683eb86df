//! Intensity-based feature groups: local intensity, statistics, intensity
//! histogram and intensity-volume histogram.

use std::collections::BTreeMap;
use std::f64::consts::PI;

use crate::constants::PEAK_SPHERE_VOLUME_MM3;
use crate::features::{FeatureError, FeatureValues};
use crate::processing::{Mask, Volume};

const MAX_IVH_STEPS: f64 = 1e6;

/// Voxel offsets whose centres fall inside a sphere of the peak volume.
fn sphere_offsets(spacing: [f64; 3]) -> Vec<[isize; 3]> {
    let radius = (3.0 * PEAK_SPHERE_VOLUME_MM3 / (4.0 * PI)).cbrt();
    let reach: Vec<isize> = spacing.iter().map(|s| (radius / s).floor() as isize).collect();
    let mut out = Vec::new();
    for di in -reach[0]..=reach[0] {
        for dj in -reach[1]..=reach[1] {
            for dk in -reach[2]..=reach[2] {
                let d2 = (di as f64 * spacing[0]).powi(2)
                    + (dj as f64 * spacing[1]).powi(2)
                    + (dk as f64 * spacing[2]).powi(2);
                if d2 <= radius * radius {
                    out.push([di, dj, dk]);
                }
            }
        }
    }
    out
}

fn sphere_mean(volume: &Volume, centre: (usize, usize, usize), offsets: &[[isize; 3]]) -> f64 {
    let (d0, d1, d2) = volume.dim();
    let mut sum = 0.0;
    let mut n = 0usize;
    for o in offsets {
        let i = centre.0 as isize + o[0];
        let j = centre.1 as isize + o[1];
        let k = centre.2 as isize + o[2];
        if i < 0 || j < 0 || k < 0 || i >= d0 as isize || j >= d1 as isize || k >= d2 as isize {
            continue;
        }
        let v = volume.data[[i as usize, j as usize, k as usize]];
        if v.is_finite() {
            sum += v;
            n += 1;
        }
    }
    if n == 0 { f64::NAN } else { sum / n as f64 }
}

/// Local peak (sphere mean around the hottest ROI voxel) and global peak
/// (highest sphere mean centred anywhere in the ROI).
pub fn local_intensity(volume: &Volume, mask_int: &Mask) -> Result<FeatureValues, FeatureError> {
    let roi: Vec<((usize, usize, usize), f64)> = mask_int
        .data
        .indexed_iter()
        .filter(|(_, set)| **set)
        .map(|(idx, _)| (idx, volume.data[idx]))
        .filter(|(_, v)| v.is_finite())
        .collect();
    let hottest = roi
        .iter()
        .map(|(_, v)| *v)
        .fold(f64::NEG_INFINITY, f64::max);
    if roi.is_empty() {
        return Err(FeatureError::EmptyRoi);
    }

    let offsets = sphere_offsets(volume.spacing);
    let mut local = f64::NEG_INFINITY;
    let mut global = f64::NEG_INFINITY;
    for (idx, v) in &roi {
        let mean = sphere_mean(volume, *idx, &offsets);
        if *v == hottest {
            local = local.max(mean);
        }
        global = global.max(mean);
    }

    let mut out = FeatureValues::new();
    out.insert("peak_local".into(), local);
    out.insert("peak_global".into(), global);
    Ok(out)
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut v = values.to_vec();
    v.sort_by(f64::total_cmp);
    v
}

/// Linear-interpolated percentile of sorted data, `q` in `[0, 1]`.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Distribution descriptors shared by statistics and the intensity histogram.
fn distribution(values: &[f64]) -> Result<FeatureValues, FeatureError> {
    if values.is_empty() {
        return Err(FeatureError::EmptyRoi);
    }
    let n = values.len() as f64;
    let s = sorted(values);
    let mean = values.iter().sum::<f64>() / n;
    let central = |p: i32| values.iter().map(|v| (v - mean).powi(p)).sum::<f64>() / n;
    let var = central(2);
    let median = percentile(&s, 0.5);
    let p10 = percentile(&s, 0.1);
    let p90 = percentile(&s, 0.9);
    let q1 = percentile(&s, 0.25);
    let q3 = percentile(&s, 0.75);
    let min = s[0];
    let max = s[s.len() - 1];

    let robust: Vec<f64> = values.iter().copied().filter(|v| *v >= p10 && *v <= p90).collect();
    let robust_mean = robust.iter().sum::<f64>() / robust.len() as f64;

    let mut out = FeatureValues::new();
    out.insert("mean".into(), mean);
    out.insert("var".into(), var);
    out.insert("skewness".into(), central(3) / var.powf(1.5));
    out.insert("kurtosis".into(), central(4) / (var * var) - 3.0);
    out.insert("median".into(), median);
    out.insert("min".into(), min);
    out.insert("p10".into(), p10);
    out.insert("p90".into(), p90);
    out.insert("max".into(), max);
    out.insert("iqr".into(), q3 - q1);
    out.insert("range".into(), max - min);
    out.insert("mad".into(), values.iter().map(|v| (v - mean).abs()).sum::<f64>() / n);
    out.insert(
        "rmad".into(),
        robust.iter().map(|v| (v - robust_mean).abs()).sum::<f64>() / robust.len() as f64,
    );
    out.insert("medad".into(), values.iter().map(|v| (v - median).abs()).sum::<f64>() / n);
    out.insert("cov".into(), var.sqrt() / mean);
    out.insert("qcod".into(), (q3 - q1) / (q3 + q1));
    Ok(out)
}

pub fn statistics(values: &[f64]) -> Result<FeatureValues, FeatureError> {
    let mut out = distribution(values)?;
    let energy: f64 = values.iter().map(|v| v * v).sum();
    out.insert("energy".into(), energy);
    out.insert("rms".into(), (energy / values.len() as f64).sqrt());
    Ok(out)
}

/// Histogram features over discretized grey levels.
pub fn intensity_histogram(levels: &[f64]) -> Result<FeatureValues, FeatureError> {
    let mut out = distribution(levels)?;
    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    for v in levels {
        *counts.entry(v.round() as i64).or_default() += 1;
    }
    let n = levels.len() as f64;
    let mode = counts
        .iter()
        .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
        .map(|(level, _)| *level as f64)
        .unwrap_or(f64::NAN);
    let entropy = -counts
        .values()
        .map(|c| {
            let p = *c as f64 / n;
            p * p.log2()
        })
        .sum::<f64>();
    let uniformity = counts.values().map(|c| (*c as f64 / n).powi(2)).sum::<f64>();
    out.insert("mode".into(), mode);
    out.insert("entropy".into(), entropy);
    out.insert("uniformity".into(), uniformity);
    Ok(out)
}

/// Intensity-volume histogram over discretized values spaced `bin_width` apart.
pub fn intensity_volume_histogram(values: &[f64], bin_width: f64) -> Result<FeatureValues, FeatureError> {
    if values.is_empty() {
        return Err(FeatureError::EmptyRoi);
    }
    if !(bin_width > 0.0) {
        return Err(FeatureError::Degenerate(format!("bin width {bin_width}")));
    }
    let s = sorted(values);
    let min = s[0];
    let max = s[s.len() - 1];
    let steps = ((max - min) / bin_width).round();
    if steps > MAX_IVH_STEPS {
        return Err(FeatureError::Degenerate(format!("{steps} histogram steps")));
    }
    let n = s.len() as f64;
    let grid: Vec<f64> = (0..=steps as usize).map(|i| min + i as f64 * bin_width).collect();
    // Fraction of the volume at or above each grid intensity.
    let fraction: Vec<f64> = grid
        .iter()
        .map(|level| {
            let below = s.partition_point(|v| *v < level - bin_width * 1e-9);
            (s.len() - below) as f64 / n
        })
        .collect();
    let span = max - min;
    let gamma = |level: f64| if span == 0.0 { 0.0 } else { (level - min) / span };

    let volume_at = |x: f64| {
        grid.iter()
            .zip(&fraction)
            .find(|(level, _)| gamma(**level) >= x - 1e-12)
            .map(|(_, f)| *f)
            .unwrap_or(0.0)
    };
    let intensity_at = |x: f64| {
        grid.iter()
            .zip(&fraction)
            .find(|(_, f)| **f <= x + 1e-12)
            .map(|(level, _)| *level)
            .unwrap_or(max + bin_width)
    };

    let v10 = volume_at(0.1);
    let v90 = volume_at(0.9);
    let i10 = intensity_at(0.1);
    let i90 = intensity_at(0.9);
    let auc = if grid.len() < 2 {
        0.0
    } else {
        grid.windows(2)
            .zip(fraction.windows(2))
            .map(|(g, f)| (gamma(g[1]) - gamma(g[0])) * (f[0] + f[1]) / 2.0)
            .sum()
    };

    let mut out = FeatureValues::new();
    out.insert("v10".into(), v10);
    out.insert("v90".into(), v90);
    out.insert("i10".into(), i10);
    out.insert("i90".into(), i90);
    out.insert("v10_minus_v90".into(), v10 - v90);
    out.insert("i10_minus_i90".into(), i10 - i90);
    out.insert("auc".into(), auc);
    Ok(out)
}
