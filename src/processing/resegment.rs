//! Intensity re-segmentation: range and outlier exclusion.

use ndarray::Zip;
use serde::{Deserialize, Serialize};

use crate::constants::OUTLIER_SIGMAS;
use crate::processing::{Mask, Volume};

/// Closed intensity interval; a missing bound is open.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct IntensityRange {
    #[serde(default)]
    pub lower: Option<f64>,
    #[serde(default)]
    pub upper: Option<f64>,
}

impl IntensityRange {
    pub fn contains(&self, value: f64) -> bool {
        value.is_finite()
            && self.lower.is_none_or(|lo| value >= lo)
            && self.upper.is_none_or(|hi| value <= hi)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutlierRule {
    #[default]
    #[serde(rename = "none", alias = "off")]
    Off,
    /// Exclude voxels further than three standard deviations from the ROI mean.
    #[serde(rename = "collewet")]
    Collewet,
}

/// Voxels of the whole grid whose intensity falls inside `range`.
pub fn range_mask(volume: &Volume, range: IntensityRange) -> Mask {
    Mask::new(volume.data.mapv(|v| range.contains(v)), volume.spacing)
}

/// Voxels of the whole grid within the outlier bounds estimated over `roi`.
pub fn outlier_mask(volume: &Volume, roi: &Mask, rule: OutlierRule) -> Mask {
    let keep_all = || Mask::new(volume.data.mapv(|_| true), volume.spacing);
    if rule == OutlierRule::Off {
        return keep_all();
    }

    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    let mut n = 0usize;
    Zip::from(&volume.data).and(&roi.data).for_each(|&v, &inside| {
        if inside && v.is_finite() {
            sum += v;
            sum_sq += v * v;
            n += 1;
        }
    });
    if n == 0 {
        return keep_all();
    }
    let mean = sum / n as f64;
    let sigma = (sum_sq / n as f64 - mean * mean).max(0.0).sqrt();
    let lo = mean - OUTLIER_SIGMAS * sigma;
    let hi = mean + OUTLIER_SIGMAS * sigma;
    Mask::new(volume.data.mapv(|v| v >= lo && v <= hi), volume.spacing)
}

/// Usable intensity mask: `range AND outlier AND morph`. Outlier statistics
/// are estimated over the range-restricted morphological mask.
pub fn resegment(volume: &Volume, morph: &Mask, range: IntensityRange, rule: OutlierRule) -> Mask {
    let in_range = range_mask(volume, range);
    let restricted = in_range.and(morph);
    let outliers = outlier_mask(volume, &restricted, rule);
    in_range.and(&outliers).and(morph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn volume_with_spike() -> (Volume, Mask) {
        // 27 voxels at 100, one far outlier and one below the range floor.
        let mut data = Array3::from_elem((3, 3, 4), 100.0);
        data[[0, 0, 3]] = 100_000.0;
        data[[1, 1, 3]] = -2000.0;
        data[[2, 2, 3]] = 101.0;
        let mut morph = Array3::from_elem((3, 3, 4), true);
        morph[[2, 2, 2]] = false;
        (Volume::new(data, [1.0; 3]), Mask::new(morph, [1.0; 3]))
    }

    #[test]
    fn range_is_closed_and_optional() {
        let range = IntensityRange {
            lower: Some(0.0),
            upper: None,
        };
        assert!(range.contains(0.0));
        assert!(range.contains(1e9));
        assert!(!range.contains(-0.1));
        assert!(!range.contains(f64::NAN));
    }

    #[test]
    fn combined_mask_is_conjunction_of_rules() {
        let (vol, morph) = volume_with_spike();
        let range = IntensityRange {
            lower: Some(-1000.0),
            upper: None,
        };
        let usable = resegment(&vol, &morph, range, OutlierRule::Collewet);

        let expected_range = range_mask(&vol, range);
        let expected_outlier = outlier_mask(&vol, &expected_range.and(&morph), OutlierRule::Collewet);
        let expected = expected_range.and(&expected_outlier).and(&morph);
        assert_eq!(usable, expected);

        assert!(!usable.data[[1, 1, 3]], "below range floor");
        assert!(!usable.data[[0, 0, 3]], "outlier");
        assert!(!usable.data[[2, 2, 2]], "outside morphological mask");
        assert!(usable.data[[2, 2, 3]]);
        assert_eq!(usable.count(), 36 - 3);
    }

    #[test]
    fn outlier_rule_off_keeps_everything() {
        let (vol, morph) = volume_with_spike();
        let usable = resegment(&vol, &morph, IntensityRange::default(), OutlierRule::Off);
        assert_eq!(usable, morph);
    }
}
