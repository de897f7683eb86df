//! Grey-level discretization of extracted ROI intensities.

use std::fmt;

use ndarray::Array3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::MAX_GREY_LEVELS;
use crate::processing::finite_range;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DiscretizationAlgo {
    /// Fixed bin number.
    FBN,
    /// Fixed bin size.
    FBS,
}

impl fmt::Display for DiscretizationAlgo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscretizationAlgo::FBN => f.write_str("FBN"),
            DiscretizationAlgo::FBS => f.write_str("FBS"),
        }
    }
}

/// One discretization setting: a bin count for FBN, a bin width for FBS.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BinSpec {
    #[serde(rename = "type")]
    pub algo: DiscretizationAlgo,
    pub val: f64,
}

#[derive(Debug, Error, PartialEq)]
pub enum DiscretizationError {
    #[error("bin count must be a positive integer, got {0}")]
    InvalidBinCount(f64),
    #[error("bin width must be positive, got {0}")]
    InvalidBinWidth(f64),
    #[error("no finite intensities to discretize")]
    Empty,
    #[error("discretization would produce {0} grey levels, limit is {max}", max = MAX_GREY_LEVELS)]
    TooManyLevels(f64),
}

/// Quantized ROI: grey levels `1..=n_levels` inside the ROI, NaN outside.
#[derive(Debug, Clone, PartialEq)]
pub struct Discretized {
    pub data: Array3<f64>,
    pub n_levels: usize,
    /// Normalization denominator for intensity-volume histograms.
    pub bin_width: f64,
}

struct Binning {
    origin: f64,
    width: f64,
    n_levels: usize,
    constant: bool,
}

fn binning(values: &Array3<f64>, spec: BinSpec, user_min: Option<f64>) -> Result<Binning, DiscretizationError> {
    let (min, max) = finite_range(values).ok_or(DiscretizationError::Empty)?;
    match spec.algo {
        DiscretizationAlgo::FBN => {
            if !(spec.val >= 1.0 && spec.val.fract() == 0.0) {
                return Err(DiscretizationError::InvalidBinCount(spec.val));
            }
            if spec.val > MAX_GREY_LEVELS as f64 {
                return Err(DiscretizationError::TooManyLevels(spec.val));
            }
            let n = spec.val as usize;
            Ok(Binning {
                origin: min,
                width: (max - min) / n as f64,
                n_levels: n,
                constant: max == min,
            })
        }
        DiscretizationAlgo::FBS => {
            if !(spec.val > 0.0 && spec.val.is_finite()) {
                return Err(DiscretizationError::InvalidBinWidth(spec.val));
            }
            let origin = user_min.unwrap_or(min);
            let top = ((max - origin) / spec.val).floor() + 1.0;
            if !(top <= MAX_GREY_LEVELS as f64) {
                return Err(DiscretizationError::TooManyLevels(top));
            }
            Ok(Binning {
                origin,
                width: spec.val,
                n_levels: top.max(1.0) as usize,
                constant: false,
            })
        }
    }
}

impl Binning {
    fn level(&self, value: f64) -> usize {
        if self.constant {
            return 1;
        }
        let raw = ((value - self.origin) / self.width).floor() as i64 + 1;
        (raw.max(1) as usize).min(self.n_levels)
    }
}

/// Quantize finite intensities into grey levels.
pub fn discretize(
    values: &Array3<f64>,
    spec: BinSpec,
    user_min: Option<f64>,
) -> Result<Discretized, DiscretizationError> {
    let bins = binning(values, spec, user_min)?;
    let data = values.mapv(|v| if v.is_finite() { bins.level(v) as f64 } else { f64::NAN });
    Ok(Discretized {
        data,
        n_levels: bins.n_levels,
        bin_width: 1.0,
    })
}

/// Intensity-volume histogram discretization. FBS yields lower bin edges in
/// intensity units with the bin width as denominator; FBN yields grey levels
/// with a unit denominator.
pub fn discretize_ivh(
    values: &Array3<f64>,
    spec: BinSpec,
    user_min: Option<f64>,
) -> Result<Discretized, DiscretizationError> {
    let bins = binning(values, spec, user_min)?;
    match spec.algo {
        DiscretizationAlgo::FBN => Ok(Discretized {
            data: values.mapv(|v| if v.is_finite() { bins.level(v) as f64 } else { f64::NAN }),
            n_levels: bins.n_levels,
            bin_width: 1.0,
        }),
        DiscretizationAlgo::FBS => Ok(Discretized {
            data: values.mapv(|v| {
                if v.is_finite() {
                    bins.origin + (bins.level(v) - 1) as f64 * bins.width
                } else {
                    f64::NAN
                }
            }),
            n_levels: bins.n_levels,
            bin_width: bins.width,
        }),
    }
}
