//! Per-scale volume preparation and feature-group evaluation.

use std::panic::{AssertUnwindSafe, catch_unwind};

use ndarray::Array3;

use crate::config::{ComputationConfig, ImagingParams};
use crate::features::{FeatureBackend, FeatureGroup, GroupInput};
use crate::logging::SlotLog;
use crate::processing::discretize::{self, Discretized, DiscretizationError};
use crate::processing::filter::{FilterError, apply_filter};
use crate::processing::interp::{resample, resample_mask};
use crate::processing::resegment::resegment;
use crate::processing::{Mask, Volume, finite_range, roi_extract};
use crate::record::GroupOutcome;

/// Volumes at one geometric scale, ready for feature computation.
pub struct Prepared {
    pub volume: Volume,
    pub mask_morph: Mask,
    pub mask_int: Mask,
    /// Intensities inside `mask_int`, NaN elsewhere.
    pub intensities: Array3<f64>,
}

impl Prepared {
    pub fn has_intensities(&self) -> bool {
        finite_range(&self.intensities).is_some()
    }

    pub fn input<'a>(&'a self, quantized: Option<&'a Discretized>) -> GroupInput<'a> {
        GroupInput {
            volume: &self.volume,
            mask_int: &self.mask_int,
            mask_morph: &self.mask_morph,
            intensities: &self.intensities,
            quantized,
        }
    }
}

/// Resample to `scale` and re-segment. The usable intensity mask is
/// `range AND outlier AND morph`.
pub fn prepare(volume: &Volume, roi: &Mask, params: &ImagingParams, scale: [f64; 3]) -> Prepared {
    let volume = resample(volume, scale, params.vol_interp, params.gl_round);
    let mask_morph = resample_mask(roi, scale, params.roi_interp, params.roi_pv);
    let mask_int = resegment(&volume, &mask_morph, params.im_range, params.outliers);
    let intensities = roi_extract(&volume, &mask_int);
    Prepared {
        volume,
        mask_morph,
        mask_int,
        intensities,
    }
}

/// Apply the modality's linear filter, if any, and refresh the ROI
/// intensities. Masks are left untouched.
pub fn filter_prepared(
    prepared: Prepared,
    config: &ComputationConfig,
    params: &ImagingParams,
) -> Result<Prepared, FilterError> {
    let Some((_, spec)) = config.filter_for(params) else {
        return Ok(prepared);
    };
    let volume = apply_filter(&prepared.volume, spec)?;
    let intensities = roi_extract(&volume, &prepared.mask_int);
    Ok(Prepared {
        volume,
        intensities,
        ..prepared
    })
}

/// Evaluate one group inside its own failure boundary.
pub fn evaluate(
    backend: &dyn FeatureBackend,
    group: FeatureGroup,
    input: &GroupInput<'_>,
    log: &SlotLog,
) -> GroupOutcome {
    match catch_unwind(AssertUnwindSafe(|| backend.compute(group, input))) {
        Ok(Ok(values)) => GroupOutcome::computed(values),
        Ok(Err(err)) => {
            log.warn(&format!("{group} failed: {err}"));
            GroupOutcome::failed(err.to_string())
        }
        Err(_) => {
            log.warn(&format!("{group} panicked"));
            GroupOutcome::failed("feature computation panicked")
        }
    }
}

/// Discretization feeding a non-texture group, if it needs one.
pub fn non_texture_quantization(
    group: FeatureGroup,
    intensities: &Array3<f64>,
    params: &ImagingParams,
) -> Option<Result<Discretized, DiscretizationError>> {
    let disc = &params.discretisation;
    match group {
        FeatureGroup::IntensityHistogram => {
            Some(discretize::discretize(intensities, disc.ih, disc.user_set_min_value))
        }
        FeatureGroup::IntensityVolumeHistogram => Some(match disc.ivh {
            Some(spec) => discretize::discretize_ivh(intensities, spec, disc.user_set_min_value),
            // Without an IVH setting the histogram runs on raw intensities.
            None => Ok(Discretized {
                data: intensities.clone(),
                n_levels: 0,
                bin_width: 1.0,
            }),
        }),
        _ => None,
    }
}

/// Number formatting used inside texture keys: `2.5` becomes `2dot5`.
pub fn key_number(value: f64) -> String {
    format!("{value}").replace('.', "dot")
}

/// `<group>_scale<s>_algo<ALGO>_bin<g>`.
pub fn texture_key(group: FeatureGroup, scale: [f64; 3], algo: discretize::DiscretizationAlgo, level: f64) -> String {
    format!(
        "{}_scale{}_algo{}_bin{}",
        group.key(),
        key_number(scale[0]),
        algo,
        key_number(level)
    )
}
