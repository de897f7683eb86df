//! ROI mask lookup and bounding-box extraction.

use ndarray::{Array3, s};
use thiserror::Error;

use crate::processing::{Mask, Volume};
use crate::scan::MedicalScan;

#[derive(Debug, Error)]
pub enum RoiError {
    #[error("roi `{0}` not found in scan")]
    NotFound(String),
    #[error("roi `{0}` contains no voxels")]
    Empty(String),
}

/// Resolve `name` against the scan's masks. `A+B` selects the union.
pub fn roi_mask(scan: &MedicalScan, name: &str) -> Result<Array3<bool>, RoiError> {
    let mut combined: Option<Array3<bool>> = None;
    for part in name.split('+').map(str::trim) {
        let mask = scan
            .rois
            .get(part)
            .ok_or_else(|| RoiError::NotFound(part.to_string()))?;
        let part_mask = mask.mapv(|v| v > 0);
        combined = Some(match combined {
            None => part_mask,
            Some(mut acc) => {
                acc.zip_mut_with(&part_mask, |a, &b| *a = *a || b);
                acc
            }
        });
    }
    combined.ok_or_else(|| RoiError::NotFound(name.to_string()))
}

/// Inclusive-exclusive bounds per axis of the `true` voxels.
fn bounding_box(mask: &Array3<bool>) -> Option<[(usize, usize); 3]> {
    let mut bounds: Option<[(usize, usize); 3]> = None;
    for ((i, j, k), &inside) in mask.indexed_iter() {
        if !inside {
            continue;
        }
        let idx = [i, j, k];
        bounds = Some(match bounds {
            None => [(i, i + 1), (j, j + 1), (k, k + 1)],
            Some(mut b) => {
                for axis in 0..3 {
                    b[axis].0 = b[axis].0.min(idx[axis]);
                    b[axis].1 = b[axis].1.max(idx[axis] + 1);
                }
                b
            }
        });
    }
    bounds
}

/// Intensity volume and ROI mask, cropped to the ROI bounding box grown by
/// `margin` voxels. `None` keeps the full grid.
pub fn extract_roi(
    scan: &MedicalScan,
    name: &str,
    margin: Option<usize>,
) -> Result<(Volume, Mask), RoiError> {
    let mask = roi_mask(scan, name)?;
    let bounds = bounding_box(&mask).ok_or_else(|| RoiError::Empty(name.to_string()))?;
    let data = scan.data.mapv(f64::from);

    let Some(margin) = margin else {
        return Ok((
            Volume::new(data, scan.spacing),
            Mask::new(mask, scan.spacing),
        ));
    };

    let dims = [mask.dim().0, mask.dim().1, mask.dim().2];
    let mut lo = [0usize; 3];
    let mut hi = [0usize; 3];
    for axis in 0..3 {
        lo[axis] = bounds[axis].0.saturating_sub(margin);
        hi[axis] = (bounds[axis].1 + margin).min(dims[axis]);
    }
    let window = s![lo[0]..hi[0], lo[1]..hi[1], lo[2]..hi[2]];
    Ok((
        Volume::new(data.slice(window).to_owned(), scan.spacing),
        Mask::new(mask.slice(window).to_owned(), scan.spacing),
    ))
}
