//! Neighbourhood grey tone difference and neighbouring grey level
//! dependence matrices over the 26-neighbourhood.

use crate::features::texture::{CountMatrix, EmphasisNames, LevelGrid, emphasis_features, neighbours};
use crate::features::{FeatureError, FeatureValues};

const NGLDM_NAMES: EmphasisNames = EmphasisNames {
    short: "lde",
    long: "hde",
    low_grey: "lgce",
    high_grey: "hgce",
    short_low: "ldlge",
    short_high: "ldhge",
    long_low: "hdlge",
    long_high: "hdhge",
    glnu: "glnu",
    glnu_norm: "glnu_norm",
    jnu: "dcnu",
    jnu_norm: "dcnu_norm",
    perc: "dc_perc",
    gl_var: "gl_var",
    j_var: "dc_var",
    j_entr: "dc_entr",
};

/// Per grey level: voxel count `n_i` and summed absolute difference `s_i`
/// between the level and its in-ROI neighbourhood mean.
pub fn tone_difference(grid: &LevelGrid) -> (Vec<f64>, Vec<f64>) {
    let mut n = vec![0.0; grid.n_levels];
    let mut s = vec![0.0; grid.n_levels];
    for (idx, level) in grid.voxels() {
        let mut sum = 0.0;
        let mut count = 0usize;
        for d in neighbours() {
            if let Some(next) = grid.step(idx, d) {
                let l = grid.level(next);
                if l > 0 {
                    sum += l as f64;
                    count += 1;
                }
            }
        }
        if count == 0 {
            continue;
        }
        n[level - 1] += 1.0;
        s[level - 1] += (level as f64 - sum / count as f64).abs();
    }
    (n, s)
}

pub fn extract_ngtdm(grid: &LevelGrid) -> Result<FeatureValues, FeatureError> {
    let (n, s) = tone_difference(grid);
    let nvc: f64 = n.iter().sum();
    if nvc == 0.0 {
        return Err(FeatureError::Degenerate("no voxel has an in-roi neighbour".into()));
    }
    let present: Vec<(f64, f64, f64)> = n
        .iter()
        .zip(&s)
        .enumerate()
        .filter(|(_, (ni, _))| **ni > 0.0)
        .map(|(i, (ni, si))| ((i + 1) as f64, ni / nvc, *si))
        .collect();
    let ngp = present.len() as f64;
    let s_total: f64 = s.iter().sum();
    let ps: f64 = present.iter().map(|(_, p, s)| p * s).sum();

    let mut pair_sq = 0.0;
    let mut pair_busy = 0.0;
    let mut complexity = 0.0;
    let mut strength = 0.0;
    for &(i, pi, si) in &present {
        for &(j, pj, sj) in &present {
            pair_sq += pi * pj * (i - j).powi(2);
            pair_busy += (i * pi - j * pj).abs();
            complexity += (i - j).abs() * (pi * si + pj * sj) / (pi + pj);
            strength += (pi + pj) * (i - j).powi(2);
        }
    }

    let mut out = FeatureValues::new();
    out.insert("coarseness".into(), if ps == 0.0 { 1e6 } else { 1.0 / ps });
    out.insert(
        "contrast".into(),
        if ngp > 1.0 {
            pair_sq / (ngp * (ngp - 1.0)) * s_total / nvc
        } else {
            0.0
        },
    );
    out.insert("busyness".into(), if pair_busy == 0.0 { 0.0 } else { ps / pair_busy });
    out.insert("complexity".into(), complexity / nvc);
    out.insert("strength".into(), if s_total == 0.0 { 0.0 } else { strength / s_total });
    Ok(out)
}

/// Dependence count per voxel: itself plus same-level in-ROI neighbours.
pub fn dependence_matrix(grid: &LevelGrid) -> CountMatrix {
    let mut m = CountMatrix::new(grid.n_levels);
    for (idx, level) in grid.voxels() {
        let same = neighbours()
            .filter_map(|d| grid.step(idx, d))
            .filter(|next| grid.level(*next) == level)
            .count();
        m.add(level, same + 1);
    }
    m
}

pub fn extract_ngldm(grid: &LevelGrid) -> Result<FeatureValues, FeatureError> {
    emphasis_features(&dependence_matrix(grid), grid.n_voxels as f64, &NGLDM_NAMES)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::texture::test_support::grid;
    use ndarray::Array3;

    #[test]
    fn uniform_roi_has_no_tone_difference() {
        let g = grid(Array3::from_elem((3, 3, 3), 3), 3);
        let f = extract_ngtdm(&g).expect("ngtdm");
        assert_eq!(f["coarseness"], 1e6);
        assert_eq!(f["contrast"], 0.0);
        assert_eq!(f["strength"], 0.0);
    }

    #[test]
    fn two_level_slab_has_positive_contrast() {
        let levels = Array3::from_shape_fn((2, 3, 3), |(i, _, _)| i + 1);
        let f = extract_ngtdm(&grid(levels, 2)).expect("ngtdm");
        assert!(f["contrast"] > 0.0);
        assert!(f["coarseness"].is_finite());
    }

    #[test]
    fn full_cube_centre_depends_on_all_neighbours() {
        let g = grid(Array3::from_elem((3, 3, 3), 1), 1);
        let m = dependence_matrix(&g);
        assert_eq!(m.total(), 27.0);
        let f = extract_ngldm(&g).expect("ngldm");
        assert_eq!(f["dc_perc"], 1.0);
        assert!(f["hde"] > f["lde"]);
    }
}
