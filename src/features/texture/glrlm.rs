//! Grey level run length matrix merged over the 13 directions.

use crate::features::texture::{CountMatrix, DIRECTIONS, EmphasisNames, LevelGrid, emphasis_features};
use crate::features::{FeatureError, FeatureValues};

const NAMES: EmphasisNames = EmphasisNames {
    short: "sre",
    long: "lre",
    low_grey: "lgre",
    high_grey: "hgre",
    short_low: "srlge",
    short_high: "srhge",
    long_low: "lrlge",
    long_high: "lrhge",
    glnu: "glnu",
    glnu_norm: "glnu_norm",
    jnu: "rlnu",
    jnu_norm: "rlnu_norm",
    perc: "r_perc",
    gl_var: "gl_var",
    j_var: "rl_var",
    j_entr: "rl_entr",
};

pub fn matrix(grid: &LevelGrid) -> CountMatrix {
    let mut m = CountMatrix::new(grid.n_levels);
    for d in DIRECTIONS {
        let back = [-d[0], -d[1], -d[2]];
        for (idx, level) in grid.voxels() {
            // Only start a run where the previous voxel breaks it.
            let continues = grid.step(idx, back).is_some_and(|prev| grid.level(prev) == level);
            if continues {
                continue;
            }
            let mut len = 1;
            let mut at = idx;
            while let Some(next) = grid.step(at, d) {
                if grid.level(next) != level {
                    break;
                }
                len += 1;
                at = next;
            }
            m.add(level, len);
        }
    }
    m
}

pub fn extract(grid: &LevelGrid) -> Result<FeatureValues, FeatureError> {
    let m = matrix(grid);
    emphasis_features(&m, (grid.n_voxels * DIRECTIONS.len()) as f64, &NAMES)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::texture::test_support::grid;
    use ndarray::Array3;

    #[test]
    fn line_of_equal_levels_is_one_run_along_its_axis() {
        let g = grid(Array3::from_elem((1, 1, 4), 1), 1);
        let m = matrix(&g);
        // One run of length 4 along z; every other direction sees 4 runs of 1.
        assert_eq!(m.total(), 1.0 + 12.0 * 4.0);
        let f = extract(&g).expect("glrlm");
        assert!((f["r_perc"] - 49.0 / 52.0).abs() < 1e-12);
    }

    #[test]
    fn alternating_levels_break_runs() {
        let levels = Array3::from_shape_fn((1, 1, 4), |(_, _, k)| 1 + k % 2);
        let g = grid(levels, 2);
        let f = extract(&g).expect("glrlm");
        assert_eq!(f["lre"], 1.0);
        assert_eq!(f["sre"], 1.0);
    }
}
