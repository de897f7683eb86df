//! Size-zone and distance-zone matrices. A zone is a 26-connected group of
//! ROI voxels sharing one grey level.

use std::collections::VecDeque;

use ndarray::Array3;

use crate::features::texture::{CountMatrix, EmphasisNames, LevelGrid, emphasis_features, neighbours};
use crate::features::{FeatureError, FeatureValues};
use crate::processing::Mask;

const SZ_NAMES: EmphasisNames = EmphasisNames {
    short: "sze",
    long: "lze",
    low_grey: "lgze",
    high_grey: "hgze",
    short_low: "szlge",
    short_high: "szhge",
    long_low: "lzlge",
    long_high: "lzhge",
    glnu: "glnu",
    glnu_norm: "glnu_norm",
    jnu: "zsnu",
    jnu_norm: "zsnu_norm",
    perc: "z_perc",
    gl_var: "gl_var",
    j_var: "zs_var",
    j_entr: "zs_entr",
};

const DZ_NAMES: EmphasisNames = EmphasisNames {
    short: "sde",
    long: "lde",
    low_grey: "lgze",
    high_grey: "hgze",
    short_low: "sdlge",
    short_high: "sdhge",
    long_low: "ldlge",
    long_high: "ldhge",
    glnu: "glnu",
    glnu_norm: "glnu_norm",
    jnu: "zdnu",
    jnu_norm: "zdnu_norm",
    perc: "z_perc",
    gl_var: "gl_var",
    j_var: "zd_var",
    j_entr: "zd_entr",
};

const FACE_OFFSETS: [[isize; 3]; 6] = [
    [-1, 0, 0],
    [1, 0, 0],
    [0, -1, 0],
    [0, 1, 0],
    [0, 0, -1],
    [0, 0, 1],
];

pub struct Zone {
    pub level: usize,
    pub voxels: Vec<(usize, usize, usize)>,
}

pub fn zones(grid: &LevelGrid) -> Vec<Zone> {
    let mut seen = Array3::from_elem(grid.levels.dim(), false);
    let mut out = Vec::new();
    for (start, level) in grid.voxels() {
        if seen[start] {
            continue;
        }
        seen[start] = true;
        let mut stack = vec![start];
        let mut voxels = Vec::new();
        while let Some(at) = stack.pop() {
            voxels.push(at);
            for d in neighbours() {
                if let Some(next) = grid.step(at, d)
                    && !seen[next]
                    && grid.level(next) == level
                {
                    seen[next] = true;
                    stack.push(next);
                }
            }
        }
        out.push(Zone { level, voxels });
    }
    out
}

/// Face-connected distance to the mask border; border voxels are at 1,
/// voxels outside the mask at 0.
pub fn border_distance(mask: &Mask) -> Array3<usize> {
    let dims = mask.dim();
    let mut dist = Array3::from_elem(dims, 0usize);
    let mut queue = VecDeque::new();
    let step = |at: (usize, usize, usize), d: [isize; 3]| {
        let i = at.0 as isize + d[0];
        let j = at.1 as isize + d[1];
        let k = at.2 as isize + d[2];
        if i < 0 || j < 0 || k < 0 || i >= dims.0 as isize || j >= dims.1 as isize || k >= dims.2 as isize {
            None
        } else {
            Some((i as usize, j as usize, k as usize))
        }
    };

    for (idx, &set) in mask.data.indexed_iter() {
        if !set {
            continue;
        }
        let on_border = FACE_OFFSETS
            .iter()
            .any(|d| step(idx, *d).is_none_or(|n| !mask.data[n]));
        if on_border {
            dist[idx] = 1;
            queue.push_back(idx);
        }
    }
    while let Some(at) = queue.pop_front() {
        for d in FACE_OFFSETS {
            if let Some(next) = step(at, d)
                && mask.data[next]
                && dist[next] == 0
            {
                dist[next] = dist[at] + 1;
                queue.push_back(next);
            }
        }
    }
    dist
}

pub fn size_zone_matrix(grid: &LevelGrid) -> CountMatrix {
    let mut m = CountMatrix::new(grid.n_levels);
    for zone in zones(grid) {
        m.add(zone.level, zone.voxels.len());
    }
    m
}

pub fn distance_zone_matrix(grid: &LevelGrid, mask_morph: &Mask) -> CountMatrix {
    let dist = border_distance(mask_morph);
    let mut m = CountMatrix::new(grid.n_levels);
    for zone in zones(grid) {
        let nearest = zone.voxels.iter().map(|v| dist[*v].max(1)).min().unwrap_or(1);
        m.add(zone.level, nearest);
    }
    m
}

pub fn extract_glszm(grid: &LevelGrid) -> Result<FeatureValues, FeatureError> {
    emphasis_features(&size_zone_matrix(grid), grid.n_voxels as f64, &SZ_NAMES)
}

pub fn extract_gldzm(grid: &LevelGrid, mask_morph: &Mask) -> Result<FeatureValues, FeatureError> {
    if mask_morph.dim() != grid.levels.dim() {
        return Err(FeatureError::Degenerate("morphological mask grid mismatch".into()));
    }
    emphasis_features(&distance_zone_matrix(grid, mask_morph), grid.n_voxels as f64, &DZ_NAMES)
}
