//! Texture matrices over discretized ROI grey levels. Every matrix merges the
//! 13 unique 3D directions (26-connectivity) into one.

pub mod glcm;
pub mod glrlm;
pub mod neighbourhood;
pub mod zones;

use ndarray::Array3;

use crate::features::{FeatureError, FeatureGroup, FeatureValues};
use crate::processing::Mask;
use crate::processing::discretize::Discretized;

/// One half of the 26-neighbourhood; the other half is the negation.
pub(crate) const DIRECTIONS: [[isize; 3]; 13] = [
    [0, 0, 1],
    [0, 1, 0],
    [0, 1, 1],
    [0, 1, -1],
    [1, 0, 0],
    [1, 0, 1],
    [1, 0, -1],
    [1, 1, 0],
    [1, -1, 0],
    [1, 1, 1],
    [1, 1, -1],
    [1, -1, 1],
    [1, -1, -1],
];

/// Grey levels `1..=n_levels` inside the ROI, 0 outside.
#[derive(Debug, Clone)]
pub struct LevelGrid {
    pub levels: Array3<usize>,
    pub n_levels: usize,
    pub n_voxels: usize,
}

impl LevelGrid {
    pub fn from_discretized(q: &Discretized) -> Result<Self, FeatureError> {
        let levels = q.data.mapv(|v| if v.is_finite() && v >= 1.0 { v.round() as usize } else { 0 });
        let n_voxels = levels.iter().filter(|v| **v > 0).count();
        if n_voxels == 0 {
            return Err(FeatureError::EmptyRoi);
        }
        let observed = levels.iter().copied().max().unwrap_or(0);
        Ok(Self {
            levels,
            n_levels: q.n_levels.max(observed),
            n_voxels,
        })
    }

    pub fn step(&self, at: (usize, usize, usize), d: [isize; 3]) -> Option<(usize, usize, usize)> {
        let (d0, d1, d2) = self.levels.dim();
        let i = at.0 as isize + d[0];
        let j = at.1 as isize + d[1];
        let k = at.2 as isize + d[2];
        if i < 0 || j < 0 || k < 0 || i >= d0 as isize || j >= d1 as isize || k >= d2 as isize {
            return None;
        }
        Some((i as usize, j as usize, k as usize))
    }

    pub fn level(&self, at: (usize, usize, usize)) -> usize {
        self.levels[at]
    }

    /// ROI voxels with their grey level.
    pub fn voxels(&self) -> impl Iterator<Item = ((usize, usize, usize), usize)> + '_ {
        self.levels
            .indexed_iter()
            .filter(|(_, level)| **level > 0)
            .map(|(idx, level)| (idx, *level))
    }
}

/// All 26 neighbour offsets.
pub(crate) fn neighbours() -> impl Iterator<Item = [isize; 3]> {
    DIRECTIONS
        .into_iter()
        .flat_map(|d| [d, [-d[0], -d[1], -d[2]]])
}

/// Counts indexed by grey level (rows) and a secondary positive quantity
/// such as run length, zone size, distance or dependence count (columns).
#[derive(Debug, Clone)]
pub struct CountMatrix {
    counts: Vec<Vec<f64>>,
}

impl CountMatrix {
    pub fn new(n_levels: usize) -> Self {
        Self {
            counts: vec![Vec::new(); n_levels],
        }
    }

    /// `level` and `j` are both one-based.
    pub fn add(&mut self, level: usize, j: usize) {
        let row = &mut self.counts[level - 1];
        if row.len() < j {
            row.resize(j, 0.0);
        }
        row[j - 1] += 1.0;
    }

    pub fn total(&self) -> f64 {
        self.counts.iter().flatten().sum()
    }

    fn cells(&self) -> impl Iterator<Item = (f64, f64, f64)> + '_ {
        self.counts.iter().enumerate().flat_map(|(i, row)| {
            row.iter()
                .enumerate()
                .filter(|(_, c)| **c > 0.0)
                .map(move |(j, c)| ((i + 1) as f64, (j + 1) as f64, *c))
        })
    }
}

/// Feature names for the emphasis family shared by run-length, zone and
/// dependence matrices.
pub(crate) struct EmphasisNames {
    pub short: &'static str,
    pub long: &'static str,
    pub low_grey: &'static str,
    pub high_grey: &'static str,
    pub short_low: &'static str,
    pub short_high: &'static str,
    pub long_low: &'static str,
    pub long_high: &'static str,
    pub glnu: &'static str,
    pub glnu_norm: &'static str,
    pub jnu: &'static str,
    pub jnu_norm: &'static str,
    pub perc: &'static str,
    pub gl_var: &'static str,
    pub j_var: &'static str,
    pub j_entr: &'static str,
}

pub(crate) fn emphasis_features(
    m: &CountMatrix,
    n_voxels: f64,
    names: &EmphasisNames,
) -> Result<FeatureValues, FeatureError> {
    let ns = m.total();
    if ns == 0.0 {
        return Err(FeatureError::Degenerate("empty texture matrix".into()));
    }
    let mut acc = [0.0f64; 8];
    let mut mu_i = 0.0;
    let mut mu_j = 0.0;
    let mut entropy = 0.0;
    let mut row_sums: Vec<f64> = Vec::new();
    let mut col_sums: Vec<f64> = Vec::new();
    for (i, j, c) in m.cells() {
        let (i2, j2) = (i * i, j * j);
        acc[0] += c / j2;
        acc[1] += c * j2;
        acc[2] += c / i2;
        acc[3] += c * i2;
        acc[4] += c / (i2 * j2);
        acc[5] += c * i2 / j2;
        acc[6] += c * j2 / i2;
        acc[7] += c * i2 * j2;
        let p = c / ns;
        mu_i += i * p;
        mu_j += j * p;
        entropy -= p * p.log2();
        let (ri, cj) = (i as usize - 1, j as usize - 1);
        if row_sums.len() <= ri {
            row_sums.resize(ri + 1, 0.0);
        }
        if col_sums.len() <= cj {
            col_sums.resize(cj + 1, 0.0);
        }
        row_sums[ri] += c;
        col_sums[cj] += c;
    }
    let (mut var_i, mut var_j) = (0.0, 0.0);
    for (i, j, c) in m.cells() {
        let p = c / ns;
        var_i += (i - mu_i).powi(2) * p;
        var_j += (j - mu_j).powi(2) * p;
    }
    let glnu = row_sums.iter().map(|s| s * s).sum::<f64>() / ns;
    let jnu = col_sums.iter().map(|s| s * s).sum::<f64>() / ns;

    let mut out = FeatureValues::new();
    let named = [
        (names.short, acc[0] / ns),
        (names.long, acc[1] / ns),
        (names.low_grey, acc[2] / ns),
        (names.high_grey, acc[3] / ns),
        (names.short_low, acc[4] / ns),
        (names.short_high, acc[5] / ns),
        (names.long_low, acc[6] / ns),
        (names.long_high, acc[7] / ns),
        (names.glnu, glnu),
        (names.glnu_norm, glnu / ns),
        (names.jnu, jnu),
        (names.jnu_norm, jnu / ns),
        (names.perc, ns / n_voxels),
        (names.gl_var, var_i),
        (names.j_var, var_j),
        (names.j_entr, entropy),
    ];
    for (name, value) in named {
        out.insert(name.to_string(), value);
    }
    Ok(out)
}

/// Compute one texture group over a discretized ROI.
pub fn extract(group: FeatureGroup, q: &Discretized, mask_morph: &Mask) -> Result<FeatureValues, FeatureError> {
    let grid = LevelGrid::from_discretized(q)?;
    match group {
        FeatureGroup::Glcm => glcm::extract(&grid),
        FeatureGroup::Glrlm => glrlm::extract(&grid),
        FeatureGroup::Glszm => zones::extract_glszm(&grid),
        FeatureGroup::Gldzm => zones::extract_gldzm(&grid, mask_morph),
        FeatureGroup::Ngtdm => neighbourhood::extract_ngtdm(&grid),
        FeatureGroup::Ngldm => neighbourhood::extract_ngldm(&grid),
        other => Err(FeatureError::Degenerate(format!("{other} is not a texture group"))),
    }
}
