//! Grey level co-occurrence matrix, symmetric and merged over directions.

use crate::features::texture::{DIRECTIONS, LevelGrid};
use crate::features::{FeatureError, FeatureValues};

/// Normalized symmetric co-occurrence probabilities, `ng x ng` row-major.
pub fn matrix(grid: &LevelGrid) -> Result<Vec<f64>, FeatureError> {
    let ng = grid.n_levels;
    let mut p = vec![0.0; ng * ng];
    for (idx, a) in grid.voxels() {
        for d in DIRECTIONS {
            let Some(next) = grid.step(idx, d) else {
                continue;
            };
            let b = grid.level(next);
            if b == 0 {
                continue;
            }
            p[(a - 1) * ng + (b - 1)] += 1.0;
            p[(b - 1) * ng + (a - 1)] += 1.0;
        }
    }
    let total: f64 = p.iter().sum();
    if total == 0.0 {
        return Err(FeatureError::Degenerate("no co-occurring voxel pairs".into()));
    }
    p.iter_mut().for_each(|v| *v /= total);
    Ok(p)
}

fn entropy(probs: impl Iterator<Item = f64>) -> f64 {
    -probs.filter(|p| *p > 0.0).map(|p| p * p.log2()).sum::<f64>()
}

/// Non-zero cells as `(i, j, p)` with one-based grey levels.
fn nonzero(p: &[f64], ng: usize) -> impl Iterator<Item = (f64, f64, f64)> + '_ {
    p.iter()
        .enumerate()
        .filter(|(_, v)| **v > 0.0)
        .map(move |(n, v)| ((n / ng + 1) as f64, (n % ng + 1) as f64, *v))
}

pub fn extract(grid: &LevelGrid) -> Result<FeatureValues, FeatureError> {
    let ng = grid.n_levels;
    let p = matrix(grid)?;
    let cells = || nonzero(&p, ng);

    let mut diff = vec![0.0; ng];
    let mut sum = vec![0.0; 2 * ng + 1];
    let mut mu = 0.0;
    for (i, j, v) in cells() {
        diff[(i - j).abs() as usize] += v;
        sum[(i + j) as usize] += v;
        mu += i * v;
    }

    let diff_avg: f64 = diff.iter().enumerate().map(|(k, v)| k as f64 * v).sum();
    let sum_avg: f64 = sum.iter().enumerate().map(|(k, v)| k as f64 * v).sum();

    let mut out = FeatureValues::new();
    let mut put = |name: &str, value: f64| {
        out.insert(name.to_string(), value);
    };
    put("joint_max", cells().map(|c| c.2).fold(0.0, f64::max));
    put("joint_avg", mu);
    let var: f64 = cells().map(|(i, _, v)| (i - mu).powi(2) * v).sum();
    put("joint_var", var);
    put("joint_entr", entropy(cells().map(|c| c.2)));
    put("diff_avg", diff_avg);
    put(
        "diff_var",
        diff.iter().enumerate().map(|(k, v)| (k as f64 - diff_avg).powi(2) * v).sum(),
    );
    put("diff_entr", entropy(diff.iter().copied()));
    put("sum_avg", sum_avg);
    put(
        "sum_var",
        sum.iter().enumerate().map(|(k, v)| (k as f64 - sum_avg).powi(2) * v).sum(),
    );
    put("sum_entr", entropy(sum.iter().copied()));
    put("energy", cells().map(|c| c.2 * c.2).sum());
    put("contrast", cells().map(|(i, j, v)| (i - j).powi(2) * v).sum());
    put("dissimilarity", cells().map(|(i, j, v)| (i - j).abs() * v).sum());
    put("inv_diff", cells().map(|(i, j, v)| v / (1.0 + (i - j).abs())).sum());
    put("inv_diff_mom", cells().map(|(i, j, v)| v / (1.0 + (i - j).powi(2))).sum());
    put(
        "inv_var",
        cells().filter(|(i, j, _)| i != j).map(|(i, j, v)| v / (i - j).powi(2)).sum(),
    );
    put(
        "corr",
        cells().map(|(i, j, v)| (i - mu) * (j - mu) * v).sum::<f64>() / var,
    );
    put("auto_corr", cells().map(|(i, j, v)| i * j * v).sum());
    for (name, power) in [("clust_tend", 2), ("clust_shade", 3), ("clust_prom", 4)] {
        put(name, cells().map(|(i, j, v)| (i + j - 2.0 * mu).powi(power) * v).sum());
    }
    Ok(out)
}
