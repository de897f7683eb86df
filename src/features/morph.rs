//! Morphological features of the ROI, measured on the voxel surface.

use std::f64::consts::PI;

use ndarray::Zip;

use crate::features::{FeatureError, FeatureValues};
use crate::processing::{Mask, Volume};

const FACE_OFFSETS: [[isize; 3]; 6] = [
    [-1, 0, 0],
    [1, 0, 0],
    [0, -1, 0],
    [0, 1, 0],
    [0, 0, -1],
    [0, 0, 1],
];

fn inside(mask: &Mask, idx: [isize; 3]) -> bool {
    let (d0, d1, d2) = mask.dim();
    if idx.iter().any(|v| *v < 0) {
        return false;
    }
    let (i, j, k) = (idx[0] as usize, idx[1] as usize, idx[2] as usize);
    i < d0 && j < d1 && k < d2 && mask.data[[i, j, k]]
}

/// Exposed face area (mm^2) and the centres (mm) of voxels owning a face.
fn surface(mask: &Mask) -> (f64, Vec<[f64; 3]>) {
    let s = mask.spacing;
    let face_area = [s[1] * s[2], s[0] * s[2], s[0] * s[1]];
    let mut area = 0.0;
    let mut boundary = Vec::new();
    for ((i, j, k), &set) in mask.data.indexed_iter() {
        if !set {
            continue;
        }
        let here = [i as isize, j as isize, k as isize];
        let mut exposed = false;
        for (n, offset) in FACE_OFFSETS.iter().enumerate() {
            let next = [here[0] + offset[0], here[1] + offset[1], here[2] + offset[2]];
            if !inside(mask, next) {
                area += face_area[n / 2];
                exposed = true;
            }
        }
        if exposed {
            boundary.push([i as f64 * s[0], j as f64 * s[1], k as f64 * s[2]]);
        }
    }
    (area, boundary)
}

fn max_diameter(points: &[[f64; 3]]) -> f64 {
    let mut best = 0.0f64;
    for (n, a) in points.iter().enumerate() {
        for b in &points[n + 1..] {
            let d = (0..3).map(|ax| (a[ax] - b[ax]).powi(2)).sum::<f64>();
            best = best.max(d);
        }
    }
    best.sqrt()
}

fn bounding_extent(mask: &Mask) -> [f64; 3] {
    let mut lo = [usize::MAX; 3];
    let mut hi = [0usize; 3];
    for ((i, j, k), &set) in mask.data.indexed_iter() {
        if set {
            for (axis, v) in [i, j, k].into_iter().enumerate() {
                lo[axis] = lo[axis].min(v);
                hi[axis] = hi[axis].max(v);
            }
        }
    }
    let mut extent = [0.0; 3];
    for axis in 0..3 {
        extent[axis] = (hi[axis] - lo[axis] + 1) as f64 * mask.spacing[axis];
    }
    extent
}

/// Distance (mm) between the geometric centre of the morphological mask and
/// the intensity-weighted centre of the intensity mask.
fn centre_of_mass_shift(volume: &Volume, mask_int: &Mask, mask_morph: &Mask) -> f64 {
    let s = mask_morph.spacing;
    let mut geo = [0.0; 3];
    let mut n = 0.0;
    for ((i, j, k), &set) in mask_morph.data.indexed_iter() {
        if set {
            geo[0] += i as f64 * s[0];
            geo[1] += j as f64 * s[1];
            geo[2] += k as f64 * s[2];
            n += 1.0;
        }
    }

    let mut weighted = [0.0; 3];
    let mut total = 0.0;
    Zip::indexed(&volume.data)
        .and(&mask_int.data)
        .for_each(|(i, j, k), &v, &set| {
            if set && v.is_finite() {
                weighted[0] += v * i as f64 * s[0];
                weighted[1] += v * j as f64 * s[1];
                weighted[2] += v * k as f64 * s[2];
                total += v;
            }
        });
    if total == 0.0 || n == 0.0 {
        return f64::NAN;
    }
    (0..3)
        .map(|ax| (geo[ax] / n - weighted[ax] / total).powi(2))
        .sum::<f64>()
        .sqrt()
}

pub fn extract_all(volume: &Volume, mask_int: &Mask, mask_morph: &Mask) -> Result<FeatureValues, FeatureError> {
    let n_voxels = mask_morph.count();
    if n_voxels == 0 {
        return Err(FeatureError::EmptyRoi);
    }
    let vol = n_voxels as f64 * mask_morph.voxel_volume();
    let (area, boundary) = surface(mask_morph);
    let sphere = (36.0 * PI * vol * vol).cbrt();
    let extent = bounding_extent(mask_morph);

    let mut out = FeatureValues::new();
    out.insert("vol_approx".into(), vol);
    out.insert("area_mesh".into(), area);
    out.insert("av".into(), area / vol);
    out.insert("comp2".into(), 36.0 * PI * vol * vol / area.powi(3));
    out.insert("sph_dispr".into(), area / sphere);
    out.insert("sphericity".into(), sphere / area);
    out.insert("asphericity".into(), area / sphere - 1.0);
    out.insert("com".into(), centre_of_mass_shift(volume, mask_int, mask_morph));
    out.insert("diam".into(), max_diameter(&boundary));
    out.insert("vol_dens_aabb".into(), vol / extent.iter().product::<f64>());
    out.insert("area_dens_aabb".into(), {
        let [a, b, c] = extent;
        area / (2.0 * (a * b + a * c + b * c))
    });
    Ok(out)
}
