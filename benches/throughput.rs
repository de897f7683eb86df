use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use ndarray::Array3;

use radiobatch::config;
use radiobatch::features::{FeatureGroup, texture};
use radiobatch::logging::SlotLog;
use radiobatch::pipeline::{ScanJob, ScanPipeline};
use radiobatch::processing::discretize::{BinSpec, DiscretizationAlgo, discretize};
use radiobatch::processing::{Mask, Volume, roi_extract};
use radiobatch::scan::{FileScanSource, MedicalScan, ScanId};
use radiobatch::store::ResultStore;

fn ball(n: usize) -> (Array3<f64>, Mask) {
    let centre = n as f64 / 2.0;
    let radius = n as f64 / 3.0;
    let inside = Array3::from_shape_fn((n, n, n), |(i, j, k)| {
        let d = [i, j, k].map(|x| x as f64 + 0.5 - centre);
        (d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt() <= radius
    });
    let data = Array3::from_shape_fn((n, n, n), |(i, j, k)| ((i * 31 + j * 17 + k * 7) % 97) as f64);
    let mask = Mask::new(inside, [1.0; 3]);
    (roi_extract(&Volume::new(data, [1.0; 3]), &mask), mask)
}

fn bench_texture(c: &mut Criterion) {
    let mut group = c.benchmark_group("texture");
    for n in [16usize, 32] {
        let (intensities, mask) = ball(n);
        let spec = BinSpec {
            algo: DiscretizationAlgo::FBN,
            val: 32.0,
        };
        group.bench_with_input(BenchmarkId::new("discretize", n), &n, |b, _| {
            b.iter(|| discretize(&intensities, spec, None).expect("discretize"));
        });
        let q = discretize(&intensities, spec, None).expect("discretize");
        for feature_group in [FeatureGroup::Glcm, FeatureGroup::Glszm] {
            group.bench_with_input(BenchmarkId::new(feature_group.key(), n), &n, |b, _| {
                b.iter(|| texture::extract(feature_group, &q, &mask).expect("texture"));
            });
        }
    }
    group.finish();
}

fn bench_scan_pipeline(c: &mut Criterion) {
    let temp_dir = tempfile::tempdir().expect("tempdir");
    let read = temp_dir.path().join("scans");
    let id = ScanId::new("bench", "CT", "CTscan");
    let data = Array3::from_shape_fn((24, 24, 24), |(i, j, k)| ((i * 13 + j * 5 + k * 3) % 200) as f32 - 100.0);
    let roi = Array3::from_shape_fn((24, 24, 24), |(i, j, k)| {
        u8::from((6..18).contains(&i) && (6..18).contains(&j) && (6..18).contains(&k))
    });
    let source = FileScanSource::new(&read);
    MedicalScan::new([1.0; 3], data)
        .with_roi("GTV", roi)
        .save(&source.path_for(&id))
        .expect("save scan");

    let loaded = config::load_config(None).expect("config");
    let job = ScanJob {
        scan_id: id,
        roi_name: "GTV".to_string(),
        roi_type: "tumour".to_string(),
        roi_type_label: "GTV".to_string(),
        config: Arc::new(loaded.config),
    };
    let pipeline = ScanPipeline::new(
        &loaded.config_hash,
        Arc::new(source),
        ResultStore::new(&temp_dir.path().join("save")),
    );
    let log = SlotLog::detached(0);
    c.bench_function("scan_pipeline_default_config", |b| {
        b.iter(|| pipeline.process(&job, &log).expect("process"));
    });
}

criterion_group!(benches, bench_texture, bench_scan_pipeline);
criterion_main!(benches);
