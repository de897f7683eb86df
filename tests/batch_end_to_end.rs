mod common;

use radiobatch::aggregate::ExportFormat;
use radiobatch::batch::BatchExtractor;
use tempfile::tempdir;

use common::{load, scan_id, synthetic_scan, write_catalog, write_scan};

fn dir_names(path: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(path)
        .expect("list")
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

#[test]
fn scan_phase_then_table_phase() {
    let read = tempdir().expect("read");
    let save = tempdir().expect("save");
    let ids: Vec<_> = (0..3).map(|n| scan_id(&format!("P-{n:02}"))).collect();
    for (n, id) in ids.iter().enumerate() {
        write_scan(read.path(), id, &synthetic_scan(n));
    }
    let missing = scan_id("P-99");
    let mut rows: Vec<_> = ids.iter().map(|id| (id, "GTV")).collect();
    rows.push((&missing, "GTV"));
    write_catalog(read.path(), "GTV", &rows);

    let summary = BatchExtractor::new(load("{Morph: true, Stats: true}", ""), read.path(), read.path(), save.path())
        .with_width(2)
        .run()
        .expect("run");
    assert_eq!(summary.scans.completed, 3);
    assert_eq!(summary.scans.failed, 1);
    let tables = summary.tables.expect("tables");
    assert_eq!(tables.completed, 1);
    assert_eq!(tables.failed, 0);

    let names = dir_names(save.path());
    assert!(names.contains(&"batchLog_GTV".to_string()));
    assert!(names.contains(&"batchLog_tables".to_string()));
    assert!(names.contains(&"features(tumour)".to_string()));
    let slot_logs = dir_names(&save.path().join("batchLog_GTV"));
    assert!(!slot_logs.is_empty() && slot_logs.len() <= 2);

    let csv = save.path().join("features(tumour)").join("radiomics__CT(GTV)__original.csv");
    let text = std::fs::read_to_string(csv).expect("table");
    assert_eq!(text.lines().count(), 4);
}

#[test]
fn rerun_with_skip_existing_rotates_logs_and_skips_saved_scans() {
    let read = tempdir().expect("read");
    let save = tempdir().expect("save");
    let ids: Vec<_> = (0..2).map(|n| scan_id(&format!("P-{n:02}"))).collect();
    for (n, id) in ids.iter().enumerate() {
        write_scan(read.path(), id, &synthetic_scan(n));
    }
    let rows: Vec<_> = ids.iter().map(|id| (id, "GTV")).collect();
    write_catalog(read.path(), "GTV", &rows);

    let first = BatchExtractor::new(load("{Morph: true}", ""), read.path(), read.path(), save.path())
        .with_tables(false)
        .run()
        .expect("first run");
    assert_eq!(first.scans.completed, 2);
    assert!(first.tables.is_none());

    let mut loaded = load("{Morph: true}", "");
    loaded.config.skip_existing = true;
    let second = BatchExtractor::new(loaded, read.path(), read.path(), save.path())
        .with_table_format(ExportFormat::Parquet)
        .run()
        .expect("second run");
    assert_eq!(second.scans.skipped, 2);
    assert_eq!(second.scans.completed, 0);
    assert_eq!(second.tables.map(|t| t.completed), Some(1));

    let names = dir_names(save.path());
    assert!(names.iter().any(|n| n.starts_with("batchLog_GTV_")));
    assert!(save
        .path()
        .join("features(tumour)")
        .join("radiomics__CT(GTV)__original.parquet")
        .is_file());
}

#[test]
fn missing_catalog_aborts_the_run() {
    let read = tempdir().expect("read");
    let save = tempdir().expect("save");
    let result = BatchExtractor::new(load("{Morph: true}", ""), read.path(), read.path(), save.path()).run();
    assert!(result.is_err());
}

#[test]
fn corrupt_manifest_does_not_block_other_tables() {
    let read = tempdir().expect("read");
    let save = tempdir().expect("save");
    let ids: Vec<_> = (0..2).map(|n| scan_id(&format!("P-{n:02}"))).collect();
    for (n, id) in ids.iter().enumerate() {
        write_scan(read.path(), id, &synthetic_scan(n));
    }
    let rows: Vec<_> = ids.iter().map(|id| (id, "GTV")).collect();
    write_catalog(read.path(), "GTV", &rows);

    let manifests = save.path().join("features(tumour)").join("manifests");
    std::fs::create_dir_all(&manifests).expect("manifests dir");
    std::fs::write(manifests.join("X-01__MR(GTV).MRscan.json"), "{not json").expect("write");

    let summary = BatchExtractor::new(load("{Morph: true}", ""), read.path(), read.path(), save.path())
        .run()
        .expect("run");
    assert_eq!(summary.scans.completed, 2);
    assert_eq!(summary.tables.map(|t| t.completed), Some(1));
    assert!(save
        .path()
        .join("features(tumour)")
        .join("radiomics__CT(GTV)__original.csv")
        .is_file());
}
