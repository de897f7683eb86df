mod common;

use std::fs::File;
use std::sync::Arc;

use parquet::file::reader::{FileReader, SerializedFileReader};
use radiobatch::aggregate::{self, AggregateError, ExportFormat, TableTask};
use radiobatch::logging::SlotLog;
use radiobatch::record::{FeatureRecord, GroupOutcome};
use radiobatch::store::ResultStore;
use tempfile::tempdir;

use common::{job, load, pipeline, scan_id, synthetic_scan, write_scan};

fn count_rows(path: &std::path::Path) -> usize {
    let file = File::open(path).expect("open parquet");
    let reader = SerializedFileReader::new(file).expect("parquet reader");
    reader.get_row_iter(None).expect("row iter").count()
}

fn column_names(path: &std::path::Path) -> Vec<String> {
    let file = File::open(path).expect("open parquet");
    let reader = SerializedFileReader::new(file).expect("parquet reader");
    reader
        .metadata()
        .file_metadata()
        .schema_descr()
        .root_schema()
        .get_fields()
        .iter()
        .map(|f| f.name().to_string())
        .collect()
}

fn extract_five(read: &std::path::Path, save: &std::path::Path) {
    let loaded = load("{Morph: true, Stats: true}", "");
    let config = Arc::new(loaded.config.clone());
    let pipeline = pipeline(&loaded, read, save);
    for n in 0..5 {
        let id = scan_id(&format!("P-{n:02}"));
        write_scan(read, &id, &synthetic_scan(n));
        pipeline
            .process(&job(&config, &id, "GTV"), &SlotLog::detached(0))
            .expect("process");
    }
}

#[test]
fn five_records_make_one_table_with_five_rows() {
    let read = tempdir().expect("read");
    let save = tempdir().expect("save");
    extract_five(read.path(), save.path());

    let store = ResultStore::new(save.path());
    let groups = aggregate::discover_tables(&store, "tumour", "GTV").expect("discover");
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].tag.table_name(), "radiomics__CT(GTV)__original");
    assert_eq!(groups[0].members.len(), 5);

    let written = TableTask::new(store.clone(), groups[0].clone(), ExportFormat::Csv)
        .build()
        .expect("build");
    let csv_path = &written[1];
    assert!(csv_path.ends_with("radiomics__CT(GTV)__original.csv"));
    let text = std::fs::read_to_string(csv_path).expect("read csv");
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 6);
    assert!(lines[0].starts_with("scan_id,morph__"));
    assert!(lines[0].contains("stats__mean"));
    assert!(lines[1].starts_with("P-00__CT.CTscan,"));
    assert!(lines[5].starts_with("P-04__CT.CTscan,"));

    let structured: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&written[0]).expect("read json")).expect("json");
    assert_eq!(structured["scans"].as_object().map(|m| m.len()), Some(5));
    assert_eq!(
        structured["scans"]["P-00__CT.CTscan"]["glcm_scale1_algoFBN_bin8"]["status"],
        "disabled"
    );
}

#[test]
fn parquet_tables_carry_scan_id_and_feature_columns() {
    let read = tempdir().expect("read");
    let save = tempdir().expect("save");
    extract_five(read.path(), save.path());

    let store = ResultStore::new(save.path());
    let group = aggregate::discover_tables(&store, "tumour", "GTV")
        .expect("discover")
        .remove(0);
    let written = TableTask::new(store, group, ExportFormat::Parquet)
        .build()
        .expect("build");
    let path = &written[1];
    assert_eq!(count_rows(path), 5);
    let columns = column_names(path);
    assert_eq!(columns[0], "scan_id");
    assert!(columns.iter().any(|c| c == "morph__vol_approx"));
}

#[test]
fn heterogeneous_feature_spaces_fail_the_table() {
    let save = tempdir().expect("save");
    let store = ResultStore::new(save.path());

    let mut first = FeatureRecord::new(scan_id("P-01"), "GTV", "tumour", "GTV", "hash");
    first
        .space_mut("original")
        .insert("morph".into(), GroupOutcome::Disabled);
    let mut second = FeatureRecord::new(scan_id("P-02"), "GTV", "tumour", "GTV", "hash");
    second
        .space_mut("original")
        .insert("morph".into(), GroupOutcome::Disabled);
    second
        .space_mut("mean3")
        .insert("morph".into(), GroupOutcome::Disabled);
    store.save(&first).expect("save first");
    store.save(&second).expect("save second");

    let groups = aggregate::discover_tables(&store, "tumour", "GTV").expect("discover");
    assert_eq!(groups.len(), 1);
    let err = TableTask::new(store, groups[0].clone(), ExportFormat::Csv)
        .build()
        .expect_err("heterogeneous");
    assert!(matches!(err, AggregateError::Heterogeneous { .. }));
}

#[test]
fn other_labels_are_not_aggregated() {
    let save = tempdir().expect("save");
    let store = ResultStore::new(save.path());
    let mut record = FeatureRecord::new(scan_id("P-01"), "LN", "tumour", "LN", "hash");
    record.space_mut("original");
    store.save(&record).expect("save");
    assert!(aggregate::discover_tables(&store, "tumour", "GTV")
        .expect("discover")
        .is_empty());
}
