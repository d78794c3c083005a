mod common;
use common::{synth_db, write_record};

use qrseval::{score_database, Cpsc2019, MatWriter, DEFAULT_TOLERANCE};
use tempfile::TempDir;

#[test]
fn scan_lists_only_complete_pairs() {
    let dir = TempDir::new().unwrap();
    write_record(dir.path(), 1, &[0.1; 100], &[50]);
    write_record(dir.path(), 3, &[0.1; 100], &[50]);
    // Record 2 has a signal but no annotation; it must not be listed.
    let mut w = MatWriter::new();
    w.add_f64("ecg", &[0.1; 100], (100, 1));
    w.write(&dir.path().join("data").join("data_00002.mat")).unwrap();

    let db = Cpsc2019::open(dir.path()).unwrap();
    assert_eq!(db.records(), ["data_00001", "data_00003"]);
    assert_eq!(db.annotations(), ["R_00001", "R_00003"]);
}

#[test]
fn records_json_cache_round_trips() {
    let dir = TempDir::new().unwrap();
    write_record(dir.path(), 7, &[0.1; 100], &[50]);

    let db = Cpsc2019::open(dir.path()).unwrap();
    assert_eq!(db.records(), ["data_00007"]);
    assert!(dir.path().join("records.json").is_file());

    // With the cache in place the data files are no longer rescanned.
    std::fs::remove_dir_all(dir.path().join("data")).unwrap();
    let db2 = Cpsc2019::open(dir.path()).unwrap();
    assert_eq!(db2.records(), db.records());
    assert_eq!(db2.annotations(), db.annotations());
}

#[test]
fn signal_and_annotation_values_round_trip() {
    let dir = TempDir::new().unwrap();
    let ecg: Vec<f64> = (0..200).map(|i| (f64::from(i) * 0.1).sin()).collect();
    let peaks = [40_u16, 120, 180];
    write_record(dir.path(), 1, &ecg, &peaks);

    let db = Cpsc2019::open(dir.path()).unwrap();
    let rec = db.record_name(1).unwrap().to_string();

    let data = db.load_data(&rec).unwrap();
    assert_eq!(data.len(), 200);
    approx::assert_abs_diff_eq!(data[10], 1.0_f64.sin(), epsilon = 1e-12);

    let ann = db.load_ann(&rec).unwrap();
    assert_eq!(ann, vec![40, 120, 180]);
    assert_eq!(db.load_rpeaks(&rec).unwrap(), ann);
}

#[test]
fn record_addressing() {
    let (dir, _truth) = synth_db(2);
    let db = Cpsc2019::open(dir.path()).unwrap();

    assert_eq!(db.record_name(2).unwrap(), "data_00002");
    assert!(db.record_name(0).is_err());
    assert!(db.record_name(3).is_err());

    assert_eq!(db.ann_name("data_00001").unwrap(), "R_00001");
    assert!(db.ann_name("data_99999").is_err());
    assert!(db.load_data("data_99999").is_err());
}

#[test]
fn subject_ids_are_unsupported() {
    let (dir, _truth) = synth_db(1);
    let db = Cpsc2019::open(dir.path()).unwrap();
    let err = db.subject_id("data_00001").unwrap_err();
    assert!(err.to_string().contains("not available"), "{err}");
}

#[test]
fn database_scores_itself_perfectly() {
    let (dir, truth) = synth_db(5);
    let acc = score_database(dir.path(), &truth, DEFAULT_TOLERANCE).unwrap();
    assert_eq!(acc, 1.0);

    // A prediction set with the wrong record count is rejected.
    assert!(score_database(dir.path(), &truth[..4], DEFAULT_TOLERANCE).is_err());
}

#[test]
fn malformed_annotation_file_is_reported() {
    let dir = TempDir::new().unwrap();
    write_record(dir.path(), 1, &[0.1; 100], &[50]);
    std::fs::write(dir.path().join("ref").join("R_00001.mat"), b"junk").unwrap();

    let db = Cpsc2019::open(dir.path()).unwrap();
    let err = db.load_ann("data_00001").unwrap_err();
    assert!(err.to_string().contains("R_00001.mat"), "{err}");
}
