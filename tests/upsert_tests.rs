//! Integration tests for the keyed snapshot upsert
//!
//! Exercises merge semantics, schema policy and failure safety against real
//! Parquet files in temporary directories.

use chrono::NaiveDate;
use fx_feature_store::config::StoreSettings;
use fx_feature_store::error::FeatureStoreError;
use fx_feature_store::store::{
    upsert, BatchSchema, ColumnType, Record, RowBatch, SnapshotStore, Value,
};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn rate_schema() -> BatchSchema {
    BatchSchema::new()
        .with_column("date", ColumnType::Date)
        .with_column("id", ColumnType::Utf8)
        .with_column("value", ColumnType::Float64)
}

fn rate_batch(rows: &[(NaiveDate, &str, f64)]) -> RowBatch {
    let records = rows
        .iter()
        .map(|(d, id, v)| Record::new().with("date", *d).with("id", *id).with("value", *v))
        .collect();
    RowBatch::from_records(&rate_schema(), records).unwrap()
}

fn rate_key() -> Vec<String> {
    vec!["date".to_string(), "id".to_string()]
}

fn id_batch(rows: &[(i64, f64)]) -> RowBatch {
    let schema = BatchSchema::new()
        .with_column("id", ColumnType::Int64)
        .with_column("value", ColumnType::Float64);
    let records = rows
        .iter()
        .map(|(id, v)| Record::new().with("id", *id).with("value", *v))
        .collect();
    RowBatch::from_records(&schema, records).unwrap()
}

fn id_key() -> Vec<String> {
    vec!["id".to_string()]
}

/// Snapshot rows sorted by date then id
fn read_rates(path: &Path) -> Vec<(NaiveDate, String, f64)> {
    let batch = SnapshotStore::default().read(path).unwrap();
    let mut rows: Vec<_> = batch
        .date_values("date")
        .unwrap()
        .into_iter()
        .zip(batch.str_values("id").unwrap())
        .zip(batch.f64_values("value").unwrap())
        .map(|((d, id), v)| (d.unwrap(), id.unwrap(), v.unwrap()))
        .collect();
    rows.sort_by(|a, b| (a.0, &a.1).cmp(&(b.0, &b.1)));
    rows
}

/// Snapshot rows sorted by id
fn read_ids(path: &Path) -> Vec<(i64, Option<f64>)> {
    let batch = SnapshotStore::default().read(path).unwrap();
    let mut rows: Vec<_> = batch
        .i64_values("id")
        .unwrap()
        .into_iter()
        .zip(batch.f64_values("value").unwrap())
        .map(|(id, v)| (id.unwrap(), v))
        .collect();
    rows.sort_by_key(|(id, _)| *id);
    rows
}

#[test]
fn test_eur_rates_scenario() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("eur.parquet");

    upsert(
        &rate_batch(&[
            (date(2024, 1, 1), "EUR", 1.10),
            (date(2024, 1, 2), "EUR", 1.11),
        ]),
        &path,
        &rate_key(),
    )
    .unwrap();

    let summary = upsert(
        &rate_batch(&[
            (date(2024, 1, 2), "EUR", 1.12),
            (date(2024, 1, 3), "EUR", 1.13),
        ]),
        &path,
        &rate_key(),
    )
    .unwrap();

    assert_eq!(
        read_rates(&path),
        vec![
            (date(2024, 1, 1), "EUR".to_string(), 1.10),
            (date(2024, 1, 2), "EUR".to_string(), 1.12),
            (date(2024, 1, 3), "EUR".to_string(), 1.13),
        ]
    );
    assert_eq!(summary.rows_replaced, 1);
    assert_eq!(summary.rows_inserted, 1);
    assert_eq!(summary.rows_retained, 1);
}

#[test]
fn test_upsert_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("values.parquet");
    upsert(&id_batch(&[(1, 1.0), (2, 2.0)]), &path, &id_key()).unwrap();

    let batch = id_batch(&[(2, 20.0), (3, 30.0)]);
    upsert(&batch, &path, &id_key()).unwrap();
    let once = read_ids(&path);
    upsert(&batch, &path, &id_key()).unwrap();
    let twice = read_ids(&path);

    assert_eq!(once, twice);
    assert_eq!(twice.len(), 3);
}

#[test]
fn test_partial_update_keeps_other_rows() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("values.parquet");
    upsert(&id_batch(&[(1, 1.0), (2, 2.0)]), &path, &id_key()).unwrap();

    upsert(&id_batch(&[(2, 2.5)]), &path, &id_key()).unwrap();

    assert_eq!(read_ids(&path), vec![(1, Some(1.0)), (2, Some(2.5))]);
}

#[test]
fn test_in_batch_duplicates_keep_last() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("values.parquet");

    let summary = upsert(&id_batch(&[(5, 1.0), (4, 0.0), (5, 2.0)]), &path, &id_key()).unwrap();

    assert_eq!(summary.duplicates_dropped, 1);
    assert_eq!(read_ids(&path), vec![(4, Some(0.0)), (5, Some(2.0))]);
}

#[test]
fn test_first_write_contains_deduplicated_batch() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("deep").join("dir").join("values.parquet");

    let summary = upsert(&id_batch(&[(1, 1.0), (1, 1.5), (2, 2.0)]), &path, &id_key()).unwrap();

    assert!(summary.created);
    assert_eq!(summary.rows_written, 2);
    assert_eq!(read_ids(&path), vec![(1, Some(1.5)), (2, Some(2.0))]);
}

#[test]
fn test_missing_key_column_leaves_snapshot_unmodified() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("values.parquet");
    upsert(&id_batch(&[(1, 1.0)]), &path, &id_key()).unwrap();
    let before = fs::read(&path).unwrap();

    let err = upsert(&id_batch(&[(2, 2.0)]), &path, &["x".to_string()]).unwrap_err();

    match err {
        FeatureStoreError::SchemaMismatch { columns, .. } => {
            assert_eq!(columns, vec!["x".to_string()])
        }
        other => panic!("expected SchemaMismatch, got {:?}", other),
    }
    assert_eq!(fs::read(&path).unwrap(), before);
}

#[test]
fn test_empty_key_list_rejected_before_storage() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("values.parquet");

    let err = upsert(&id_batch(&[(1, 1.0)]), &path, &[]).unwrap_err();

    assert!(matches!(err, FeatureStoreError::InvalidArgument(_)));
    assert!(!path.exists());
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_empty_batch_is_noop() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("values.parquet");
    let empty = RowBatch::empty(&rate_schema()).unwrap();

    let summary = upsert(&empty, &path, &rate_key()).unwrap();
    assert!(summary.is_noop());
    assert!(!path.exists());

    upsert(&rate_batch(&[(date(2024, 1, 1), "EUR", 1.1)]), &path, &rate_key()).unwrap();
    let before = fs::read(&path).unwrap();
    let summary = upsert(&empty, &path, &rate_key()).unwrap();
    assert!(summary.is_noop());
    assert_eq!(fs::read(&path).unwrap(), before);
}

#[test]
fn test_empty_batch_still_validates_keys() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("values.parquet");
    let empty = RowBatch::empty(&rate_schema()).unwrap();

    let err = upsert(&empty, &path, &["missing".to_string()]).unwrap_err();
    assert!(matches!(err, FeatureStoreError::SchemaMismatch { .. }));
}

#[test]
fn test_new_columns_are_null_filled() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("values.parquet");
    upsert(&id_batch(&[(1, 1.0), (2, 2.0)]), &path, &id_key()).unwrap();

    let wider = BatchSchema::new()
        .with_column("id", ColumnType::Int64)
        .with_column("source", ColumnType::Utf8);
    let batch = RowBatch::from_records(
        &wider,
        vec![Record::new().with("id", 2i64).with("source", "vendor")],
    )
    .unwrap();
    upsert(&batch, &path, &id_key()).unwrap();

    let snapshot = SnapshotStore::default().read(&path).unwrap();
    let mut names = snapshot.column_names();
    names.sort();
    assert_eq!(names, vec!["id", "source", "value"]);

    // id=2 came from the narrower batch, so its value is null now
    assert_eq!(read_ids(&path), vec![(1, Some(1.0)), (2, None)]);
    let sources: Vec<(i64, Option<String>)> = {
        let mut rows: Vec<_> = snapshot
            .i64_values("id")
            .unwrap()
            .into_iter()
            .zip(snapshot.str_values("source").unwrap())
            .map(|(id, s)| (id.unwrap(), s))
            .collect();
        rows.sort_by_key(|(id, _)| *id);
        rows
    };
    assert_eq!(sources, vec![(1, None), (2, Some("vendor".to_string()))]);
}

#[test]
fn test_dtype_conflict_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("values.parquet");
    upsert(&id_batch(&[(1, 1.0)]), &path, &id_key()).unwrap();
    let before = fs::read(&path).unwrap();

    let schema = BatchSchema::new()
        .with_column("id", ColumnType::Int64)
        .with_column("value", ColumnType::Utf8);
    let batch = RowBatch::from_records(
        &schema,
        vec![Record::new().with("id", 1i64).with("value", "1.0")],
    )
    .unwrap();

    let err = upsert(&batch, &path, &id_key()).unwrap_err();
    match err {
        FeatureStoreError::SchemaMismatch { columns, .. } => {
            assert_eq!(columns.len(), 1);
            assert!(columns[0].starts_with("value"));
        }
        other => panic!("expected SchemaMismatch, got {:?}", other),
    }
    assert_eq!(fs::read(&path).unwrap(), before);
}

#[test]
fn test_corrupt_snapshot_is_storage_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("values.parquet");
    fs::write(&path, b"definitely not parquet").unwrap();

    let err = upsert(&id_batch(&[(1, 1.0)]), &path, &id_key()).unwrap_err();

    assert!(err.is_storage(), "expected StorageError, got {:?}", err);
    assert_eq!(fs::read(&path).unwrap(), b"definitely not parquet");
    assert!(SnapshotStore::default().read(&path).unwrap_err().is_storage());
}

#[test]
fn test_reading_missing_snapshot_is_storage_error() {
    let dir = TempDir::new().unwrap();
    let store = SnapshotStore::default();
    let path = dir.path().join("absent.parquet");

    assert!(!store.exists(&path));
    assert!(store.read(&path).unwrap_err().is_storage());
    assert!(store.row_count(&path).unwrap_err().is_storage());
}

#[test]
fn test_schema_and_row_count() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("eur.parquet");
    let store = SnapshotStore::default();
    store
        .upsert(
            &rate_batch(&[(date(2024, 1, 1), "EUR", 1.1), (date(2024, 1, 1), "GBP", 0.8)]),
            &path,
            &rate_key(),
        )
        .unwrap();

    assert_eq!(store.row_count(&path).unwrap(), 2);
    let schema = store.schema(&path).unwrap();
    let names: Vec<String> = schema.iter().map(|(n, _)| n.to_string()).collect();
    assert_eq!(names, vec!["date", "id", "value"]);

    let first = store.read(&path).unwrap();
    let row: Vec<Value> = ["date", "id", "value"]
        .iter()
        .map(|c| first.value(0, c).unwrap())
        .collect();
    assert_eq!(row[0], Value::Date(date(2024, 1, 1)));
}

#[test]
fn test_overlapping_upsert_row_count_from_footer() {
    let dir = TempDir::new().unwrap();
    let settings = [
        StoreSettings::default(),
        StoreSettings {
            streaming: false,
            ..StoreSettings::default()
        },
    ];

    for (i, settings) in settings.into_iter().enumerate() {
        let store = SnapshotStore::new(settings);
        let path = dir.path().join(format!("rates_{}.parquet", i));
        let history: Vec<(NaiveDate, &str, f64)> = (1..=20)
            .flat_map(|d| {
                [(date(2024, 1, d), "EUR", 1.0 + d as f64 / 100.0), (date(2024, 1, d), "GBP", 0.8)]
            })
            .collect();
        store.upsert(&rate_batch(&history), &path, &rate_key()).unwrap();

        let summary = store
            .upsert(
                &rate_batch(&[
                    (date(2024, 1, 20), "EUR", 1.5),
                    (date(2024, 1, 21), "EUR", 1.6),
                ]),
                &path,
                &rate_key(),
            )
            .unwrap();

        assert_eq!(summary.rows_retained, 39, "settings #{}", i);
        assert_eq!(summary.rows_replaced, 1, "settings #{}", i);
        assert_eq!(store.row_count(&path).unwrap(), 41, "settings #{}", i);
        assert_eq!(summary.rows_written, 41, "settings #{}", i);
        assert!(read_rates(&path).contains(&(date(2024, 1, 20), "EUR".to_string(), 1.5)));
    }
}
