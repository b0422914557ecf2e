use chrono::{Duration, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use fx_feature_store::features::{fx_carry, fx_total_return, ReturnInputs, Tenor};
use fx_feature_store::store::{BatchSchema, ColumnType, Record, RowBatch, SnapshotStore};
use tempfile::TempDir;

const CURRENCIES: [&str; 8] = ["AUD", "CAD", "CHF", "EUR", "GBP", "JPY", "MXN", "NZD"];

fn rate_batch(start: NaiveDate, days: i64) -> RowBatch {
    let schema = BatchSchema::new()
        .with_column("asof_dt", ColumnType::Date)
        .with_column("currency", ColumnType::Utf8)
        .with_column("rate", ColumnType::Float64);
    let mut records = Vec::with_capacity(days as usize * CURRENCIES.len());
    for i in 0..days {
        let date = start + Duration::days(i);
        for (j, code) in CURRENCIES.iter().enumerate() {
            records.push(
                Record::new()
                    .with("asof_dt", date)
                    .with("currency", *code)
                    .with("rate", 1.0 + (i as f64 * 0.001) + j as f64),
            );
        }
    }
    RowBatch::from_records(&schema, records).unwrap()
}

fn key() -> Vec<String> {
    vec!["asof_dt".to_string(), "currency".to_string()]
}

fn benchmark_upsert_overlapping(c: &mut Criterion) {
    let start = NaiveDate::from_ymd_opt(2010, 1, 1).unwrap();
    let history = rate_batch(start, 2500);
    let update = rate_batch(start + Duration::days(2480), 40);

    c.bench_function("upsert_40_days_into_2500", |b| {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rates.parquet");
        let store = SnapshotStore::default();
        store.upsert(&history, &path, &key()).unwrap();

        b.iter(|| {
            store
                .upsert(black_box(&update), &path, &key())
                .unwrap()
        });
    });
}

fn benchmark_first_write(c: &mut Criterion) {
    let batch = rate_batch(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(), 250);

    c.bench_function("first_write_250_days", |b| {
        b.iter(|| {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("rates.parquet");
            SnapshotStore::default()
                .upsert(black_box(&batch), &path, &key())
                .unwrap()
        });
    });
}

fn benchmark_transforms(c: &mut Criterion) {
    let n = 10_000;
    let spot: Vec<f64> = (0..n).map(|i| 17.0 + (i % 100) as f64 * 0.01).collect();
    let forward: Vec<f64> = spot.iter().map(|s| s + 0.25).collect();
    let tenors = vec![90i64; n];
    let carry = fx_carry(&spot, &forward, &tenors).unwrap();

    c.bench_function("fx_carry_10000", |b| {
        b.iter(|| fx_carry(black_box(&spot), black_box(&forward), &tenors).unwrap());
    });

    c.bench_function("fx_total_return_10000", |b| {
        b.iter(|| {
            fx_total_return(
                ReturnInputs {
                    spot_prev: black_box(&spot[..n - 1]),
                    spot: &spot[1..],
                    carry_prev: &carry[..n - 1],
                    carry: &carry[1..],
                },
                1,
                Tenor::ThreeMonth,
            )
            .unwrap()
        });
    });
}

criterion_group!(
    benches,
    benchmark_upsert_overlapping,
    benchmark_first_write,
    benchmark_transforms
);
criterion_main!(benches);
