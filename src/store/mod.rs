//! Keyed columnar upsert store
//!
//! # Components
//!
//! - **batch**: Row batches, explicit schemas and typed record values
//! - **snapshot**: Parquet snapshots and the merge-on-key upsert
//!
//! # Example
//!
//! ```rust,no_run
//! use fx_feature_store::store::{upsert, BatchSchema, ColumnType, Record, RowBatch};
//! use chrono::NaiveDate;
//! use std::path::Path;
//!
//! let schema = BatchSchema::new()
//!     .with_column("asof_dt", ColumnType::Date)
//!     .with_column("currency", ColumnType::Utf8)
//!     .with_column("value", ColumnType::Float64);
//!
//! let batch = RowBatch::from_records(
//!     &schema,
//!     vec![Record::new()
//!         .with("asof_dt", NaiveDate::from_ymd_opt(2024, 1, 2).unwrap())
//!         .with("currency", "EUR")
//!         .with("value", 1.12)],
//! )
//! .unwrap();
//!
//! let keys = vec!["asof_dt".to_string(), "currency".to_string()];
//! let summary = upsert(&batch, Path::new("data/eur.parquet"), &keys).unwrap();
//! println!("{} rows in snapshot", summary.rows_written);
//! ```

pub mod batch;
pub mod snapshot;

pub use batch::{BatchSchema, ColumnType, Record, RowBatch, Value};
pub use snapshot::{upsert, SnapshotStore, UpsertSummary};
