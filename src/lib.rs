//! # fx_feature_store
//!
//! FX spot/forward rates, carry and total returns persisted into keyed Parquet
//! snapshots that are maintained by incremental upserts.
//!
//! The store replaces rows whose key appears in a new batch, keeps every other
//! row, and swaps the new image in atomically, so feature jobs can be re-run
//! over overlapping date ranges without duplicating or losing data.
//!
//! ## Example
//!
//! ```rust,no_run
//! use fx_feature_store::prelude::*;
//! use std::path::Path;
//!
//! let store = SnapshotStore::default();
//! let report = fx_carry_to_snapshot(
//!     &store,
//!     Path::new("data/raw/fx/daily/exchange_rate.parquet"),
//!     Path::new("data/features/fx/daily/fx_carry.parquet"),
//!     &CarryParams::default(),
//! )
//! .unwrap();
//! println!("{} carry rows saved", report.rows_computed);
//! ```

pub mod calendar;
pub mod config;
pub mod data;
pub mod error;
pub mod features;
pub mod pipeline;
pub mod store;
pub mod types;

pub mod prelude {
    //! Commonly used types and functions
    pub use crate::config::{FeatureStoreConfig, SnapshotCompression, StoreSettings};
    pub use crate::data::{read_fx_carry, read_fx_forward, read_fx_spot, Layout, RateQuery};
    pub use crate::error::{FeatureStoreError, Result};
    pub use crate::features::Tenor;
    pub use crate::pipeline::{
        fx_carry_to_snapshot, fx_returns_to_snapshot, CarryParams, JobReport, ReturnParams,
    };
    pub use crate::store::{
        upsert, BatchSchema, ColumnType, Record, RowBatch, SnapshotStore, UpsertSummary, Value,
    };
    pub use crate::types::*;
}
