//! FX market data: snapshot readers and CSV staging
//!
//! - **readers**: date/currency filtered reads of the rate and carry snapshots
//! - **staging**: one-off ingestion of vendor spot and forward-point CSVs

pub mod readers;
pub mod staging;

pub use readers::{pivot_wide, read_fx_carry, read_fx_forward, read_fx_spot, Layout, RateQuery};
pub use staging::{exchange_rate_key, exchange_rate_schema, stage_exchange_rates, StagingReport};
