//! Feature jobs: read rates, apply a transform, upsert the result
//!
//! Every job takes its snapshot locations explicitly; nothing here knows where
//! data lives on disk. Rows that cannot be computed (no matching spot, no
//! lagged observation, non-finite result) are dropped and counted, never
//! filled.

pub mod carry;
pub mod returns;

pub use carry::{carry_key, fx_carry_to_snapshot, CarryParams};
pub use returns::{fx_returns_to_snapshot, return_key, ReturnParams};

use crate::error::Result;
use crate::store::batch::days_from_date;
use crate::store::UpsertSummary;
use chrono::NaiveDate;
use polars::prelude::*;

/// What a job computed and what it did to the output snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobReport {
    pub rows_computed: usize,
    pub rows_dropped: usize,
    pub summary: UpsertSummary,
}

pub(crate) fn date_series(name: &str, dates: &[NaiveDate]) -> Result<Series> {
    let days: Vec<i32> = dates.iter().map(|d| days_from_date(*d)).collect();
    Ok(Series::new(name, days).cast(&DataType::Date)?)
}

/// Currency filters are matched against upper-case codes in the snapshots
pub(crate) fn normalize_currencies(codes: &Option<Vec<String>>) -> Option<Vec<String>> {
    codes
        .as_ref()
        .map(|codes| codes.iter().map(|c| c.trim().to_uppercase()).collect())
}
