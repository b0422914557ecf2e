//! Date-range and currency filtered readers over the FX snapshots
//!
//! Readers push their filters down into the Parquet scan and return a
//! [`RowBatch`] in either long layout (one row per date/currency/value) or
//! wide layout (one row per date, one column per currency).

use crate::error::{FeatureStoreError, Result};
use crate::store::batch::days_from_date;
use crate::store::{RowBatch, SnapshotStore};
use crate::types::{columns, AsOfDate, TenorDays};
use chrono::NaiveDate;
use hashbrown::HashMap;
use polars::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Shape of a reader result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Layout {
    /// `asof_dt, currency, <value>`
    #[default]
    Long,
    /// `asof_dt, <code>...` with dates ascending and codes sorted
    Wide,
}

/// Filters shared by every reader
///
/// Bounds are inclusive; `None` means the full available range. `currencies`
/// of `None` selects every code present in the snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateQuery {
    pub start: Option<AsOfDate>,
    pub end: Option<AsOfDate>,
    pub currencies: Option<Vec<String>>,
    pub layout: Layout,
}

impl RateQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn between(mut self, start: Option<AsOfDate>, end: Option<AsOfDate>) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    pub fn with_currencies<S: AsRef<str>>(mut self, codes: &[S]) -> Self {
        self.currencies = Some(codes.iter().map(|c| c.as_ref().to_uppercase()).collect());
        self
    }

    pub fn wide(mut self) -> Self {
        self.layout = Layout::Wide;
        self
    }

    fn apply(&self, frame: LazyFrame) -> Result<LazyFrame> {
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if start > end {
                return Err(FeatureStoreError::InvalidArgument(format!(
                    "start date {} is after end date {}",
                    start, end
                )));
            }
        }

        let mut frame = frame;
        if let Some(start) = self.start {
            frame = frame.filter(col(columns::ASOF_DT).gt_eq(lit(start)));
        }
        if let Some(end) = self.end {
            frame = frame.filter(col(columns::ASOF_DT).lt_eq(lit(end)));
        }
        if let Some(codes) = &self.currencies {
            let codes = Series::new(columns::CURRENCY, codes.clone());
            frame = frame.filter(col(columns::CURRENCY).is_in(lit(codes)));
        }
        Ok(frame)
    }
}

fn value_column(unit_per_usd: bool) -> &'static str {
    if unit_per_usd {
        columns::UNIT_PER_USD
    } else {
        columns::RATE
    }
}

fn collect(frame: LazyFrame, location: &Path) -> Result<RowBatch> {
    let frame = frame
        .collect()
        .map_err(|e| FeatureStoreError::storage(location, e))?;
    RowBatch::from_frame(frame)
}

fn shape(batch: RowBatch, layout: Layout, value: &str) -> Result<RowBatch> {
    match layout {
        Layout::Long => Ok(batch),
        Layout::Wide => pivot_wide(&batch, value),
    }
}

/// Daily spot rates: `asof_dt, currency, spot`
///
/// `unit_per_usd` selects units-per-USD quotes instead of market convention.
pub fn read_fx_spot(
    store: &SnapshotStore,
    location: &Path,
    query: &RateQuery,
    unit_per_usd: bool,
) -> Result<RowBatch> {
    let frame = query
        .apply(store.scan(location)?)?
        .filter(col(columns::TENOR_DAYS).eq(lit(0i64)))
        .select([
            col(columns::ASOF_DT),
            col(columns::CURRENCY),
            col(value_column(unit_per_usd)).alias(columns::SPOT),
        ]);
    shape(collect(frame, location)?, query.layout, columns::SPOT)
}

/// Daily forward rates: `asof_dt, currency, tenor_days, forward`
///
/// `tenor_days` of `None` returns every forward tenor (spot rows excluded).
/// The wide layout drops `tenor_days`, so it needs a single tenor.
pub fn read_fx_forward(
    store: &SnapshotStore,
    location: &Path,
    query: &RateQuery,
    tenor_days: Option<&[TenorDays]>,
    unit_per_usd: bool,
) -> Result<RowBatch> {
    let tenor_filter = match tenor_days {
        Some(tenors) => {
            col(columns::TENOR_DAYS).is_in(lit(Series::new(columns::TENOR_DAYS, tenors.to_vec())))
        }
        None => col(columns::TENOR_DAYS).gt(lit(0i64)),
    };
    let frame = query
        .apply(store.scan(location)?)?
        .filter(tenor_filter)
        .select([
            col(columns::ASOF_DT),
            col(columns::CURRENCY),
            col(columns::TENOR_DAYS),
            col(value_column(unit_per_usd)).alias(columns::FORWARD),
        ]);
    shape(collect(frame, location)?, query.layout, columns::FORWARD)
}

/// Daily carry for one tenor: `asof_dt, currency, carry`
pub fn read_fx_carry(
    store: &SnapshotStore,
    location: &Path,
    query: &RateQuery,
    tenor_days: TenorDays,
) -> Result<RowBatch> {
    let frame = query
        .apply(store.scan(location)?)?
        .filter(col(columns::TENOR_DAYS).eq(lit(tenor_days)))
        .select([
            col(columns::ASOF_DT),
            col(columns::CURRENCY),
            col(columns::CARRY),
        ]);
    shape(collect(frame, location)?, query.layout, columns::CARRY)
}

/// Pivot a long batch so currency codes become columns of `value`
///
/// Fails with `DataError` if a date/currency pair appears more than once.
pub fn pivot_wide(batch: &RowBatch, value: &str) -> Result<RowBatch> {
    let dates = batch.date_values(columns::ASOF_DT)?;
    let codes = batch.str_values(columns::CURRENCY)?;
    let values = batch.f64_values(value)?;

    let mut by_date: BTreeMap<NaiveDate, HashMap<String, Option<f64>>> = BTreeMap::new();
    let mut all_codes = BTreeSet::new();
    for ((date, code), v) in dates.into_iter().zip(codes).zip(values) {
        let (date, code) = match (date, code) {
            (Some(d), Some(c)) => (d, c),
            _ => {
                return Err(FeatureStoreError::DataError(
                    "cannot pivot rows with a null date or currency".to_string(),
                ))
            }
        };
        let row = by_date.entry(date).or_default();
        if row.insert(code.clone(), v).is_some() {
            return Err(FeatureStoreError::DataError(format!(
                "duplicate {} for {} on {}",
                value, code, date
            )));
        }
        all_codes.insert(code);
    }

    let date_days: Vec<i32> = by_date.keys().map(|d| days_from_date(*d)).collect();
    let mut series = vec![Series::new(columns::ASOF_DT, date_days).cast(&DataType::Date)?];
    for code in &all_codes {
        let column: Vec<Option<f64>> = by_date
            .values()
            .map(|row| row.get(code).copied().flatten())
            .collect();
        series.push(Series::new(code, column));
    }

    RowBatch::from_frame(DataFrame::new(series)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{BatchSchema, ColumnType, Record};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn long_batch(rows: &[(NaiveDate, &str, f64)]) -> RowBatch {
        let schema = BatchSchema::new()
            .with_column(columns::ASOF_DT, ColumnType::Date)
            .with_column(columns::CURRENCY, ColumnType::Utf8)
            .with_column(columns::SPOT, ColumnType::Float64);
        let records = rows
            .iter()
            .map(|(d, c, v)| {
                Record::new()
                    .with(columns::ASOF_DT, *d)
                    .with(columns::CURRENCY, *c)
                    .with(columns::SPOT, *v)
            })
            .collect();
        RowBatch::from_records(&schema, records).unwrap()
    }

    #[test]
    fn test_pivot_wide_sorts_dates_and_codes() {
        let batch = long_batch(&[
            (date(2024, 1, 2), "JPY", 141.0),
            (date(2024, 1, 1), "EUR", 0.91),
            (date(2024, 1, 2), "EUR", 0.92),
        ]);
        let wide = pivot_wide(&batch, columns::SPOT).unwrap();

        assert_eq!(wide.column_names(), vec!["asof_dt", "EUR", "JPY"]);
        assert_eq!(
            wide.date_values(columns::ASOF_DT).unwrap(),
            vec![Some(date(2024, 1, 1)), Some(date(2024, 1, 2))]
        );
        assert_eq!(wide.f64_values("EUR").unwrap(), vec![Some(0.91), Some(0.92)]);
        assert_eq!(wide.f64_values("JPY").unwrap(), vec![None, Some(141.0)]);
    }

    #[test]
    fn test_pivot_wide_rejects_duplicates() {
        let batch = long_batch(&[
            (date(2024, 1, 1), "EUR", 0.91),
            (date(2024, 1, 1), "EUR", 0.93),
        ]);
        assert!(matches!(
            pivot_wide(&batch, columns::SPOT),
            Err(FeatureStoreError::DataError(_))
        ));
    }

    #[test]
    fn test_query_builder() {
        let q = RateQuery::new()
            .between(Some(date(2024, 1, 1)), None)
            .with_currencies(&["eur", "JPY"])
            .wide();
        assert_eq!(q.currencies, Some(vec!["EUR".to_string(), "JPY".to_string()]));
        assert_eq!(q.layout, Layout::Wide);
        assert_eq!(q.end, None);
    }
}
