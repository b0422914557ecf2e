//! Staging of vendor spot and forward-point CSVs into the exchange-rate snapshot
//!
//! Both inputs are wide: a date column followed by one column per currency,
//! quoted in market convention. Blank cells (and `NaN`, `#N/A`) are treated as
//! missing and skipped.

use crate::config::StagingSettings;
use crate::error::{FeatureStoreError, Result};
use crate::store::{BatchSchema, ColumnType, Record, RowBatch, SnapshotStore, UpsertSummary};
use crate::types::{columns, AsOfDate, SPOT_TENOR_LABEL, STAGED_FORWARD_TENOR_DAYS};
use chrono::NaiveDate;
use csv::{ReaderBuilder, Trim};
use std::collections::BTreeMap;
use std::path::Path;

/// Melted CSV content: `(date, currency) -> value`
pub type WideRates = BTreeMap<(AsOfDate, String), f64>;

/// Key of the exchange-rate snapshot
pub fn exchange_rate_key() -> Vec<String> {
    vec![
        columns::ASOF_DT.to_string(),
        columns::CURRENCY.to_string(),
        columns::TENOR_DAYS.to_string(),
    ]
}

/// Declared schema of the exchange-rate snapshot
pub fn exchange_rate_schema() -> BatchSchema {
    BatchSchema::new()
        .with_column(columns::ASOF_DT, ColumnType::Date)
        .with_column(columns::CURRENCY, ColumnType::Utf8)
        .with_column(columns::TENOR_DAYS, ColumnType::Int64)
        .with_column(columns::TENOR, ColumnType::Utf8)
        .with_column(columns::RATE, ColumnType::Float64)
        .with_column(columns::UNIT_PER_USD, ColumnType::Float64)
}

/// Counts from a staging run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagingReport {
    pub spot_rows: usize,
    pub forward_rows: usize,
    /// Forward points with no spot on the same date
    pub orphan_points: usize,
    pub summary: UpsertSummary,
}

fn parse_date(raw: &str, formats: &[String]) -> Option<NaiveDate> {
    formats
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

fn is_missing(cell: &str) -> bool {
    cell.is_empty() || cell.eq_ignore_ascii_case("nan") || cell.eq_ignore_ascii_case("#n/a")
}

/// Read a wide CSV (date column + one column per currency) into long form
pub fn read_wide_csv(path: &Path, settings: &StagingSettings) -> Result<WideRates> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_path(path)?;

    let headers = rdr.headers()?.clone();
    if headers.len() < 2 {
        return Err(FeatureStoreError::ParseError(format!(
            "{}: expected a date column followed by currency columns",
            path.display()
        )));
    }
    let currencies: Vec<String> = headers.iter().skip(1).map(|h| h.to_uppercase()).collect();

    let mut rates = WideRates::new();
    for (idx, record) in rdr.records().enumerate() {
        let record = record?;
        let line = idx + 2;

        let raw_date = record.get(0).unwrap_or_default();
        let date = parse_date(raw_date, &settings.date_formats).ok_or_else(|| {
            FeatureStoreError::ParseError(format!(
                "{} line {}: invalid date '{}'",
                path.display(),
                line,
                raw_date
            ))
        })?;

        for (col_idx, code) in currencies.iter().enumerate() {
            let cell = record.get(col_idx + 1).unwrap_or_default();
            if is_missing(cell) {
                continue;
            }
            let value: f64 = cell.parse().map_err(|e| {
                FeatureStoreError::ParseError(format!(
                    "{} line {}: invalid {} value '{}': {}",
                    path.display(),
                    line,
                    code,
                    cell,
                    e
                ))
            })?;
            rates.insert((date, code.clone()), value);
        }
    }

    Ok(rates)
}

/// Build exchange-rate rows from melted spot and forward-point tables
///
/// Returns the batch, the number of forward rows in it, and the number of
/// forward points skipped for lack of a spot rate.
pub fn build_exchange_rates(
    spot: &WideRates,
    points: &WideRates,
    settings: &StagingSettings,
) -> Result<(RowBatch, usize, usize)> {
    let to_unit_per_usd = |code: &str, rate: f64| {
        if settings
            .invert_currencies
            .iter()
            .any(|c| c.eq_ignore_ascii_case(code))
        {
            1.0 / rate
        } else {
            rate
        }
    };

    let mut records = Vec::with_capacity(spot.len() + points.len());
    for ((date, code), rate) in spot {
        records.push(
            Record::new()
                .with(columns::ASOF_DT, *date)
                .with(columns::CURRENCY, code.as_str())
                .with(columns::TENOR_DAYS, 0i64)
                .with(columns::TENOR, SPOT_TENOR_LABEL)
                .with(columns::RATE, *rate)
                .with(columns::UNIT_PER_USD, to_unit_per_usd(code, *rate)),
        );
    }
    let spot_rows = records.len();

    let mut orphans = 0;
    for ((date, code), pts) in points {
        let Some(spot_rate) = spot.get(&(*date, code.clone())) else {
            orphans += 1;
            continue;
        };
        let forward = spot_rate + pts;
        records.push(
            Record::new()
                .with(columns::ASOF_DT, *date)
                .with(columns::CURRENCY, code.as_str())
                .with(columns::TENOR_DAYS, STAGED_FORWARD_TENOR_DAYS)
                .with(columns::TENOR, "3M")
                .with(columns::RATE, forward)
                .with(columns::UNIT_PER_USD, to_unit_per_usd(code, forward)),
        );
    }
    let forward_rows = records.len() - spot_rows;

    let batch = RowBatch::from_records(&exchange_rate_schema(), records)?;
    Ok((batch, forward_rows, orphans))
}

/// Stage spot and forward-point CSVs and upsert them into `output`
pub fn stage_exchange_rates(
    store: &SnapshotStore,
    spot_csv: &Path,
    points_csv: &Path,
    output: &Path,
    settings: &StagingSettings,
) -> Result<StagingReport> {
    let spot = read_wide_csv(spot_csv, settings)?;
    let points = read_wide_csv(points_csv, settings)?;
    log::info!(
        "Read {} spot and {} forward-point observations",
        spot.len(),
        points.len()
    );

    let (batch, forward_rows, orphan_points) = build_exchange_rates(&spot, &points, settings)?;
    if orphan_points > 0 {
        log::warn!(
            "Skipped {} forward points with no spot rate on the same date",
            orphan_points
        );
    }

    let summary = store.upsert(&batch, output, &exchange_rate_key())?;
    Ok(StagingReport {
        spot_rows: batch.height() - forward_rows,
        forward_rows,
        orphan_points,
        summary,
    })
}
