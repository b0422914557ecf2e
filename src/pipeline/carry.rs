//! FX carry job

use super::{date_series, normalize_currencies, JobReport};
use crate::data::readers::{read_fx_forward, read_fx_spot, RateQuery};
use crate::error::{FeatureStoreError, Result};
use crate::features::fx_carry;
use crate::store::{RowBatch, SnapshotStore};
use crate::types::{columns, AsOfDate, TenorDays, STAGED_FORWARD_TENOR_DAYS};
use hashbrown::HashMap;
use polars::prelude::*;
use std::path::Path;

/// Key of the carry snapshot
pub fn carry_key() -> Vec<String> {
    vec![
        columns::ASOF_DT.to_string(),
        columns::CURRENCY.to_string(),
        columns::TENOR_DAYS.to_string(),
    ]
}

/// Parameters for [`fx_carry_to_snapshot`]
#[derive(Debug, Clone, PartialEq)]
pub struct CarryParams {
    pub start: Option<AsOfDate>,
    pub end: Option<AsOfDate>,
    /// `None` runs every currency present
    pub currencies: Option<Vec<String>>,
    /// Forward tenors, in calendar days, to compute carry for
    pub tenor_days: Vec<TenorDays>,
}

impl Default for CarryParams {
    fn default() -> Self {
        Self {
            start: None,
            end: None,
            currencies: None,
            tenor_days: vec![STAGED_FORWARD_TENOR_DAYS],
        }
    }
}

impl CarryParams {
    fn query(&self) -> RateQuery {
        RateQuery {
            start: self.start,
            end: self.end,
            currencies: normalize_currencies(&self.currencies),
            ..RateQuery::default()
        }
    }
}

/// Compute carry from the exchange-rate snapshot and upsert it into `output`
///
/// Each forward row is matched with the spot rate for the same date and
/// currency. Forwards without a spot, and rows whose carry is not finite, are
/// dropped and counted.
pub fn fx_carry_to_snapshot(
    store: &SnapshotStore,
    exchange_rates: &Path,
    output: &Path,
    params: &CarryParams,
) -> Result<JobReport> {
    if params.tenor_days.is_empty() {
        return Err(FeatureStoreError::InvalidArgument(
            "at least one carry tenor is required".to_string(),
        ));
    }

    let query = params.query();
    let forwards = read_fx_forward(
        store,
        exchange_rates,
        &query,
        Some(params.tenor_days.as_slice()),
        true,
    )?;
    let spots = read_fx_spot(store, exchange_rates, &query, true)?;

    let mut spot_by_key: HashMap<(AsOfDate, String), f64> = HashMap::new();
    for ((date, code), spot) in spots
        .date_values(columns::ASOF_DT)?
        .into_iter()
        .zip(spots.str_values(columns::CURRENCY)?)
        .zip(spots.f64_values(columns::SPOT)?)
    {
        if let (Some(date), Some(code), Some(spot)) = (date, code, spot) {
            spot_by_key.insert((date, code), spot);
        }
    }

    let mut dates = Vec::with_capacity(forwards.height());
    let mut codes = Vec::with_capacity(forwards.height());
    let mut tenors = Vec::with_capacity(forwards.height());
    let mut spot_col = Vec::with_capacity(forwards.height());
    let mut forward_col = Vec::with_capacity(forwards.height());
    let mut dropped = 0;

    let rows = forwards
        .date_values(columns::ASOF_DT)?
        .into_iter()
        .zip(forwards.str_values(columns::CURRENCY)?)
        .zip(forwards.i64_values(columns::TENOR_DAYS)?)
        .zip(forwards.f64_values(columns::FORWARD)?);
    for (((date, code), tenor), forward) in rows {
        let (Some(date), Some(code), Some(tenor), Some(forward)) = (date, code, tenor, forward) else {
            dropped += 1;
            continue;
        };
        let Some(spot) = spot_by_key.get(&(date, code.clone())) else {
            dropped += 1;
            continue;
        };
        dates.push(date);
        codes.push(code);
        tenors.push(tenor);
        spot_col.push(*spot);
        forward_col.push(forward);
    }

    if dropped > 0 {
        log::warn!("Dropped {} forward rows without a matching spot rate", dropped);
    }

    let carry = fx_carry(&spot_col, &forward_col, &tenors)?;
    let mut out_dates = Vec::with_capacity(carry.len());
    let mut out_codes = Vec::with_capacity(carry.len());
    let mut out_tenors = Vec::with_capacity(carry.len());
    let mut out_carry = Vec::with_capacity(carry.len());
    let mut non_finite = 0;
    for (i, value) in carry.into_iter().enumerate() {
        if !value.is_finite() {
            non_finite += 1;
            continue;
        }
        out_dates.push(dates[i]);
        out_codes.push(codes[i].clone());
        out_tenors.push(tenors[i]);
        out_carry.push(value);
    }
    if non_finite > 0 {
        log::warn!(
            "Dropped {} carry rows with a non-finite value (zero or negative rates)",
            non_finite
        );
    }
    let dropped = dropped + non_finite;

    let frame = DataFrame::new(vec![
        date_series(columns::ASOF_DT, &out_dates)?,
        Series::new(columns::CURRENCY, out_codes),
        Series::new(columns::TENOR_DAYS, out_tenors),
        Series::new(columns::CARRY, out_carry),
    ])?;
    let batch = RowBatch::from_frame(frame)?;

    let summary = store.upsert(&batch, output, &carry_key())?;
    log::info!(
        "FX carry for tenors {:?}, start={:?}, end={:?}, currencies={:?}: {} rows saved",
        params.tenor_days,
        params.start,
        params.end,
        params.currencies,
        batch.height()
    );

    Ok(JobReport {
        rows_computed: batch.height(),
        rows_dropped: dropped,
        summary,
    })
}
