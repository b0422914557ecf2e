//! FX total-return job

use super::{date_series, normalize_currencies, JobReport};
use crate::data::readers::{read_fx_carry, read_fx_spot, RateQuery};
use crate::error::{FeatureStoreError, Result};
use crate::features::{fx_total_return, ReturnInputs, Tenor};
use crate::store::{RowBatch, SnapshotStore};
use crate::types::{columns, AsOfDate};
use chrono::Datelike;
use hashbrown::HashMap;
use polars::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Key of the return snapshot
pub fn return_key() -> Vec<String> {
    vec![
        columns::ASOF_DT.to_string(),
        columns::CURRENCY.to_string(),
        columns::YEAR.to_string(),
    ]
}

/// Parameters for [`fx_returns_to_snapshot`]
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnParams {
    pub start: Option<AsOfDate>,
    pub end: Option<AsOfDate>,
    pub currencies: Option<Vec<String>>,
    /// Carry tenor rolled into the return
    pub tenor: Tenor,
    /// Holding period, in observation dates
    pub n_days: u32,
}

impl Default for ReturnParams {
    fn default() -> Self {
        Self {
            start: None,
            end: None,
            currencies: None,
            tenor: Tenor::ThreeMonth,
            n_days: 1,
        }
    }
}

/// Aligned rows ready for the return transform
#[derive(Debug, Default)]
struct LaggedRows {
    dates: Vec<AsOfDate>,
    codes: Vec<String>,
    spot_prev: Vec<f64>,
    spot: Vec<f64>,
    carry_prev: Vec<f64>,
    carry: Vec<f64>,
    dropped: usize,
}

/// Pair each (date, currency) with the observation `n_days` dates earlier
///
/// The lag walks the distinct dates of the merged data, not the calendar, so
/// a holiday for every currency does not open a gap.
fn lag_rows(merged: &BTreeMap<(AsOfDate, String), (f64, f64)>, n_days: usize) -> LaggedRows {
    let dates: Vec<AsOfDate> = merged
        .keys()
        .map(|(d, _)| *d)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let prev_date: HashMap<AsOfDate, AsOfDate> = dates
        .iter()
        .skip(n_days)
        .zip(dates.iter())
        .map(|(d, prev)| (*d, *prev))
        .collect();

    let mut rows = LaggedRows::default();
    for ((date, code), (spot, carry)) in merged {
        let prev = prev_date
            .get(date)
            .and_then(|p| merged.get(&(*p, code.clone())));
        match prev {
            Some((spot_prev, carry_prev)) => {
                rows.dates.push(*date);
                rows.codes.push(code.clone());
                rows.spot_prev.push(*spot_prev);
                rows.spot.push(*spot);
                rows.carry_prev.push(*carry_prev);
                rows.carry.push(*carry);
            }
            None => rows.dropped += 1,
        }
    }
    rows
}

/// Compute spot, carry and total returns and upsert them into `output`
///
/// Spot comes from the exchange-rate snapshot (units per USD), carry from the
/// carry snapshot at the tenor's calendar days.
pub fn fx_returns_to_snapshot(
    store: &SnapshotStore,
    exchange_rates: &Path,
    carry: &Path,
    output: &Path,
    params: &ReturnParams,
) -> Result<JobReport> {
    if params.n_days == 0 {
        return Err(FeatureStoreError::InvalidArgument(
            "n_days must be at least 1".to_string(),
        ));
    }

    let query = RateQuery {
        start: params.start,
        end: params.end,
        currencies: normalize_currencies(&params.currencies),
        ..RateQuery::default()
    };
    let spots = read_fx_spot(store, exchange_rates, &query, true)?;
    let carries = read_fx_carry(store, carry, &query, params.tenor.calendar_days())?;

    let mut carry_by_key: HashMap<(AsOfDate, String), f64> = HashMap::new();
    for ((date, code), value) in carries
        .date_values(columns::ASOF_DT)?
        .into_iter()
        .zip(carries.str_values(columns::CURRENCY)?)
        .zip(carries.f64_values(columns::CARRY)?)
    {
        if let (Some(date), Some(code), Some(value)) = (date, code, value) {
            carry_by_key.insert((date, code), value);
        }
    }

    let mut merged: BTreeMap<(AsOfDate, String), (f64, f64)> = BTreeMap::new();
    for ((date, code), spot) in spots
        .date_values(columns::ASOF_DT)?
        .into_iter()
        .zip(spots.str_values(columns::CURRENCY)?)
        .zip(spots.f64_values(columns::SPOT)?)
    {
        if let (Some(date), Some(code), Some(spot)) = (date, code, spot) {
            if let Some(carry) = carry_by_key.get(&(date, code.clone())) {
                merged.insert((date, code), (spot, *carry));
            }
        }
    }

    let rows = lag_rows(&merged, params.n_days as usize);
    let returns = fx_total_return(
        ReturnInputs {
            spot_prev: &rows.spot_prev,
            spot: &rows.spot,
            carry_prev: &rows.carry_prev,
            carry: &rows.carry,
        },
        params.n_days,
        params.tenor,
    )?;

    let mut dates = Vec::with_capacity(returns.len());
    let mut codes = Vec::with_capacity(returns.len());
    let mut spot_ret = Vec::with_capacity(returns.len());
    let mut carry_ret = Vec::with_capacity(returns.len());
    let mut total_ret = Vec::with_capacity(returns.len());
    let mut years = Vec::with_capacity(returns.len());
    let mut non_finite = 0;
    for i in 0..returns.len() {
        let (s, c, t) = (
            returns.spot_return[i],
            returns.carry_return[i],
            returns.total_return[i],
        );
        if !(s.is_finite() && c.is_finite() && t.is_finite()) {
            non_finite += 1;
            continue;
        }
        dates.push(rows.dates[i]);
        codes.push(rows.codes[i].clone());
        spot_ret.push(s);
        carry_ret.push(c);
        total_ret.push(t);
        years.push(rows.dates[i].year() as i64);
    }

    let dropped = rows.dropped + non_finite;
    if dropped > 0 {
        log::warn!(
            "Dropped {} rows without a lagged observation or with non-finite returns",
            dropped
        );
    }

    let frame = DataFrame::new(vec![
        date_series(columns::ASOF_DT, &dates)?,
        Series::new(columns::CURRENCY, codes),
        Series::new(columns::SPOT_RETURN, spot_ret),
        Series::new(columns::CARRY_RETURN, carry_ret),
        Series::new(columns::TOTAL_RETURN, total_ret),
        Series::new(columns::YEAR, years),
    ])?;
    let batch = RowBatch::from_frame(frame)?;

    let summary = store.upsert(&batch, output, &return_key())?;
    log::info!(
        "FX returns for tenor={}, n_days={}, start={:?}, end={:?}, currencies={:?}: {} rows saved",
        params.tenor,
        params.n_days,
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

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_lag_walks_distinct_dates() {
        let mut merged = BTreeMap::new();
        // 2024-01-05 is a Friday, next observation Monday 2024-01-08
        merged.insert((date(2024, 1, 5), "EUR".to_string()), (0.91, 0.02));
        merged.insert((date(2024, 1, 8), "EUR".to_string()), (0.92, 0.021));
        merged.insert((date(2024, 1, 8), "MXN".to_string()), (17.0, 0.07));
        merged.insert((date(2024, 1, 9), "MXN".to_string()), (16.9, 0.071));

        let rows = lag_rows(&merged, 1);

        assert_eq!(rows.dates, vec![date(2024, 1, 8), date(2024, 1, 9)]);
        assert_eq!(rows.codes, vec!["EUR".to_string(), "MXN".to_string()]);
        assert_eq!(rows.spot_prev, vec![0.91, 17.0]);
        assert_eq!(rows.carry, vec![0.021, 0.071]);
        // EUR on the 5th and MXN on the 8th have no prior observation
        assert_eq!(rows.dropped, 2);
    }

    #[test]
    fn test_two_day_lag() {
        let mut merged = BTreeMap::new();
        for (i, day) in [2u32, 3, 4].iter().enumerate() {
            merged.insert((date(2024, 1, *day), "JPY".to_string()), (140.0 + i as f64, 0.0));
        }
        let rows = lag_rows(&merged, 2);
        assert_eq!(rows.dates, vec![date(2024, 1, 4)]);
        assert_eq!(rows.spot_prev, vec![140.0]);
        assert_eq!(rows.dropped, 2);
    }
}
