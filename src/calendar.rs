//! IMM date utilities
//!
//! IMM dates are the third Wednesday of March, June, September and December,
//! the standard roll dates for listed FX futures and many forward curves.

use crate::error::{FeatureStoreError, Result};
use chrono::{Datelike, NaiveDate, Weekday};

/// Months carrying an IMM date
pub const IMM_MONTHS: [u32; 4] = [3, 6, 9, 12];

/// Third Wednesday of the given month
pub fn third_wednesday(year: i32, month: u32) -> Result<NaiveDate> {
    NaiveDate::from_weekday_of_month_opt(year, month, Weekday::Wed, 3).ok_or_else(|| {
        FeatureStoreError::InvalidArgument(format!("invalid year/month: {}-{}", year, month))
    })
}

/// Whether `date` is an IMM date
pub fn is_imm_date(date: NaiveDate) -> bool {
    IMM_MONTHS.contains(&date.month())
        && third_wednesday(date.year(), date.month()).map_or(false, |d| d == date)
}

/// The IMM date strictly after `start`, shifted by `offset` IMM dates
///
/// `offset = 0` gives the next IMM date, `1` the one after, and `-1` the IMM
/// date immediately before the next one (which is `start` itself when `start`
/// is an IMM date).
pub fn next_imm_date(start: NaiveDate, offset: i32) -> Result<NaiveDate> {
    let next = first_imm_after(start)?;
    if offset == 0 {
        return Ok(next);
    }

    let quarter = next.year() as i64 * 4 + (next.month() / 3 - 1) as i64 + offset as i64;
    let year = i32::try_from(quarter.div_euclid(4)).map_err(|_| {
        FeatureStoreError::InvalidArgument(format!("IMM offset {} out of range", offset))
    })?;
    let month = IMM_MONTHS[quarter.rem_euclid(4) as usize];
    third_wednesday(year, month)
}

/// All IMM dates in `[start, end]`, ascending
pub fn imm_dates_between(start: NaiveDate, end: NaiveDate) -> Result<Vec<NaiveDate>> {
    let mut dates = Vec::new();
    let mut current = match start.pred_opt() {
        Some(day_before) => first_imm_after(day_before)?,
        None => return Ok(dates),
    };
    while current <= end {
        dates.push(current);
        current = first_imm_after(current)?;
    }
    Ok(dates)
}

fn first_imm_after(start: NaiveDate) -> Result<NaiveDate> {
    for year in start.year()..=start.year() + 1 {
        for month in IMM_MONTHS {
            let candidate = third_wednesday(year, month)?;
            if candidate > start {
                return Ok(candidate);
            }
        }
    }
    Err(FeatureStoreError::InvalidArgument(format!(
        "no IMM date found after {}",
        start
    )))
}
