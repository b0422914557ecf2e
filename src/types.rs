//! Core types and column names shared by readers, jobs and the store

use chrono::NaiveDate;

/// Observation date of a rate or feature
pub type AsOfDate = NaiveDate;

/// ISO 4217 currency code as stored in snapshots
pub type CurrencyCode = String;

/// Exchange rate, carry or return value
pub type Rate = f64;

/// Forward tenor expressed in calendar days (0 for spot)
pub type TenorDays = i64;

/// Column names used by the FX snapshots
pub mod columns {
    pub const ASOF_DT: &str = "asof_dt";
    pub const CURRENCY: &str = "currency";
    pub const TENOR_DAYS: &str = "tenor_days";
    pub const TENOR: &str = "tenor";
    pub const RATE: &str = "rate";
    pub const UNIT_PER_USD: &str = "unit_per_usd";
    pub const SPOT: &str = "spot";
    pub const FORWARD: &str = "forward";
    pub const CARRY: &str = "carry";
    pub const SPOT_RETURN: &str = "spot_return";
    pub const CARRY_RETURN: &str = "carry_return";
    pub const TOTAL_RETURN: &str = "total_return";
    pub const YEAR: &str = "year";
}

/// Tenor label stored for spot rows
pub const SPOT_TENOR_LABEL: &str = "spot";

/// Calendar days of the only forward tenor staged from vendor CSVs
pub const STAGED_FORWARD_TENOR_DAYS: TenorDays = 90;
