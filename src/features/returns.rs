//! FX total returns - spot move plus carry accrued over the holding period
//!
//! All rates are quoted as units per USD (USDXXX). Returns are from the point
//! of view of a USD investor short USDXXX: a +1% MXN return means that
//! position made 1%.

use crate::error::{FeatureStoreError, Result};
use std::fmt;
use std::str::FromStr;

/// Forward tenor used to roll carry into returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Tenor {
    OneMonth,
    #[default]
    ThreeMonth,
    SixMonth,
    OneYear,
}

impl Tenor {
    /// Approximate trading days in the tenor
    pub fn trading_days(&self) -> u32 {
        match self {
            Tenor::OneMonth => 21,
            Tenor::ThreeMonth => 65,
            Tenor::SixMonth => 130,
            Tenor::OneYear => 260,
        }
    }

    /// Calendar days on a 360-day year, as stored in the carry snapshot
    pub fn calendar_days(&self) -> i64 {
        match self {
            Tenor::OneMonth => 30,
            Tenor::ThreeMonth => 90,
            Tenor::SixMonth => 180,
            Tenor::OneYear => 360,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Tenor::OneMonth => "1M",
            Tenor::ThreeMonth => "3M",
            Tenor::SixMonth => "6M",
            Tenor::OneYear => "1Y",
        }
    }
}

impl FromStr for Tenor {
    type Err = FeatureStoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "1M" => Ok(Tenor::OneMonth),
            "3M" => Ok(Tenor::ThreeMonth),
            "6M" => Ok(Tenor::SixMonth),
            "1Y" | "12M" => Ok(Tenor::OneYear),
            other => Err(FeatureStoreError::InvalidArgument(format!(
                "unknown tenor '{}', expected one of 1M, 3M, 6M, 1Y",
                other
            ))),
        }
    }
}

impl fmt::Display for Tenor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Aligned input columns for [`fx_total_return`]
#[derive(Debug, Clone, Copy)]
pub struct ReturnInputs<'a> {
    pub spot_prev: &'a [f64],
    pub spot: &'a [f64],
    pub carry_prev: &'a [f64],
    pub carry: &'a [f64],
}

impl ReturnInputs<'_> {
    pub fn len(&self) -> usize {
        self.spot.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spot.is_empty()
    }

    fn check_aligned(&self) -> Result<()> {
        let n = self.spot.len();
        if self.spot_prev.len() != n || self.carry_prev.len() != n || self.carry.len() != n {
            return Err(FeatureStoreError::InvalidArgument(format!(
                "return inputs must be aligned: spot_prev={}, spot={}, carry_prev={}, carry={}",
                self.spot_prev.len(),
                n,
                self.carry_prev.len(),
                self.carry.len()
            )));
        }
        Ok(())
    }
}

/// Output columns of [`fx_total_return`], aligned with the inputs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FxReturns {
    pub spot_return: Vec<f64>,
    pub carry_return: Vec<f64>,
    pub total_return: Vec<f64>,
}

impl FxReturns {
    pub fn len(&self) -> usize {
        self.total_return.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total_return.is_empty()
    }
}

/// Single-period return: `(spot_return, carry_return, total_return)`
///
/// Spot is converted to USD per unit (`S = 1 / spot`). The forward bought at
/// `t-n` is marked at `t` with its remaining `(T - n) / T` share of quarterly
/// carry, where `T` is the tenor in trading days.
pub fn total_return(
    spot_prev: f64,
    spot: f64,
    carry_prev: f64,
    carry: f64,
    n_days: u32,
    tenor: Tenor,
) -> (f64, f64, f64) {
    let s_prev = 1.0 / spot_prev;
    let s_now = 1.0 / spot;
    let tenor_days = tenor.trading_days() as f64;
    let n = n_days as f64;

    let spot_return = s_now / s_prev - 1.0;
    let rolled = s_prev * (carry / 4.0 * (tenor_days - n) / tenor_days).exp() / (carry_prev / 4.0).exp();
    let total = (s_now - rolled) / s_prev;

    (spot_return, total - spot_return, total)
}

/// Vectorised total returns over aligned columns
pub fn fx_total_return(inputs: ReturnInputs<'_>, n_days: u32, tenor: Tenor) -> Result<FxReturns> {
    inputs.check_aligned()?;
    if n_days == 0 {
        return Err(FeatureStoreError::InvalidArgument(
            "n_days must be at least 1".to_string(),
        ));
    }
    if n_days >= tenor.trading_days() {
        return Err(FeatureStoreError::InvalidArgument(format!(
            "n_days ({}) must be shorter than the {} tenor ({} trading days)",
            n_days,
            tenor,
            tenor.trading_days()
        )));
    }

    let mut out = FxReturns {
        spot_return: Vec::with_capacity(inputs.len()),
        carry_return: Vec::with_capacity(inputs.len()),
        total_return: Vec::with_capacity(inputs.len()),
    };
    for i in 0..inputs.len() {
        let (spot_ret, carry_ret, total) = total_return(
            inputs.spot_prev[i],
            inputs.spot[i],
            inputs.carry_prev[i],
            inputs.carry[i],
            n_days,
            tenor,
        );
        out.spot_return.push(spot_ret);
        out.carry_return.push(carry_ret);
        out.total_return.push(total);
    }
    Ok(out)
}
