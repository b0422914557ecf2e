//! FX carry from spot and forward rates
//!
//! Rates are expressed as units of foreign currency per USD, so a positive
//! carry means the forward trades above spot (foreign rates above USD rates).

use crate::error::{FeatureStoreError, Result};

/// Day-count basis used to annualise carry
pub const CARRY_DAY_COUNT: f64 = 360.0;

/// Annualised carry for a single observation: `ln(forward / spot) * 360 / tenor_days`
pub fn carry(spot: f64, forward: f64, tenor_days: i64) -> f64 {
    (forward / spot).ln() * (CARRY_DAY_COUNT / tenor_days as f64)
}

/// Carry over aligned spot/forward/tenor columns
pub fn fx_carry(spot: &[f64], forward: &[f64], tenor_days: &[i64]) -> Result<Vec<f64>> {
    if spot.len() != forward.len() || spot.len() != tenor_days.len() {
        return Err(FeatureStoreError::InvalidArgument(format!(
            "carry inputs must be aligned: spot={}, forward={}, tenor_days={}",
            spot.len(),
            forward.len(),
            tenor_days.len()
        )));
    }
    if let Some(bad) = tenor_days.iter().find(|t| **t <= 0) {
        return Err(FeatureStoreError::InvalidArgument(format!(
            "tenor_days must be positive, got {}",
            bad
        )));
    }

    Ok(spot
        .iter()
        .zip(forward)
        .zip(tenor_days)
        .map(|((s, f), t)| carry(*s, *f, *t))
        .collect())
}
