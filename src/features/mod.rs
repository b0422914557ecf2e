//! Pure FX feature transforms over aligned columns
//!
//! - **carry**: annualised forward-implied carry
//! - **returns**: spot, carry and total returns for a lagged holding period

pub mod carry;
pub mod returns;

pub use carry::{carry, fx_carry};
pub use returns::{fx_total_return, total_return, FxReturns, ReturnInputs, Tenor};
