use crate::types::{Price, Qty};
use rust_decimal::Decimal;
use std::fmt;

/// Rejected sizing inputs. A zero stop distance would size an infinite
/// position, so it is an error, never a silent fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RiskError {
    InvalidRiskInput(String),
}

impl fmt::Display for RiskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskError::InvalidRiskInput(msg) => write!(f, "invalid risk input: {}", msg),
        }
    }
}

impl std::error::Error for RiskError {}

/// Position quantity such that a stop-out loses approximately
/// `risk_fraction` percent of `balance`.
///
/// The raw quantity `balance * risk_fraction / 100 / |entry - stop|` is
/// floored to a multiple of `qty_step`, the instrument's quantity
/// precision. Flooring is the single rounding policy: a position is never
/// sized above the risk budget.
pub fn size_for(
    balance: Decimal,
    risk_fraction: Decimal,
    entry: Price,
    stop: Price,
    qty_step: Decimal,
) -> Result<Qty, RiskError> {
    if balance <= Decimal::ZERO {
        return Err(RiskError::InvalidRiskInput(format!(
            "balance must be positive, got {}",
            balance
        )));
    }
    if risk_fraction <= Decimal::ZERO {
        return Err(RiskError::InvalidRiskInput(format!(
            "risk fraction must be positive, got {}",
            risk_fraction
        )));
    }
    if qty_step <= Decimal::ZERO {
        return Err(RiskError::InvalidRiskInput(format!(
            "qty step must be positive, got {}",
            qty_step
        )));
    }

    let stop_distance = entry.distance(stop);
    if stop_distance.is_zero() {
        return Err(RiskError::InvalidRiskInput(format!(
            "stop distance is zero (entry {} == stop {})",
            entry, stop
        )));
    }

    let raw = balance * risk_fraction / Decimal::ONE_HUNDRED / stop_distance;
    let stepped = (raw / qty_step).floor() * qty_step;
    Ok(Qty::new(stepped))
}
