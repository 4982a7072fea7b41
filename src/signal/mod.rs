use crate::bars::BarAggregator;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Trade direction a signal can call for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
}

/// Outcome of one signal evaluation over confirmed bar history.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalDecision {
    /// `None` means stay flat.
    pub direction: Option<Direction>,
    /// Distance from entry to the protective stop, in price units
    /// (typically an ATR multiple computed by the indicator stack).
    pub stop_distance: Decimal,
}

impl SignalDecision {
    /// No trade this bar.
    pub fn hold() -> Self {
        Self {
            direction: None,
            stop_distance: Decimal::ZERO,
        }
    }

    pub fn enter(direction: Direction, stop_distance: Decimal) -> Self {
        Self {
            direction: Some(direction),
            stop_distance,
        }
    }
}

/// Seam for the indicator stack. The engine calls this once per confirmed
/// bar of the signal timeframe, handing it read-only access to every
/// timeframe's history. The mathematics behind the decision live entirely
/// behind this trait.
#[cfg_attr(test, mockall::automock)]
pub trait SignalService: Send {
    fn evaluate(&self, bars: &BarAggregator) -> SignalDecision;
}

/// Service that never trades. Keeps the engine wired and observable until
/// a strategy implementation is plugged in.
pub struct HoldSignal;

impl SignalService for HoldSignal {
    fn evaluate(&self, _bars: &BarAggregator) -> SignalDecision {
        SignalDecision::hold()
    }
}
