use crate::signal::Direction;
use crate::types::{Price, Qty, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Side of a directional trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Long,
    Short,
}

impl From<Direction> for TradeSide {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Long => TradeSide::Long,
            Direction::Short => TradeSide::Short,
        }
    }
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeSide::Long => write!(f, "long"),
            TradeSide::Short => write!(f, "short"),
        }
    }
}

/// Settled outcome of a closed trade. `profit` is positive when the
/// balance grew.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeResult {
    pub profit: Decimal,
    pub percent: Decimal,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
}

/// Free-form trade metadata. The initial stop is kept separately from the
/// working stop so trailing logic can reference where the trade started.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeMeta {
    pub initial_stop: Price,
}

/// One directional trade. At most one is active per account; on close it
/// moves into the account's history with `result` populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub side: TradeSide,
    pub entry: Price,
    pub stop: Price,
    pub take_profit: Price,
    /// Percent of balance at risk if the stop is hit.
    pub risk_fraction: Decimal,
    pub size: Qty,
    pub open_timestamp: Timestamp,
    pub close_timestamp: Option<Timestamp>,
    pub result: Option<TradeResult>,
    pub meta: TradeMeta,
}

impl Trade {
    pub fn new(
        side: TradeSide,
        entry: Price,
        stop: Price,
        take_profit: Price,
        risk_fraction: Decimal,
        size: Qty,
        open_timestamp: Timestamp,
    ) -> Self {
        Self {
            side,
            entry,
            stop,
            take_profit,
            risk_fraction,
            size,
            open_timestamp,
            close_timestamp: None,
            result: None,
            meta: TradeMeta { initial_stop: stop },
        }
    }

    pub fn is_closed(&self) -> bool {
        self.close_timestamp.is_some()
    }
}
