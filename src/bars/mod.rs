pub mod aggregator;

pub use aggregator::{BarAggregator, BarBuffer, IngestOutcome};

use crate::core::events::KlineTick;
use crate::types::{Price, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Chart timeframes the engine aggregates in parallel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    M1,
    M15,
    H1,
}

impl Timeframe {
    pub const ALL: [Timeframe; 3] = [Timeframe::M1, Timeframe::M15, Timeframe::H1];

    /// Interval code used in stream topics and the kline history endpoint.
    pub fn wire_code(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1",
            Timeframe::M15 => "15",
            Timeframe::H1 => "60",
        }
    }

    pub fn from_wire_code(code: &str) -> Option<Self> {
        match code {
            "1" => Some(Timeframe::M1),
            "15" => Some(Timeframe::M15),
            "60" => Some(Timeframe::H1),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M15 => "15m",
            Timeframe::H1 => "1h",
        }
    }

    /// Bar length in seconds.
    pub fn secs(&self) -> i64 {
        match self {
            Timeframe::M1 => 60,
            Timeframe::M15 => 900,
            Timeframe::H1 => 3600,
        }
    }

    /// How far back the history seed reaches for this timeframe, in
    /// seconds. Longer frames need a deeper window to fill the buffer.
    pub fn seed_lookback(&self) -> i64 {
        match self {
            Timeframe::M1 => 86_400,
            Timeframe::M15 => 225_000,
            Timeframe::H1 => 300_000,
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// One OHLCV bucket. The last bar in a buffer is the forming bar and is
/// still mutable; every bar before it is confirmed and immutable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub start: Timestamp,
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub close: Price,
    pub volume: Decimal,
    pub turnover: Decimal,
}

impl From<KlineTick> for Bar {
    fn from(tick: KlineTick) -> Self {
        Self {
            start: tick.start,
            open: Price::new(tick.open),
            high: Price::new(tick.high),
            low: Price::new(tick.low),
            close: Price::new(tick.close),
            volume: tick.volume,
            turnover: tick.turnover,
        }
    }
}
