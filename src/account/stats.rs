use crate::types::{percent, Timestamp};
use chrono::{DateTime, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Win/loss/break-even classification of a settled close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    Won,
    Lost,
    Even,
}

/// Running account performance counters. Daily counters reset on the
/// first bar of each new UTC calendar day; lifetime counters never reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountStats {
    pub balance: Decimal,
    pub max_balance: Decimal,
    /// Most negative percent change from the balance peak, <= 0.
    pub max_drawdown: Decimal,
    pub daily_won: u32,
    pub daily_lost: u32,
    pub daily_even: u32,
    pub daily_trades: u32,
    pub total_won: u32,
    pub total_lost: u32,
    pub total_even: u32,
    pub total_trades: u32,
    last_bar_date: Option<NaiveDate>,
}

impl AccountStats {
    pub fn new(start_balance: Decimal) -> Self {
        Self {
            balance: start_balance,
            max_balance: start_balance,
            max_drawdown: Decimal::ZERO,
            daily_won: 0,
            daily_lost: 0,
            daily_even: 0,
            daily_trades: 0,
            total_won: 0,
            total_lost: 0,
            total_even: 0,
            total_trades: 0,
            last_bar_date: None,
        }
    }

    /// Count a newly opened trade.
    pub fn record_open(&mut self) {
        self.daily_trades += 1;
        self.total_trades += 1;
    }

    /// Apply a settled close: move the balance to the authoritative
    /// post-close value, track peak and drawdown, classify the outcome
    /// and bump its counters.
    pub fn record_close(&mut self, balance_after: Decimal) -> CloseOutcome {
        let pnl = balance_after - self.balance;
        self.balance = balance_after;
        self.max_balance = self.max_balance.max(balance_after);
        self.max_drawdown = self
            .max_drawdown
            .min(percent(self.max_balance, balance_after));

        let outcome = if pnl > Decimal::ZERO {
            CloseOutcome::Won
        } else if pnl < Decimal::ZERO {
            CloseOutcome::Lost
        } else {
            CloseOutcome::Even
        };

        match outcome {
            CloseOutcome::Won => {
                self.daily_won += 1;
                self.total_won += 1;
            }
            CloseOutcome::Lost => {
                self.daily_lost += 1;
                self.total_lost += 1;
            }
            CloseOutcome::Even => {
                self.daily_even += 1;
                self.total_even += 1;
            }
        }

        outcome
    }

    /// Reset the intraday counters when `timestamp` falls on a different
    /// UTC calendar day than the previously seen bar. Returns true when a
    /// reset happened.
    pub fn roll_daily(&mut self, timestamp: Timestamp) -> bool {
        let Some(date) = DateTime::from_timestamp(timestamp, 0).map(|dt| dt.date_naive()) else {
            return false;
        };

        let rolled = matches!(self.last_bar_date, Some(prev) if prev != date);
        if rolled {
            self.daily_won = 0;
            self.daily_lost = 0;
            self.daily_even = 0;
            self.daily_trades = 0;
        }
        self.last_bar_date = Some(date);
        rolled
    }
}
