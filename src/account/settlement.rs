use crate::account::trade::{Trade, TradeSide};
use crate::core::events::PositionUpdate;
use rust_decimal::Decimal;
use std::fmt;

/// A close event arrived but the policy could not resolve a balance from
/// it. The account stays open; the next authoritative report settles it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementError {
    MissingWalletBalance,
    MissingExitPrice,
    InvalidPrice(String),
}

impl fmt::Display for SettlementError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettlementError::MissingWalletBalance => {
                write!(f, "position report carries no wallet balance")
            }
            SettlementError::MissingExitPrice => {
                write!(f, "position report carries no exit price")
            }
            SettlementError::InvalidPrice(msg) => write!(f, "invalid price: {}", msg),
        }
    }
}

impl std::error::Error for SettlementError {}

/// How a close event resolves the authoritative post-close balance.
/// Injected at account construction; the state machine itself never
/// estimates PnL locally.
pub trait SettlementPolicy: Send {
    fn settle(
        &self,
        balance_before: Decimal,
        trade: &Trade,
        report: &PositionUpdate,
    ) -> Result<Decimal, SettlementError>;
}

/// Live trading: the exchange-reported wallet balance is the truth.
pub struct LiveSettlement;

impl SettlementPolicy for LiveSettlement {
    fn settle(
        &self,
        _balance_before: Decimal,
        _trade: &Trade,
        report: &PositionUpdate,
    ) -> Result<Decimal, SettlementError> {
        report
            .wallet_balance
            .ok_or(SettlementError::MissingWalletBalance)
    }
}

/// Dry runs without an authoritative wallet feed: derives the balance
/// from the locally recorded trade and the reported exit price using
/// inverse-contract arithmetic (quantity in contracts, PnL in coin).
pub struct SimulatedSettlement;

impl SettlementPolicy for SimulatedSettlement {
    fn settle(
        &self,
        balance_before: Decimal,
        trade: &Trade,
        report: &PositionUpdate,
    ) -> Result<Decimal, SettlementError> {
        let exit = report.exit_price.ok_or(SettlementError::MissingExitPrice)?;
        let entry = trade.entry.value();
        if entry.is_zero() || exit.is_zero() {
            return Err(SettlementError::InvalidPrice(format!(
                "entry {} / exit {}",
                entry, exit
            )));
        }

        // Inverse contract: coin PnL = contracts * (1/entry - 1/exit),
        // positive for a long when the exit is above the entry.
        let pnl = trade.size.value() * (Decimal::ONE / entry - Decimal::ONE / exit);
        let pnl = match trade.side {
            TradeSide::Long => pnl,
            TradeSide::Short => -pnl,
        };

        Ok(balance_before + pnl)
    }
}
