use crate::account::export::export_trade;
use crate::account::settlement::{SettlementError, SettlementPolicy};
use crate::account::stats::AccountStats;
use crate::account::trade::{Trade, TradeResult, TradeSide};
use crate::core::events::{ExecutionUpdate, OrderId, OrderUpdate, PositionUpdate};
use crate::risk::{size_for, RiskError};
use crate::types::{percent, Price, Qty, Timestamp};
use log::{debug, error, info};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

/// Zero-size position echoes arriving within this many seconds of an open
/// are treated as stale feed races, not genuine closes.
pub const DEFAULT_GRACE_WINDOW_SECS: i64 = 5;

/// Trade lifecycle of the account. `Closing` only exists inside a single
/// `position_update` call; the machine always settles back to `Flat` or
/// `Open` before returning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountState {
    Flat,
    Open,
    Closing,
}

/// Audit status of a tracked order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderState {
    Open,
    Filled,
}

/// One entry of the order audit map. Never deleted; duplicate ids update
/// in place. Position truth comes from position reports, not from here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRecord {
    pub status: OrderState,
    pub leaves_qty: Qty,
    pub payload: Value,
}

#[derive(Debug)]
pub enum AccountError {
    /// `open()` while a trade is already active.
    TradeAlreadyOpen,
    Sizing(RiskError),
    Settlement(SettlementError),
}

impl fmt::Display for AccountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountError::TradeAlreadyOpen => write!(f, "a trade is already active"),
            AccountError::Sizing(e) => write!(f, "sizing rejected: {}", e),
            AccountError::Settlement(e) => write!(f, "settlement failed: {}", e),
        }
    }
}

impl std::error::Error for AccountError {}

/// Authoritative local view of the trading account. Owns the single
/// active trade, the order audit map, the trade history and the running
/// statistics, and reconciles them against exchange events.
pub struct Account {
    state: AccountState,
    trade: Option<Trade>,
    orders: HashMap<OrderId, OrderRecord>,
    history: Vec<Trade>,
    stats: AccountStats,
    settlement: Box<dyn SettlementPolicy>,
    grace_window_secs: i64,
    export_dir: Option<PathBuf>,
    last_position: Option<Value>,
}

impl Account {
    pub fn new(start_balance: Decimal, settlement: Box<dyn SettlementPolicy>) -> Self {
        Self {
            state: AccountState::Flat,
            trade: None,
            orders: HashMap::new(),
            history: Vec::new(),
            stats: AccountStats::new(start_balance),
            settlement,
            grace_window_secs: DEFAULT_GRACE_WINDOW_SECS,
            export_dir: None,
            last_position: None,
        }
    }

    /// Enable the per-close JSON audit export into `dir`.
    pub fn with_export_dir(mut self, dir: PathBuf) -> Self {
        self.export_dir = Some(dir);
        self
    }

    pub fn with_grace_window(mut self, secs: i64) -> Self {
        self.grace_window_secs = secs;
        self
    }

    pub fn state(&self) -> AccountState {
        self.state
    }

    pub fn is_flat(&self) -> bool {
        self.state == AccountState::Flat
    }

    pub fn trade(&self) -> Option<&Trade> {
        self.trade.as_ref()
    }

    pub fn stats(&self) -> &AccountStats {
        &self.stats
    }

    pub fn history(&self) -> &[Trade] {
        &self.history
    }

    pub fn orders(&self) -> &HashMap<OrderId, OrderRecord> {
        &self.orders
    }

    /// Exchange-visible position state from the last nonzero report,
    /// kept for display/audit.
    pub fn last_position(&self) -> Option<&Value> {
        self.last_position.as_ref()
    }

    /// Record the local intent to open a trade. Sizes the position from
    /// the current balance and the stop distance; valid only while flat.
    /// Placing the actual exchange orders is the caller's job.
    pub fn open(
        &mut self,
        side: TradeSide,
        entry: Price,
        stop: Price,
        take_profit: Price,
        risk_fraction: Decimal,
        qty_step: Decimal,
        timestamp: Timestamp,
    ) -> Result<&Trade, AccountError> {
        if self.state != AccountState::Flat || self.trade.is_some() {
            return Err(AccountError::TradeAlreadyOpen);
        }

        let size = size_for(self.stats.balance, risk_fraction, entry, stop, qty_step)
            .map_err(AccountError::Sizing)?;

        self.stats.record_open();
        self.trade = Some(Trade::new(
            side,
            entry,
            stop,
            take_profit,
            risk_fraction,
            size,
            timestamp,
        ));
        self.state = AccountState::Open;

        info!(
            "open: {} entry {} stop {} tp {} size {} (risk {}%)",
            side, entry, stop, take_profit, size, risk_fraction
        );

        Ok(self.trade.as_ref().expect("trade was just set"))
    }

    /// Upsert the order audit map from an order acknowledgement.
    pub fn record_order_ack(&mut self, update: &OrderUpdate) {
        debug!(
            "record_order_ack: {} leaves {} status {:?}",
            update.order_id, update.leaves_qty, update.order_status
        );
        self.orders.insert(
            update.order_id.clone(),
            OrderRecord {
                status: OrderState::Open,
                leaves_qty: Qty::new(update.leaves_qty),
                payload: update.payload.clone(),
            },
        );
    }

    /// Update the audit map from a fill report. Fills are informational;
    /// they never transition the trade state.
    pub fn record_execution(&mut self, update: &ExecutionUpdate) {
        let leaves = Qty::new(update.leaves_qty);
        match self.orders.get_mut(&update.order_id) {
            Some(record) => {
                record.leaves_qty = leaves;
                if leaves.is_zero() && record.status == OrderState::Open {
                    info!("record_execution: order {} filled", update.order_id);
                    record.status = OrderState::Filled;
                } else {
                    debug!(
                        "record_execution: order {} leaves {}",
                        update.order_id, leaves
                    );
                }
            }
            None => {
                // Execution before (or without) the order ack: keep the
                // audit trail complete anyway.
                info!(
                    "record_execution: unseen order {} leaves {}",
                    update.order_id, leaves
                );
                self.orders.insert(
                    update.order_id.clone(),
                    OrderRecord {
                        status: if leaves.is_zero() {
                            OrderState::Filled
                        } else {
                            OrderState::Open
                        },
                        leaves_qty: leaves,
                        payload: update.payload.clone(),
                    },
                );
            }
        }
    }

    /// Reconcile a position report. A zero size outside the grace window
    /// closes the active trade against the settlement policy's balance;
    /// a zero size inside the window is a stale echo and is ignored.
    pub fn position_update(
        &mut self,
        update: &PositionUpdate,
        now: Timestamp,
    ) -> Result<(), AccountError> {
        if !update.size.is_zero() {
            // Position still live: mirror the exchange-visible state for
            // display, ownership and invariants unaffected.
            self.last_position = Some(update.payload.clone());
            debug!("position_update: live size {}", update.size);
            return Ok(());
        }

        let Some(mut trade) = self.trade.take() else {
            debug!("position_update: flat report, nothing to close");
            return Ok(());
        };

        if self.state == AccountState::Open
            && now - trade.open_timestamp <= self.grace_window_secs
        {
            debug!(
                "position_update: zero-size echo {}s after open, inside the {}s grace window; ignoring",
                now - trade.open_timestamp,
                self.grace_window_secs
            );
            self.trade = Some(trade);
            return Ok(());
        }

        self.state = AccountState::Closing;

        let balance_before = self.stats.balance;
        let balance_after = match self.settlement.settle(balance_before, &trade, update) {
            Ok(balance) => balance,
            Err(e) => {
                // Unusable close report: keep the trade open and wait for
                // the next authoritative one.
                error!("position_update: {}; trade stays open", e);
                self.trade = Some(trade);
                self.state = AccountState::Open;
                return Err(AccountError::Settlement(e));
            }
        };

        let outcome = self.stats.record_close(balance_after);
        trade.close_timestamp = Some(now);
        trade.result = Some(TradeResult {
            profit: balance_after - balance_before,
            percent: percent(balance_before, balance_after),
            balance_before,
            balance_after,
        });

        info!(
            "position_update: closed {} {:?}, balance {} -> {}, daily won {} lost {} trades {}",
            trade.side,
            outcome,
            balance_before,
            balance_after,
            self.stats.daily_won,
            self.stats.daily_lost,
            self.stats.daily_trades
        );

        if let Some(dir) = &self.export_dir {
            if let Err(e) = export_trade(dir, &trade, &self.orders) {
                error!("position_update: export failed, close stands: {}", e);
            }
        }

        self.history.push(trade);
        self.state = AccountState::Flat;
        Ok(())
    }

    /// Bar-close bookkeeping, called once per confirmed bar before signal
    /// logic runs: rolls the daily counters on a UTC date change.
    pub fn on_bar_close(&mut self, timestamp: Timestamp) {
        if self.stats.roll_daily(timestamp) {
            info!("on_bar_close: new UTC day, daily counters reset");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::settlement::LiveSettlement;

    fn account() -> Account {
        Account::new(Decimal::new(2, 2), Box::new(LiveSettlement)) // 0.02
    }

    fn open_scenario_trade(account: &mut Account, at: Timestamp) {
        account
            .open(
                TradeSide::Long,
                Price::from_str("59750").unwrap(),
                Price::from_str("55000").unwrap(),
                Price::from_str("60456").unwrap(),
                Decimal::new(4, 0),
                Decimal::new(1, 8),
                at,
            )
            .unwrap();
    }

    fn flat_report(wallet_balance: &str) -> PositionUpdate {
        PositionUpdate {
            size: Decimal::ZERO,
            side: None,
            entry_price: None,
            wallet_balance: Some(Decimal::from_str_exact(wallet_balance).unwrap()),
            exit_price: None,
            payload: Value::Null,
        }
    }

    fn live_report(size: i64) -> PositionUpdate {
        PositionUpdate {
            size: Decimal::new(size, 0),
            side: Some("Buy".to_string()),
            entry_price: None,
            wallet_balance: None,
            exit_price: None,
            payload: serde_json::json!({"size": size}),
        }
    }

    #[test]
    fn test_open_transitions_to_open_and_counts_the_trade() {
        let mut acct = account();
        open_scenario_trade(&mut acct, 1_615_000_000);

        assert_eq!(acct.state(), AccountState::Open);
        assert!(acct.trade().is_some());
        assert_eq!(acct.stats().daily_trades, 1);
        assert_eq!(acct.stats().total_trades, 1);
    }

    #[test]
    fn test_open_rejected_while_a_trade_is_active() {
        let mut acct = account();
        open_scenario_trade(&mut acct, 1_615_000_000);

        let err = acct
            .open(
                TradeSide::Short,
                Price::from_str("59750").unwrap(),
                Price::from_str("60000").unwrap(),
                Price::from_str("59000").unwrap(),
                Decimal::new(4, 0),
                Decimal::new(1, 8),
                1_615_000_001,
            )
            .unwrap_err();
        assert!(matches!(err, AccountError::TradeAlreadyOpen));
        // Counters unchanged by the rejected attempt.
        assert_eq!(acct.stats().total_trades, 1);
    }

    #[test]
    fn test_zero_stop_distance_rejects_open_and_creates_no_trade() {
        let mut acct = account();
        let err = acct
            .open(
                TradeSide::Long,
                Price::from_str("59750").unwrap(),
                Price::from_str("59750").unwrap(),
                Price::from_str("60456").unwrap(),
                Decimal::new(4, 0),
                Decimal::new(1, 8),
                1_615_000_000,
            )
            .unwrap_err();

        assert!(matches!(err, AccountError::Sizing(_)));
        assert!(acct.trade().is_none());
        assert_eq!(acct.state(), AccountState::Flat);
        assert_eq!(acct.stats().total_trades, 0);
    }

    #[test]
    fn test_genuine_close_outside_grace_window() {
        // Scenario: open, then a zero-size report ten seconds later with
        // the settled wallet balance.
        let opened_at = 1_615_000_000;
        let mut acct = account();
        open_scenario_trade(&mut acct, opened_at);

        acct.position_update(&flat_report("0.00275322"), opened_at + 10)
            .unwrap();

        assert_eq!(acct.state(), AccountState::Flat);
        assert!(acct.trade().is_none());
        assert_eq!(acct.history().len(), 1);
        assert_eq!(acct.stats().balance, Decimal::new(275322, 8));
        // 0.02 -> 0.00275322 is a loss.
        assert_eq!(acct.stats().total_lost, 1);
        assert_eq!(acct.stats().daily_lost, 1);
        assert_eq!(acct.stats().total_won, 0);

        let closed = &acct.history()[0];
        assert_eq!(closed.close_timestamp, Some(opened_at + 10));
        let result = closed.result.as_ref().unwrap();
        assert_eq!(result.balance_before, Decimal::new(2, 2));
        assert_eq!(result.balance_after, Decimal::new(275322, 8));
        assert!(result.profit < Decimal::ZERO);
    }

    #[test]
    fn test_zero_size_echo_inside_grace_window_is_ignored() {
        // Scenario: the feed reports a zero position two seconds after the
        // open. That's the exchange's own race, not a close.
        let opened_at = 1_615_000_000;
        let mut acct = account();
        open_scenario_trade(&mut acct, opened_at);

        acct.position_update(&flat_report("0.00275322"), opened_at + 2)
            .unwrap();

        assert_eq!(acct.state(), AccountState::Open);
        assert!(acct.trade().is_some());
        assert!(acct.history().is_empty());
        assert_eq!(acct.stats().balance, Decimal::new(2, 2));
        assert_eq!(acct.stats().total_lost, 0);
        assert_eq!(acct.stats().total_won, 0);
    }

    #[test]
    fn test_grace_window_boundary_is_inclusive() {
        let opened_at = 1_615_000_000;
        let mut acct = account();
        open_scenario_trade(&mut acct, opened_at);

        // Exactly at the window edge: still treated as an echo.
        acct.position_update(&flat_report("0.00275322"), opened_at + 5)
            .unwrap();
        assert_eq!(acct.state(), AccountState::Open);

        // One second past the edge: genuine close.
        acct.position_update(&flat_report("0.00275322"), opened_at + 6)
            .unwrap();
        assert_eq!(acct.state(), AccountState::Flat);
    }

    #[test]
    fn test_winning_close_increments_won_counters() {
        let opened_at = 1_615_000_000;
        let mut acct = account();
        open_scenario_trade(&mut acct, opened_at);

        acct.position_update(&flat_report("0.025"), opened_at + 60)
            .unwrap();

        assert_eq!(acct.stats().total_won, 1);
        assert_eq!(acct.stats().daily_won, 1);
        assert_eq!(acct.stats().total_lost, 0);
        let result = acct.history()[0].result.as_ref().unwrap();
        assert!(result.profit > Decimal::ZERO);
    }

    #[test]
    fn test_settlement_failure_keeps_the_trade_open() {
        let opened_at = 1_615_000_000;
        let mut acct = account();
        open_scenario_trade(&mut acct, opened_at);

        // Flat report without a wallet balance: unusable for settlement.
        let report = PositionUpdate {
            size: Decimal::ZERO,
            side: None,
            entry_price: None,
            wallet_balance: None,
            exit_price: None,
            payload: Value::Null,
        };
        let err = acct.position_update(&report, opened_at + 10).unwrap_err();

        assert!(matches!(err, AccountError::Settlement(_)));
        assert_eq!(acct.state(), AccountState::Open);
        assert!(acct.trade().is_some());
        assert!(acct.history().is_empty());
        assert_eq!(acct.stats().balance, Decimal::new(2, 2));
    }

    #[test]
    fn test_flat_report_without_a_trade_is_a_noop() {
        let mut acct = account();
        acct.position_update(&flat_report("0.5"), 1_615_000_000)
            .unwrap();

        assert_eq!(acct.state(), AccountState::Flat);
        assert!(acct.history().is_empty());
        assert_eq!(acct.stats().balance, Decimal::new(2, 2));
    }

    #[test]
    fn test_live_report_refreshes_display_state_only() {
        let opened_at = 1_615_000_000;
        let mut acct = account();
        open_scenario_trade(&mut acct, opened_at);

        acct.position_update(&live_report(27000), opened_at + 1)
            .unwrap();

        assert_eq!(acct.state(), AccountState::Open);
        assert!(acct.trade().is_some());
        assert_eq!(acct.last_position().unwrap()["size"], 27000);
    }

    #[test]
    fn test_order_audit_map_upserts_and_fills() {
        let mut acct = account();

        let ack = OrderUpdate {
            order_id: "abc-1".to_string(),
            leaves_qty: Decimal::new(250, 0),
            order_status: Some("New".to_string()),
            payload: serde_json::json!({"order_id": "abc-1", "qty": 250}),
        };
        acct.record_order_ack(&ack);
        assert_eq!(acct.orders().len(), 1);
        assert_eq!(acct.orders()["abc-1"].status, OrderState::Open);

        // Duplicate ack updates in place, never grows the map.
        acct.record_order_ack(&ack);
        assert_eq!(acct.orders().len(), 1);

        // Partial fill leaves the order open.
        acct.record_execution(&ExecutionUpdate {
            order_id: "abc-1".to_string(),
            leaves_qty: Decimal::new(100, 0),
            exec_qty: Decimal::new(150, 0),
            payload: Value::Null,
        });
        assert_eq!(acct.orders()["abc-1"].status, OrderState::Open);
        assert_eq!(
            acct.orders()["abc-1"].leaves_qty,
            Qty::new(Decimal::new(100, 0))
        );

        // Full fill flips the status.
        acct.record_execution(&ExecutionUpdate {
            order_id: "abc-1".to_string(),
            leaves_qty: Decimal::ZERO,
            exec_qty: Decimal::new(100, 0),
            payload: Value::Null,
        });
        assert_eq!(acct.orders()["abc-1"].status, OrderState::Filled);
    }

    #[test]
    fn test_execution_for_unseen_order_inserts_audit_entry() {
        let mut acct = account();
        acct.record_execution(&ExecutionUpdate {
            order_id: "ghost-1".to_string(),
            leaves_qty: Decimal::ZERO,
            exec_qty: Decimal::new(50, 0),
            payload: Value::Null,
        });

        assert_eq!(acct.orders().len(), 1);
        assert_eq!(acct.orders()["ghost-1"].status, OrderState::Filled);
    }

    #[test]
    fn test_machine_is_reentrant_across_trades() {
        let mut acct = account();
        open_scenario_trade(&mut acct, 1_615_000_000);
        acct.position_update(&flat_report("0.025"), 1_615_000_060)
            .unwrap();

        open_scenario_trade(&mut acct, 1_615_000_120);
        assert_eq!(acct.state(), AccountState::Open);
        acct.position_update(&flat_report("0.024"), 1_615_000_300)
            .unwrap();

        assert_eq!(acct.history().len(), 2);
        assert_eq!(acct.stats().total_won, 1);
        assert_eq!(acct.stats().total_lost, 1);
        assert_eq!(acct.stats().total_trades, 2);
    }
}
