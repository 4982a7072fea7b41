use crate::account::{Account, TradeSide};
use crate::bars::{Bar, BarAggregator, IngestOutcome, Timeframe};
use crate::core::events::{KlineTicks, StreamEvent};
use crate::signal::{Direction, SignalService};
use crate::types::{Price, Qty, Timestamp};
use log::{debug, error, info, warn};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order side as the exchange spells it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn opposite(&self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "Buy",
            OrderSide::Sell => "Sell",
        }
    }
}

impl From<TradeSide> for OrderSide {
    fn from(side: TradeSide) -> Self {
        match side {
            TradeSide::Long => OrderSide::Buy,
            TradeSide::Short => OrderSide::Sell,
        }
    }
}

/// Orders the engine wants submitted. The engine only mutates local
/// state; actually talking to the exchange is the session's job.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderIntent {
    /// Market entry with a protective stop attached.
    Entry {
        side: OrderSide,
        qty: Qty,
        stop_loss: Price,
    },
    /// Reduce-only limit leg that takes profit on the open position.
    TakeProfit {
        side: OrderSide,
        qty: Qty,
        price: Price,
    },
    /// Flatten every working order (the position reported flat).
    CancelAll,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Timeframe whose confirmed bars drive bar-close bookkeeping and
    /// signal evaluation.
    pub signal_timeframe: Timeframe,
    /// Percent of balance risked per trade.
    pub risk_fraction: Decimal,
    /// Take-profit distance as a multiple of the stop distance.
    pub tp_ratio: Decimal,
    /// Instrument quantity step used by sizing.
    pub qty_step: Decimal,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            signal_timeframe: Timeframe::M15,
            risk_fraction: Decimal::new(4, 0),
            tp_ratio: Decimal::new(95, 2),
            qty_step: Decimal::ONE,
        }
    }
}

/// Routes decoded stream events to the bar aggregator and the account
/// machine, and turns signal decisions into order intents. All state is
/// plain owned data; the single event-loop task is the only caller.
pub struct Engine {
    config: EngineConfig,
    account: Account,
    bars: BarAggregator,
    signal: Box<dyn SignalService>,
    authenticated: bool,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        account: Account,
        bars: BarAggregator,
        signal: Box<dyn SignalService>,
    ) -> Self {
        Self {
            config,
            account,
            bars,
            signal,
            authenticated: false,
        }
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn bars(&self) -> &BarAggregator {
        &self.bars
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Replace a timeframe's buffer from REST history (startup and every
    /// reconnect).
    pub fn seed_bars(&mut self, timeframe: Timeframe, history: Vec<Bar>) {
        info!("seed_bars: {} bars for {}", history.len(), timeframe);
        self.bars.seed(timeframe, history);
    }

    /// Apply one decoded event and return the orders to submit. Events
    /// are applied atomically: an event that fails to apply changes
    /// nothing and the engine stays live for the next one.
    pub fn handle_event(&mut self, event: StreamEvent, now: Timestamp) -> Vec<OrderIntent> {
        match event {
            StreamEvent::Kline { timeframe, ticks } => self.on_kline(timeframe, ticks, now),
            StreamEvent::Position(update) => {
                let mut intents = Vec::new();
                if update.size.is_zero() && !self.account.is_flat() {
                    // A flat position leaves no reason to keep working
                    // orders alive.
                    intents.push(OrderIntent::CancelAll);
                }
                if let Err(e) = self.account.position_update(&update, now) {
                    error!("handle_event: position update not applied: {}", e);
                }
                intents
            }
            StreamEvent::Order(update) => {
                self.account.record_order_ack(&update);
                Vec::new()
            }
            StreamEvent::Execution(update) => {
                self.account.record_execution(&update);
                Vec::new()
            }
            StreamEvent::AuthAck { success } => {
                self.authenticated = success;
                if success {
                    info!("handle_event: stream authenticated, live trading enabled");
                } else {
                    warn!("handle_event: authentication failed, signals will not act");
                }
                Vec::new()
            }
            StreamEvent::Pong => {
                debug!("handle_event: pong");
                Vec::new()
            }
        }
    }

    fn on_kline(
        &mut self,
        timeframe: Timeframe,
        ticks: KlineTicks,
        now: Timestamp,
    ) -> Vec<OrderIntent> {
        let mut intents = Vec::new();
        for tick in ticks {
            let outcome = self.bars.ingest(timeframe, tick);
            if outcome == IngestOutcome::Confirmed && timeframe == self.config.signal_timeframe {
                intents.extend(self.on_bar_confirmed(now));
            }
        }
        intents
    }

    /// A signal-timeframe bar just closed: roll daily stats, then ask the
    /// signal service whether to enter.
    fn on_bar_confirmed(&mut self, now: Timestamp) -> Vec<OrderIntent> {
        let Some(bar) = self
            .bars
            .buffer(self.config.signal_timeframe)
            .last_confirmed()
            .copied()
        else {
            return Vec::new();
        };

        self.account.on_bar_close(bar.start);

        if !self.authenticated {
            debug!("on_bar_confirmed: not authenticated, skipping signal");
            return Vec::new();
        }
        if !self.account.is_flat() {
            debug!("on_bar_confirmed: trade active, skipping signal");
            return Vec::new();
        }
        if !self.bars.all_seeded() {
            debug!("on_bar_confirmed: buffers not fully seeded, skipping signal");
            return Vec::new();
        }

        let decision = self.signal.evaluate(&self.bars);
        let Some(direction) = decision.direction else {
            return Vec::new();
        };
        if decision.stop_distance <= Decimal::ZERO {
            warn!(
                "on_bar_confirmed: {:?} signal without a stop distance, ignoring",
                direction
            );
            return Vec::new();
        }

        let entry = bar.close;
        let (stop, take_profit) = match direction {
            Direction::Long => (
                entry - decision.stop_distance,
                entry + self.config.tp_ratio * decision.stop_distance,
            ),
            Direction::Short => (
                entry + decision.stop_distance,
                entry - self.config.tp_ratio * decision.stop_distance,
            ),
        };

        match self.account.open(
            TradeSide::from(direction),
            entry,
            stop,
            take_profit,
            self.config.risk_fraction,
            self.config.qty_step,
            now,
        ) {
            Ok(trade) => {
                let side = OrderSide::from(trade.side);
                info!(
                    "on_bar_confirmed: {:?} signal, entering {} {} @ {} (stop {}, tp {})",
                    direction, side.as_str(), trade.size, entry, stop, take_profit
                );
                vec![
                    OrderIntent::Entry {
                        side,
                        qty: trade.size,
                        stop_loss: stop,
                    },
                    OrderIntent::TakeProfit {
                        side: side.opposite(),
                        qty: trade.size,
                        price: take_profit,
                    },
                ]
            }
            Err(e) => {
                warn!("on_bar_confirmed: signal rejected: {}", e);
                Vec::new()
            }
        }
    }
}
