//! Full engine flow over a scripted exchange session: seeding, auth
//! gating, signal-driven order intents, and resilience to undecodable
//! frames.

use crypto_scalper::account::{Account, LiveSettlement};
use crypto_scalper::bars::{Bar, BarAggregator, Timeframe};
use crypto_scalper::core::events::{DecodeError, KlineTick, PositionUpdate, StreamEvent};
use crypto_scalper::engine::{
    Engine, EngineConfig, EventLoop, EventLoopConfig, OrderIntent, OrderSide, SessionError,
};
use crypto_scalper::exchanges::MockSession;
use crypto_scalper::signal::{Direction, SignalDecision, SignalService};
use crypto_scalper::types::Price;
use rust_decimal::Decimal;
use serde_json::Value;
use smallvec::smallvec;

/// Deterministic stand-in for the indicator stack.
struct AlwaysLong;

impl SignalService for AlwaysLong {
    fn evaluate(&self, _bars: &BarAggregator) -> SignalDecision {
        SignalDecision::enter(Direction::Long, Decimal::new(450, 0))
    }
}

fn seed_bar(start: i64, close: &str) -> Bar {
    let close = Price::from_str(close).unwrap();
    Bar {
        start,
        open: close,
        high: close,
        low: close,
        close,
        volume: Decimal::new(10, 0),
        turnover: Decimal::ONE,
    }
}

fn kline(timeframe: Timeframe, start: i64, close: i64) -> StreamEvent {
    StreamEvent::Kline {
        timeframe,
        ticks: smallvec![KlineTick {
            start,
            open: Decimal::new(close, 0),
            high: Decimal::new(close + 50, 0),
            low: Decimal::new(close - 50, 0),
            close: Decimal::new(close, 0),
            volume: Decimal::new(10, 0),
            turnover: Decimal::ONE,
        }],
    }
}

fn flat_position() -> StreamEvent {
    StreamEvent::Position(PositionUpdate {
        size: Decimal::ZERO,
        side: None,
        entry_price: None,
        wallet_balance: Some(Decimal::new(99, 2)),
        exit_price: None,
        payload: Value::Null,
    })
}

fn engine() -> Engine {
    Engine::new(
        EngineConfig {
            qty_step: Decimal::new(1, 8),
            ..EngineConfig::default()
        },
        Account::new(Decimal::ONE, Box::new(LiveSettlement)),
        BarAggregator::new(2000),
        Box::new(AlwaysLong),
    )
}

fn seeded_session() -> MockSession {
    let mut session = MockSession::new();
    for tf in Timeframe::ALL {
        session.set_seed(tf, vec![seed_bar(0, "59000")]);
    }
    session
}

#[tokio::test]
async fn signal_on_confirmed_bar_places_entry_and_take_profit() {
    let mut session = seeded_session();
    session.push_event(StreamEvent::AuthAck { success: true });
    // Confirms the seeded 15m bar; the signal fires against its close.
    session.push_event(kline(Timeframe::M15, 900, 59_450));

    let mut event_loop = EventLoop::new(EventLoopConfig::default(), engine(), session);
    event_loop.run_session().await.unwrap();

    let submissions = event_loop.session().submissions();
    assert_eq!(submissions.len(), 2);
    match &submissions[0] {
        OrderIntent::Entry {
            side,
            qty,
            stop_loss,
        } => {
            assert_eq!(*side, OrderSide::Buy);
            assert!(qty.value() > Decimal::ZERO);
            // Entry at the confirmed close (59000), stop 450 below.
            assert_eq!(*stop_loss, Price::from_str("58550").unwrap());
        }
        other => panic!("expected entry, got {:?}", other),
    }
    match &submissions[1] {
        OrderIntent::TakeProfit { side, price, .. } => {
            assert_eq!(*side, OrderSide::Sell);
            assert_eq!(*price, Price::from_str("59427.50").unwrap());
        }
        other => panic!("expected take-profit, got {:?}", other),
    }

    assert!(!event_loop.engine().account().is_flat());
    assert_eq!(event_loop.session().connects(), 1);
    assert!(event_loop.session().pings() >= 1);
}

#[tokio::test]
async fn unauthenticated_session_never_trades() {
    let mut session = seeded_session();
    // No auth ack: bars confirm but signals must not act.
    session.push_event(kline(Timeframe::M15, 900, 59_450));
    session.push_event(kline(Timeframe::M15, 1_800, 59_500));

    let mut event_loop = EventLoop::new(EventLoopConfig::default(), engine(), session);
    event_loop.run_session().await.unwrap();

    assert!(event_loop.session().submissions().is_empty());
    assert!(event_loop.engine().account().is_flat());
    assert_eq!(event_loop.engine().bars().buffer(Timeframe::M15).len(), 3);
}

#[tokio::test]
async fn undecodable_frames_are_dropped_and_the_loop_stays_live() {
    let mut session = seeded_session();
    session.push_event(StreamEvent::AuthAck { success: true });
    session.push_error(SessionError::Decode(DecodeError::UnknownTopic(
        "orderBookL2_25.BTCUSD".to_string(),
    )));
    // Events after the bad frame still apply.
    session.push_event(kline(Timeframe::M15, 900, 59_450));

    let mut event_loop = EventLoop::new(EventLoopConfig::default(), engine(), session);
    event_loop.run_session().await.unwrap();

    assert_eq!(event_loop.session().submissions().len(), 2);
    assert!(!event_loop.engine().account().is_flat());
}

#[tokio::test]
async fn transport_errors_end_the_session() {
    let mut session = seeded_session();
    session.push_event(StreamEvent::AuthAck { success: true });
    session.push_error(SessionError::Transport("connection reset".to_string()));
    // Nothing past the fatal error is consumed.
    session.push_event(kline(Timeframe::M15, 900, 59_450));

    let mut event_loop = EventLoop::new(EventLoopConfig::default(), engine(), session);
    let err = event_loop.run_session().await.unwrap_err();

    assert!(err.is_fatal());
    assert!(event_loop.session().submissions().is_empty());
}

#[tokio::test]
async fn flat_position_report_cancels_working_orders() {
    let mut session = seeded_session();
    session.push_event(StreamEvent::AuthAck { success: true });
    session.push_event(kline(Timeframe::M15, 900, 59_450));
    // The exchange reports the position flat right after the entry; the
    // engine flattens working orders either way, while the grace window
    // shields the just-opened trade from the stale echo itself.
    session.push_event(flat_position());

    let mut event_loop = EventLoop::new(EventLoopConfig::default(), engine(), session);
    event_loop.run_session().await.unwrap();

    let submissions = event_loop.session().submissions();
    assert_eq!(submissions.len(), 3);
    assert_eq!(submissions[2], OrderIntent::CancelAll);
    assert!(!event_loop.engine().account().is_flat());
}
