use criterion::{black_box, criterion_group, criterion_main, Criterion};
use crypto_scalper::bars::{BarAggregator, Timeframe};
use crypto_scalper::core::events::{decode, KlineTick};
use rust_decimal::Decimal;

fn bench_frame_decoding(c: &mut Criterion) {
    let kline_frame = r#"{
        "topic": "klineV2.15.BTCUSD",
        "data": [{
            "start": 1615000500,
            "open": 59750.0,
            "high": 59900.5,
            "low": 59600.0,
            "close": 59800.0,
            "volume": 1200.0,
            "turnover": 0.02
        }]
    }"#;

    c.bench_function("decode_kline_frame", |b| {
        b.iter(|| {
            let event = decode(black_box(kline_frame)).unwrap();
            black_box(event)
        })
    });

    let position_frame = r#"{
        "topic": "position",
        "data": [{
            "symbol": "BTCUSD",
            "size": 27000,
            "side": "Buy",
            "entry_price": 59750.0,
            "wallet_balance": 0.02
        }]
    }"#;

    c.bench_function("decode_position_frame", |b| {
        b.iter(|| {
            let event = decode(black_box(position_frame)).unwrap();
            black_box(event)
        })
    });
}

fn bench_bar_ingestion(c: &mut Criterion) {
    fn tick(start: i64, close: i64) -> KlineTick {
        KlineTick {
            start,
            open: Decimal::new(close, 0),
            high: Decimal::new(close + 50, 0),
            low: Decimal::new(close - 50, 0),
            close: Decimal::new(close, 0),
            volume: Decimal::new(10, 0),
            turnover: Decimal::ONE,
        }
    }

    // Alternating intrabar updates and confirmations over a full buffer,
    // the steady-state shape of the live stream.
    c.bench_function("ingest_update_confirm_cycle", |b| {
        let mut agg = BarAggregator::new(2000);
        for i in 0..2000 {
            agg.ingest(Timeframe::M1, tick(i * 60, 59_800));
        }
        let mut start = 2000 * 60;
        b.iter(|| {
            agg.ingest(Timeframe::M1, black_box(tick(start, 59_820)));
            agg.ingest(Timeframe::M1, black_box(tick(start, 59_840)));
            start += 60;
            agg.ingest(Timeframe::M1, black_box(tick(start, 59_860)));
        })
    });
}

criterion_group!(benches, bench_frame_decoding, bench_bar_ingestion);
criterion_main!(benches);
