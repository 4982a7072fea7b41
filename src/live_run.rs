use crypto_scalper::{
    account::LiveSettlement,
    bars::BarAggregator,
    config::Config,
    engine::{Engine, EngineConfig, EventLoop, EventLoopConfig},
    exchanges::{BybitClient, BybitSession},
    init_logging,
    signal::HoldSignal,
    Account,
};
use log::info;
use tokio::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;
    init_logging(&config.log_level, config.log_file.as_deref())?;
    info!(
        "starting live bot for {} (testnet: {}, key {})",
        config.symbol,
        config.testnet,
        config.api_key.mask()
    );

    let client = BybitClient::new(
        config.api_key.clone(),
        config.api_secret.clone(),
        config.symbol.clone(),
        config.testnet,
    );

    let start_balance = client.get_wallet_balance(config.symbol.coin()).await?;
    info!("starting balance: {} {}", start_balance, config.symbol.coin());

    let account = Account::new(start_balance, Box::new(LiveSettlement))
        .with_export_dir(config.trades_dir.clone())
        .with_grace_window(config.grace_window_secs);
    let bars = BarAggregator::new(config.bar_capacity);

    let engine = Engine::new(
        EngineConfig {
            signal_timeframe: config.signal_timeframe,
            risk_fraction: config.risk_fraction,
            tp_ratio: config.tp_ratio,
            qty_step: config.qty_step,
        },
        account,
        bars,
        // Wiring point for a strategy implementation; the default service
        // keeps the engine observing without trading.
        Box::new(HoldSignal),
    );

    let session = BybitSession::new(client, config.testnet);
    let mut event_loop = EventLoop::new(
        EventLoopConfig {
            read_timeout: Duration::from_secs(config.read_timeout_secs),
            ping_interval: Duration::from_secs(config.ping_interval_secs),
            reconnect_delay: Duration::from_secs(config.reconnect_delay_secs),
        },
        engine,
        session,
    );

    event_loop.run().await;
    Ok(())
}
