pub mod account;
pub mod bars;
pub mod config;
pub mod core;
pub mod engine;
pub mod exchanges;
pub mod risk;
pub mod signal;
pub mod types;

pub use account::{Account, AccountState, LiveSettlement, SimulatedSettlement, Trade, TradeSide};
pub use bars::{Bar, BarAggregator, IngestOutcome, Timeframe};
pub use config::{Config, SecretKey};
pub use self::core::events::{decode, StreamEvent};
pub use engine::{Engine, EngineConfig, EventLoop, EventLoopConfig, OrderIntent, OrderSide};
pub use exchanges::{BybitClient, BybitSession, MockSession};
pub use risk::{size_for, RiskError};
pub use signal::{Direction, HoldSignal, SignalDecision, SignalService};
pub use types::{Price, Qty, Symbol};

/// Initialize the fern logging dispatch: timestamped lines to stdout,
/// optionally mirrored to a log file.
pub fn init_logging(level: &str, logfile: Option<&str>) -> Result<(), fern::InitError> {
    let level = level
        .parse::<log::LevelFilter>()
        .unwrap_or(log::LevelFilter::Info);

    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} [{}] [{}] {}",
                chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stdout());

    if let Some(path) = logfile {
        dispatch = dispatch.chain(fern::log_file(path)?);
    }

    dispatch.apply()?;
    Ok(())
}
