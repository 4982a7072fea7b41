use crate::bars::Timeframe;
use crate::types::Symbol;
use rust_decimal::Decimal;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Credential wrapper that never leaks the key through Debug or logs.
#[derive(Clone)]
pub struct SecretKey {
    key: String,
}

impl SecretKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    /// Get the raw key (use with caution)
    pub fn expose(&self) -> &str {
        &self.key
    }

    /// Load from an environment variable.
    pub fn from_env(var_name: &str) -> Result<Self, ConfigError> {
        let key =
            env::var(var_name).map_err(|_| ConfigError::Missing(var_name.to_string()))?;
        if key.is_empty() {
            return Err(ConfigError::Missing(var_name.to_string()));
        }
        Ok(Self::new(key))
    }

    /// Masked form for logging: first and last four characters only.
    pub fn mask(&self) -> String {
        if self.key.len() <= 8 {
            "****".to_string()
        } else {
            format!("{}...{}", &self.key[..4], &self.key[self.key.len() - 4..])
        }
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretKey").field("key", &self.mask()).finish()
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(String),
    Invalid(String, String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(var) => write!(f, "missing environment variable: {}", var),
            ConfigError::Invalid(var, value) => {
                write!(f, "invalid value for {}: {}", var, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Process configuration, loaded once at startup from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub symbol: Symbol,
    pub api_key: SecretKey,
    pub api_secret: SecretKey,
    pub testnet: bool,
    /// Percent of balance risked per trade.
    pub risk_fraction: Decimal,
    /// Take-profit distance as a multiple of the stop distance.
    pub tp_ratio: Decimal,
    /// Instrument quantity step for sizing.
    pub qty_step: Decimal,
    /// Timeframe whose confirmed bars drive signal evaluation.
    pub signal_timeframe: Timeframe,
    pub grace_window_secs: i64,
    pub bar_capacity: usize,
    pub read_timeout_secs: u64,
    pub ping_interval_secs: u64,
    pub reconnect_delay_secs: u64,
    /// Directory receiving the per-close trade exports.
    pub trades_dir: PathBuf,
    pub log_level: String,
    pub log_file: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            symbol: Symbol::new(env_or("SYMBOL", "BTCUSD")),
            api_key: SecretKey::from_env("BYBIT_API_KEY")?,
            api_secret: SecretKey::from_env("BYBIT_API_SECRET")?,
            testnet: parse_env("TESTNET", false)?,
            risk_fraction: parse_env("RISK_FRACTION", Decimal::new(4, 0))?,
            tp_ratio: parse_env("TP_RATIO", Decimal::new(95, 2))?,
            qty_step: parse_env("QTY_STEP", Decimal::ONE)?,
            signal_timeframe: signal_timeframe_from_env()?,
            grace_window_secs: parse_env("GRACE_WINDOW_SECS", 5)?,
            bar_capacity: parse_env("BAR_CAPACITY", 2000)?,
            read_timeout_secs: parse_env("READ_TIMEOUT_SECS", 10)?,
            ping_interval_secs: parse_env("PING_INTERVAL_SECS", 60)?,
            reconnect_delay_secs: parse_env("RECONNECT_DELAY_SECS", 5)?,
            trades_dir: PathBuf::from(env_or("TRADES_DIR", "trades")),
            log_level: env_or("LOG_LEVEL", "info"),
            log_file: env::var("LOG_FILE").ok(),
        })
    }
}

fn env_or(var: &str, default: &str) -> String {
    env::var(var).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T: FromStr>(var: &str, default: T) -> Result<T, ConfigError> {
    match env::var(var) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| ConfigError::Invalid(var.to_string(), raw)),
        Err(_) => Ok(default),
    }
}

fn signal_timeframe_from_env() -> Result<Timeframe, ConfigError> {
    match env::var("SIGNAL_TIMEFRAME") {
        Ok(raw) => Timeframe::from_wire_code(&raw)
            .ok_or_else(|| ConfigError::Invalid("SIGNAL_TIMEFRAME".to_string(), raw)),
        Err(_) => Ok(Timeframe::M15),
    }
}
