pub mod account;
pub mod export;
pub mod settlement;
pub mod stats;
pub mod trade;

pub use account::{Account, AccountError, AccountState, OrderRecord, OrderState};
pub use export::{export_trade, ExportError};
pub use settlement::{LiveSettlement, SettlementError, SettlementPolicy, SimulatedSettlement};
pub use stats::{AccountStats, CloseOutcome};
pub use trade::{Trade, TradeMeta, TradeResult, TradeSide};
