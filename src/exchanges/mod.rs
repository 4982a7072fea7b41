pub mod bybit;
pub mod mock;

pub use bybit::{BybitClient, BybitError, BybitSession};
pub use mock::MockSession;
