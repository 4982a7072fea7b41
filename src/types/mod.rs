pub mod price;
pub mod qty;
pub mod symbol;

pub use price::Price;
pub use qty::Qty;
pub use symbol::Symbol;

use rust_decimal::Decimal;

/// Unix timestamp in whole seconds (the resolution the exchange uses for
/// kline starts and account events).
pub type Timestamp = i64;

/// Percent change from `from` to `to`.
///
/// Returns zero when `from` is zero so drawdown tracking never divides by
/// an empty starting balance.
pub fn percent(from: Decimal, to: Decimal) -> Decimal {
    if from.is_zero() {
        return Decimal::ZERO;
    }
    (to - from) / from * Decimal::ONE_HUNDRED
}
