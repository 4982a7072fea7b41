use crate::account::account::OrderRecord;
use crate::account::trade::Trade;
use crate::core::events::OrderId;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Trade-export failures. Logged by the caller; a failed export never
/// rolls back the in-memory close.
#[derive(Debug)]
pub enum ExportError {
    Io(std::io::Error),
    Serialize(serde_json::Error),
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::Io(e) => write!(f, "export io error: {}", e),
            ExportError::Serialize(e) => write!(f, "export serialize error: {}", e),
        }
    }
}

impl std::error::Error for ExportError {}

impl From<std::io::Error> for ExportError {
    fn from(e: std::io::Error) -> Self {
        ExportError::Io(e)
    }
}

impl From<serde_json::Error> for ExportError {
    fn from(e: serde_json::Error) -> Self {
        ExportError::Serialize(e)
    }
}

#[derive(Serialize)]
struct ExportRecord<'a> {
    trade: &'a Trade,
    orders: &'a HashMap<OrderId, OrderRecord>,
}

/// Write one closed trade and the order audit map as a JSON file named by
/// the close timestamp. One file per close, append-only audit log.
pub fn export_trade(
    dir: &Path,
    trade: &Trade,
    orders: &HashMap<OrderId, OrderRecord>,
) -> Result<PathBuf, ExportError> {
    fs::create_dir_all(dir)?;

    let close_ts = trade.close_timestamp.unwrap_or(trade.open_timestamp);
    let path = dir.join(format!("trade-{}.json", close_ts));

    let record = ExportRecord { trade, orders };
    let file = fs::File::create(&path)?;
    serde_json::to_writer_pretty(file, &record)?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::account::OrderState;
    use crate::account::trade::{TradeResult, TradeSide};
    use crate::types::{Price, Qty};
    use rust_decimal::Decimal;
    use serde_json::Value;

    #[test]
    fn test_export_writes_one_file_per_close() {
        let dir = std::env::temp_dir().join(format!("scalper-export-{}", std::process::id()));

        let mut trade = Trade::new(
            TradeSide::Long,
            Price::from_str("59750").unwrap(),
            Price::from_str("55000").unwrap(),
            Price::from_str("60456").unwrap(),
            Decimal::new(4, 0),
            Qty::new(Decimal::new(27000, 0)),
            1_615_000_000,
        );
        trade.close_timestamp = Some(1_615_000_600);
        trade.result = Some(TradeResult {
            profit: Decimal::new(-1, 3),
            percent: Decimal::new(-5, 0),
            balance_before: Decimal::new(2, 2),
            balance_after: Decimal::new(19, 3),
        });

        let mut orders = HashMap::new();
        orders.insert(
            "abc-1".to_string(),
            OrderRecord {
                status: OrderState::Filled,
                leaves_qty: Qty::ZERO,
                payload: serde_json::json!({"order_id": "abc-1"}),
            },
        );

        let path = export_trade(&dir, &trade, &orders).unwrap();
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "trade-1615000600.json"
        );

        let contents = fs::read_to_string(&path).unwrap();
        let value: Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(value["trade"]["side"], "long");
        assert_eq!(value["orders"]["abc-1"]["status"], "filled");

        fs::remove_dir_all(&dir).ok();
    }
}
