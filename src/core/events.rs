use crate::bars::Timeframe;
use crate::types::Timestamp;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use smallvec::SmallVec;
use std::fmt;

/// Exchange-assigned order identifier
pub type OrderId = String;

/// One streamed update of the currently forming bar. The exchange resends
/// the whole forming bar on every trade; a new `start` is the only signal
/// that the previous bar closed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KlineTick {
    pub start: Timestamp,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    #[serde(default)]
    pub volume: Decimal,
    #[serde(default)]
    pub turnover: Decimal,
}

/// Tick batches arrive one or two entries per frame.
pub type KlineTicks = SmallVec<[KlineTick; 2]>;

/// Position report from the private stream. `size == 0` is the close
/// signal the account machine reconciles against.
#[derive(Debug, Clone, Deserialize)]
pub struct PositionUpdate {
    #[serde(default)]
    pub size: Decimal,
    #[serde(default)]
    pub side: Option<String>,
    #[serde(default)]
    pub entry_price: Option<Decimal>,
    #[serde(default)]
    pub wallet_balance: Option<Decimal>,
    /// Price the position was closed at, when the feed provides it
    /// (simulated sessions always do).
    #[serde(default)]
    pub exit_price: Option<Decimal>,
    /// Full frame, kept for the audit trail.
    #[serde(skip)]
    pub payload: Value,
}

/// Order acknowledgement from the private stream.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderUpdate {
    pub order_id: OrderId,
    #[serde(default)]
    pub leaves_qty: Decimal,
    #[serde(default)]
    pub order_status: Option<String>,
    #[serde(skip)]
    pub payload: Value,
}

/// Fill report from the private stream.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionUpdate {
    pub order_id: OrderId,
    #[serde(default)]
    pub leaves_qty: Decimal,
    #[serde(default)]
    pub exec_qty: Decimal,
    #[serde(skip)]
    pub payload: Value,
}

/// Every message the stream can deliver, decoded once at the transport
/// boundary and matched exhaustively by the dispatcher.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    Kline {
        timeframe: Timeframe,
        ticks: KlineTicks,
    },
    Position(PositionUpdate),
    Order(OrderUpdate),
    Execution(ExecutionUpdate),
    /// Authentication acknowledgement; gates live signal action.
    AuthAck { success: bool },
    Pong,
}

/// Frame decoding failures. Unrecognized topics are errors, not silent
/// drops, so feed changes surface in the logs.
#[derive(Debug)]
pub enum DecodeError {
    Json(serde_json::Error),
    UnknownTopic(String),
    UnknownInterval(String),
    MissingData(&'static str),
    UnrecognizedFrame,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Json(e) => write!(f, "invalid JSON frame: {}", e),
            DecodeError::UnknownTopic(topic) => write!(f, "unknown topic: {}", topic),
            DecodeError::UnknownInterval(code) => write!(f, "unknown kline interval: {}", code),
            DecodeError::MissingData(field) => write!(f, "frame missing field: {}", field),
            DecodeError::UnrecognizedFrame => write!(f, "frame is neither topic data nor a known control ack"),
        }
    }
}

impl std::error::Error for DecodeError {}

impl From<serde_json::Error> for DecodeError {
    fn from(e: serde_json::Error) -> Self {
        DecodeError::Json(e)
    }
}

/// Decode one raw frame into a typed event.
///
/// `Ok(None)` means a recognized frame with no state to apply (subscribe
/// acks and similar control responses).
pub fn decode(raw: &str) -> Result<Option<StreamEvent>, DecodeError> {
    let value: Value = serde_json::from_str(raw)?;

    if let Some(topic) = value.get("topic").and_then(|t| t.as_str()) {
        let topic = topic.to_string();
        let data = value.get("data").ok_or(DecodeError::MissingData("data"))?;
        return decode_topic(&topic, data).map(Some);
    }

    if value.get("ret_msg").and_then(|m| m.as_str()) == Some("pong") {
        return Ok(Some(StreamEvent::Pong));
    }

    match value.pointer("/request/op").and_then(|op| op.as_str()) {
        Some("auth") => {
            let success = value
                .get("success")
                .and_then(|s| s.as_bool())
                .unwrap_or(false);
            Ok(Some(StreamEvent::AuthAck { success }))
        }
        // Subscribe and ping acks carry no state.
        Some(_) => Ok(None),
        None => Err(DecodeError::UnrecognizedFrame),
    }
}

fn decode_topic(topic: &str, data: &Value) -> Result<StreamEvent, DecodeError> {
    if let Some(rest) = topic.strip_prefix("klineV2.") {
        let code = rest.split('.').next().unwrap_or(rest);
        let timeframe = Timeframe::from_wire_code(code)
            .ok_or_else(|| DecodeError::UnknownInterval(code.to_string()))?;
        let ticks: KlineTicks = serde_json::from_value(data.clone())?;
        return Ok(StreamEvent::Kline { timeframe, ticks });
    }

    match topic {
        "position" => {
            let entry = first_entry(data)?;
            let mut update: PositionUpdate = serde_json::from_value(entry.clone())?;
            update.payload = entry.clone();
            Ok(StreamEvent::Position(update))
        }
        "order" => {
            let entry = first_entry(data)?;
            let mut update: OrderUpdate = serde_json::from_value(entry.clone())?;
            update.payload = entry.clone();
            Ok(StreamEvent::Order(update))
        }
        "execution" => {
            let entry = first_entry(data)?;
            let mut update: ExecutionUpdate = serde_json::from_value(entry.clone())?;
            update.payload = entry.clone();
            Ok(StreamEvent::Execution(update))
        }
        other => Err(DecodeError::UnknownTopic(other.to_string())),
    }
}

// Account topics wrap their single entry in an array; take the first.
fn first_entry(data: &Value) -> Result<&Value, DecodeError> {
    match data {
        Value::Array(entries) => entries.first().ok_or(DecodeError::MissingData("data[0]")),
        other => Ok(other),
    }
}
