use crate::bars::{Bar, Timeframe};
use crate::config::SecretKey;
use crate::core::events::{decode, OrderId, StreamEvent};
use crate::engine::dispatcher::{OrderIntent, OrderSide};
use crate::engine::event_loop::{ExchangeSession, SessionError};
use crate::types::{Price, Qty, Symbol, Timestamp};
use async_trait::async_trait;
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use hmac::{Hmac, Mac};
use log::{debug, info};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use sha2::Sha256;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

const REST_URL_MAIN: &str = "https://api.bybit.com";
const REST_URL_TEST: &str = "https://api-testnet.bybit.com";
const WS_URL_MAIN: &str = "wss://stream.bybit.com/realtime";
const WS_URL_TEST: &str = "wss://stream-testnet.bybit.com/realtime";

/// Kline history pages are capped by the exchange.
const KLINE_PAGE_LIMIT: usize = 200;

#[derive(Debug, Clone)]
pub enum BybitError {
    Network(String),
    Connection(String),
    Api(String),
    Parse(String),
}

impl fmt::Display for BybitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BybitError::Network(msg) => write!(f, "Network error: {}", msg),
            BybitError::Connection(msg) => write!(f, "Connection error: {}", msg),
            BybitError::Api(msg) => write!(f, "API error: {}", msg),
            BybitError::Parse(msg) => write!(f, "Parse error: {}", msg),
        }
    }
}

impl std::error::Error for BybitError {}

impl From<BybitError> for SessionError {
    fn from(e: BybitError) -> Self {
        SessionError::Http(e.to_string())
    }
}

fn sign(secret: &str, payload: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(payload.as_bytes());
    mac.finalize()
        .into_bytes()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

// Numbers in REST responses arrive as strings or JSON numbers depending
// on the endpoint; parse from the literal text either way.
fn decimal_field(value: &Value, key: &str) -> Option<Decimal> {
    let field = value.get(key)?;
    match field.as_str() {
        Some(s) => Decimal::from_str(s).ok(),
        None if field.is_number() => Decimal::from_str(&field.to_string()).ok(),
        None => None,
    }
}

/// REST client for the v2 API: kline history, wallet balance and order
/// placement, with HMAC-SHA256 request signing.
#[derive(Clone)]
pub struct BybitClient {
    api_key: SecretKey,
    api_secret: SecretKey,
    rest_url: String,
    symbol: Symbol,
    http: reqwest::Client,
}

impl BybitClient {
    pub fn new(api_key: SecretKey, api_secret: SecretKey, symbol: Symbol, testnet: bool) -> Self {
        let rest_url = if testnet { REST_URL_TEST } else { REST_URL_MAIN };
        Self {
            api_key,
            api_secret,
            rest_url: rest_url.to_string(),
            symbol,
            http: reqwest::Client::new(),
        }
    }

    /// Point the client at a different base URL (test harnesses).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.rest_url = url.into();
        self
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    /// Signature triple for the stream auth op.
    pub(crate) fn ws_auth(&self) -> (String, i64, String) {
        let expires = (Utc::now().timestamp() + 1000) * 1000;
        let signature = sign(
            self.api_secret.expose(),
            &format!("GET/realtime{}", expires),
        );
        (self.api_key.expose().to_string(), expires, signature)
    }

    // Sorted query string with api_key/timestamp folded in, signed last.
    fn signed_params(&self, mut params: BTreeMap<String, String>) -> BTreeMap<String, String> {
        params.insert("api_key".to_string(), self.api_key.expose().to_string());
        params.insert(
            "timestamp".to_string(),
            Utc::now().timestamp_millis().to_string(),
        );
        let param_str = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        let signature = sign(self.api_secret.expose(), &param_str);
        params.insert("sign".to_string(), signature);
        params
    }

    async fn get_json(&self, url: &str) -> Result<Value, BybitError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| BybitError::Network(e.to_string()))?;
        if !response.status().is_success() {
            return Err(BybitError::Api(format!("{}: {}", url, response.status())));
        }
        response
            .json()
            .await
            .map_err(|e| BybitError::Parse(e.to_string()))
    }

    /// Historical klines from `from` up to now, paging until the exchange
    /// returns a short page. Ascending by start.
    pub async fn get_hist_klines(
        &self,
        timeframe: Timeframe,
        from: Timestamp,
    ) -> Result<Vec<Bar>, BybitError> {
        let mut bars = Vec::new();
        let mut cursor = from;

        loop {
            let url = format!(
                "{}/v2/public/kline/list?symbol={}&interval={}&from={}&limit={}",
                self.rest_url,
                self.symbol,
                timeframe.wire_code(),
                cursor,
                KLINE_PAGE_LIMIT
            );
            let json = self.get_json(&url).await?;

            let entries = match json.get("result").and_then(|r| r.as_array()) {
                Some(entries) if !entries.is_empty() => entries.clone(),
                _ => break,
            };

            let page_len = entries.len();
            for entry in &entries {
                if let Some(bar) = parse_kline_entry(entry) {
                    bars.push(bar);
                }
            }

            // Next page starts one interval after the last entry returned.
            match entries
                .last()
                .and_then(|e| e.get("open_time"))
                .and_then(|t| t.as_i64())
            {
                Some(last_time) => cursor = last_time + timeframe.secs(),
                None => break,
            }
            if page_len < KLINE_PAGE_LIMIT {
                break;
            }
        }

        debug!(
            "get_hist_klines: {} {} bars from {}",
            bars.len(),
            timeframe,
            from
        );
        Ok(bars)
    }

    /// Available balance of the settlement coin.
    pub async fn get_wallet_balance(&self, coin: &str) -> Result<Decimal, BybitError> {
        let mut params = BTreeMap::new();
        params.insert("coin".to_string(), coin.to_string());
        let params = self.signed_params(params);

        let query = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        let url = format!("{}/v2/private/wallet/balance?{}", self.rest_url, query);
        let json = self.get_json(&url).await?;

        json.get("result")
            .and_then(|r| r.get(coin))
            .and_then(|c| decimal_field(c, "available_balance"))
            .ok_or_else(|| BybitError::Parse(format!("no balance for {}", coin)))
    }

    /// Place one active order. Market entries attach the stop loss;
    /// take-profit legs go out as reduce-only limits.
    pub async fn place_active_order(
        &self,
        side: OrderSide,
        order_type: &str,
        qty: Qty,
        price: Option<Price>,
        stop_loss: Option<Price>,
        reduce_only: bool,
    ) -> Result<OrderId, BybitError> {
        let mut params = BTreeMap::new();
        params.insert("symbol".to_string(), self.symbol.to_string());
        params.insert("side".to_string(), side.as_str().to_string());
        params.insert("order_type".to_string(), order_type.to_string());
        params.insert("qty".to_string(), qty.to_string());
        params.insert("time_in_force".to_string(), "GoodTillCancel".to_string());
        params.insert(
            "order_link_id".to_string(),
            uuid::Uuid::new_v4().to_string(),
        );
        if let Some(price) = price {
            params.insert("price".to_string(), price.to_string());
        }
        if let Some(stop_loss) = stop_loss {
            params.insert("stop_loss".to_string(), stop_loss.to_string());
        }
        if reduce_only {
            params.insert("reduce_only".to_string(), "true".to_string());
        }
        let params = self.signed_params(params);

        let url = format!("{}/v2/private/order/create", self.rest_url);
        let response = self
            .http
            .post(&url)
            .json(&params)
            .send()
            .await
            .map_err(|e| BybitError::Network(e.to_string()))?;
        if !response.status().is_success() {
            return Err(BybitError::Api(format!(
                "order create: {}",
                response.status()
            )));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| BybitError::Parse(e.to_string()))?;
        json.get("result")
            .and_then(|r| r.get("order_id"))
            .and_then(|id| id.as_str())
            .map(|id| id.to_string())
            .ok_or_else(|| BybitError::Parse("no order_id in response".to_string()))
    }

    /// Cancel every working order on the instrument.
    pub async fn cancel_all_orders(&self) -> Result<(), BybitError> {
        let mut params = BTreeMap::new();
        params.insert("symbol".to_string(), self.symbol.to_string());
        let params = self.signed_params(params);

        let url = format!("{}/v2/private/order/cancelAll", self.rest_url);
        let response = self
            .http
            .post(&url)
            .json(&params)
            .send()
            .await
            .map_err(|e| BybitError::Network(e.to_string()))?;
        if !response.status().is_success() {
            return Err(BybitError::Api(format!("cancelAll: {}", response.status())));
        }
        Ok(())
    }
}

// v2 kline entries: open_time plus string-encoded OHLCV.
fn parse_kline_entry(entry: &Value) -> Option<Bar> {
    Some(Bar {
        start: entry.get("open_time")?.as_i64()?,
        open: Price::new(decimal_field(entry, "open")?),
        high: Price::new(decimal_field(entry, "high")?),
        low: Price::new(decimal_field(entry, "low")?),
        close: Price::new(decimal_field(entry, "close")?),
        volume: decimal_field(entry, "volume").unwrap_or(Decimal::ZERO),
        turnover: decimal_field(entry, "turnover").unwrap_or(Decimal::ZERO),
    })
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Live exchange session: the authenticated stream plus the REST calls
/// the event loop makes around it.
pub struct BybitSession {
    client: BybitClient,
    ws_url: String,
    socket: Option<WsStream>,
}

impl BybitSession {
    pub fn new(client: BybitClient, testnet: bool) -> Self {
        let ws_url = if testnet { WS_URL_TEST } else { WS_URL_MAIN };
        Self {
            client,
            ws_url: ws_url.to_string(),
            socket: None,
        }
    }

    async fn send(&mut self, frame: Value) -> Result<(), SessionError> {
        let socket = self
            .socket
            .as_mut()
            .ok_or_else(|| SessionError::Transport("not connected".to_string()))?;
        socket
            .send(Message::Text(frame.to_string()))
            .await
            .map_err(|e| SessionError::Transport(e.to_string()))
    }
}

#[async_trait]
impl ExchangeSession for BybitSession {
    async fn connect(&mut self) -> Result<(), SessionError> {
        info!("connect: opening stream {}", self.ws_url);
        let (socket, _) = connect_async(self.ws_url.as_str())
            .await
            .map_err(|e| SessionError::Transport(e.to_string()))?;
        self.socket = Some(socket);

        let (api_key, expires, signature) = self.client.ws_auth();
        self.send(json!({"op": "auth", "args": [api_key, expires, signature]}))
            .await?;

        let symbol = self.client.symbol().clone();
        let mut args: Vec<String> = vec![
            "position".to_string(),
            "execution".to_string(),
            "order".to_string(),
        ];
        for tf in Timeframe::ALL {
            args.push(format!("klineV2.{}.{}", tf.wire_code(), symbol));
        }
        self.send(json!({"op": "subscribe", "args": args})).await?;

        Ok(())
    }

    async fn next_event(&mut self) -> Option<Result<StreamEvent, SessionError>> {
        let socket = self.socket.as_mut()?;
        loop {
            match socket.next().await {
                None => return None,
                Some(Err(e)) => return Some(Err(SessionError::Transport(e.to_string()))),
                Some(Ok(Message::Text(text))) => match decode(&text) {
                    Ok(Some(event)) => return Some(Ok(event)),
                    // Subscribe acks and similar carry no state.
                    Ok(None) => continue,
                    Err(e) => return Some(Err(SessionError::Decode(e))),
                },
                Some(Ok(Message::Ping(payload))) => {
                    if let Err(e) = socket.send(Message::Pong(payload)).await {
                        return Some(Err(SessionError::Transport(e.to_string())));
                    }
                }
                Some(Ok(Message::Pong(_))) => return Some(Ok(StreamEvent::Pong)),
                Some(Ok(Message::Close(_))) => return None,
                Some(Ok(_)) => continue,
            }
        }
    }

    async fn ping(&mut self) -> Result<(), SessionError> {
        self.send(json!({"op": "ping"})).await
    }

    async fn fetch_history(&mut self) -> Result<Vec<(Timeframe, Vec<Bar>)>, SessionError> {
        let now = Utc::now().timestamp();
        let mut seeds = Vec::with_capacity(Timeframe::ALL.len());
        for tf in Timeframe::ALL {
            let bars = self
                .client
                .get_hist_klines(tf, now - tf.seed_lookback())
                .await?;
            seeds.push((tf, bars));
        }
        Ok(seeds)
    }

    async fn submit(&mut self, intent: &OrderIntent) -> Result<(), SessionError> {
        match intent {
            OrderIntent::Entry {
                side,
                qty,
                stop_loss,
            } => {
                let order_id = self
                    .client
                    .place_active_order(*side, "Market", *qty, None, Some(*stop_loss), false)
                    .await?;
                info!("submit: market entry placed, order {}", order_id);
            }
            OrderIntent::TakeProfit { side, qty, price } => {
                let order_id = self
                    .client
                    .place_active_order(*side, "Limit", *qty, Some(*price), None, true)
                    .await?;
                info!("submit: take-profit leg placed, order {}", order_id);
            }
            OrderIntent::CancelAll => {
                self.client.cancel_all_orders().await?;
                info!("submit: cancelled all working orders");
            }
        }
        Ok(())
    }
}
