//! NCFX crypto streaming adapter
//!
//! Targets the `wss://cryptofeed.ws.newchangefx.com` API. The older
//! `wss://feed.newchangefx.com/cryptodata` API uses a different login reply
//! and batches prices into arrays, and is not handled here.
//!
//! Login:     `{"request":"login","username":"...","password":"..."}`
//! Ready:     `{"Type":"Info","Message":"Succesfully Authenticated"}`
//! Subscribe: `{"request":"subscribe","ccy":"ETH/USD"}`
//! Price:     `{"timestamp":"2023-01-31T20:10:41","currencyPair":"ETH/USD","bid":1595.4999,"offer":1595.5694,"mid":1595.5346}`

use crate::bridge::{
    finite_f64, parse_frame, Handshake, NormalizedResult, ProviderResult, SubscriptionKey,
    WireCodec,
};
use crate::config::Secret;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::{json, Value};

/// Default streaming endpoint
pub const DEFAULT_WS_URL: &str = "wss://cryptofeed.ws.newchangefx.com";

// Spelling is the provider's
const AUTHENTICATED_MESSAGE: &str = "Succesfully Authenticated";

/// Classified NCFX frame
#[derive(Debug, Clone, PartialEq)]
pub enum NcfxMessage {
    /// Informational message, e.g. login or subscription replies
    Info { message_type: String, message: String },
    /// Price update; any field may be missing on a noisy feed
    Price {
        currency_pair: String,
        bid: Option<f64>,
        offer: Option<f64>,
        mid: Option<f64>,
        timestamp: Option<String>,
    },
    Unknown,
}

impl NcfxMessage {
    /// Classify a frame by the fields it carries
    ///
    /// Any frame with a `Type` field counts as informational, checked before
    /// the price shape.
    pub fn classify(value: &Value) -> Self {
        if let Some(message_type) = value.get("Type") {
            return Self::Info {
                message_type: display_field(message_type),
                message: value.get("Message").map(display_field).unwrap_or_default(),
            };
        }

        match value.get("currencyPair").and_then(Value::as_str) {
            Some(pair) => Self::Price {
                currency_pair: pair.to_string(),
                bid: finite_f64(value, "bid"),
                offer: finite_f64(value, "offer"),
                mid: finite_f64(value, "mid"),
                timestamp: value
                    .get("timestamp")
                    .and_then(Value::as_str)
                    .map(String::from),
            },
            None => Self::Unknown,
        }
    }
}

fn display_field(value: &Value) -> String {
    value
        .as_str()
        .map_or_else(|| value.to_string(), String::from)
}

/// Convert a provider timestamp to epoch milliseconds
///
/// Offset-less timestamps such as `2023-01-31T20:10:41` are taken as UTC.
pub fn parse_timestamp_ms(raw: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp_millis());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive).timestamp_millis())
}

/// NCFX wire codec
#[derive(Debug, Clone, Copy, Default)]
pub struct NcfxCodec;

impl WireCodec for NcfxCodec {
    fn encode_subscribe(&self, key: &SubscriptionKey) -> Value {
        json!({"request": "subscribe", "ccy": key.to_string()})
    }

    fn encode_unsubscribe(&self, key: &SubscriptionKey) -> Value {
        json!({"request": "unsubscribe", "ccy": key.to_string()})
    }

    fn decode(&self, raw: &str) -> Vec<ProviderResult> {
        let Some(value) = parse_frame(raw) else {
            return vec![];
        };

        match NcfxMessage::classify(&value) {
            NcfxMessage::Info {
                message_type,
                message,
            } => {
                tracing::debug!("Received message {}: {}", message_type, message);
                vec![]
            }
            NcfxMessage::Price {
                currency_pair,
                bid: Some(bid),
                offer: Some(offer),
                mid: Some(mid),
                timestamp,
            } => {
                let Ok(key) = currency_pair.parse::<SubscriptionKey>() else {
                    tracing::debug!(pair = %currency_pair, "Unparseable currency pair, skipping");
                    return vec![];
                };
                let provider_ts = timestamp.as_deref().and_then(parse_timestamp_ms);
                NormalizedResult::new(key, mid)
                    .map(|result| {
                        ProviderResult::Price(
                            result
                                .with_bid_ask(bid, offer)
                                .with_provider_timestamp(provider_ts),
                        )
                    })
                    .into_iter()
                    .collect()
            }
            NcfxMessage::Price { .. } => {
                tracing::debug!("WS message does not contain valid data, skipping");
                vec![]
            }
            NcfxMessage::Unknown => {
                let preview: String = raw.chars().take(100).collect();
                tracing::trace!(preview = %preview, "Unrecognized message");
                vec![]
            }
        }
    }
}

/// NCFX handshake: send credentials, wait for the authenticated message
#[derive(Debug, Clone)]
pub struct NcfxHandshake {
    username: String,
    password: Secret,
}

impl NcfxHandshake {
    pub fn new(username: impl Into<String>, password: Secret) -> Self {
        Self {
            username: username.into(),
            password,
        }
    }
}

impl Handshake for NcfxHandshake {
    fn login_payload(&self) -> Option<Value> {
        Some(json!({
            "request": "login",
            "username": self.username,
            "password": self.password.expose(),
        }))
    }

    fn is_ready(&self, message: &Value) -> bool {
        message.get("Message").and_then(Value::as_str) == Some(AUTHENTICATED_MESSAGE)
    }
}
