//! CryptoCompare streaming adapter
//!
//! Frames are JSON objects with upper-case keys. Aggregate price updates
//! carry `TYPE == "5"`; not every update includes `PRICE`, since some
//! exchanges only report volume changes.
//!
//! Subscribe: `{"action":"SubAdd","subs":["5~CCCAGG~ETH~USD"]}`
//! Welcome:   `{"TYPE":"20","MESSAGE":"STREAMERWELCOME", ...}`
//! Price:     `{"TYPE":"5","FROMSYMBOL":"ETH","TOSYMBOL":"USD","PRICE":1595.5, ...}`
//! Rejected:  `{"TYPE":"500","MESSAGE":"INVALID_SUB","PARAMETER":"5~CCCAGG~ETH~XYZ", ...}`

use crate::bridge::{
    finite_f64, parse_frame, ErrorResult, Handshake, NormalizedResult, ProviderResult,
    SubscriptionKey, WireCodec,
};
use serde_json::{json, Value};

/// Default streaming endpoint
pub const DEFAULT_WS_URL: &str = "wss://streamer.cryptocompare.com/v2";

const AGGREGATE_INDEX_TYPE: &str = "5";
const WELCOME_MESSAGE: &str = "STREAMERWELCOME";
const INVALID_SUB_MESSAGE: &str = "INVALID_SUB";

/// Build the streaming URL; the API key travels in the query string
pub fn ws_url(endpoint: &str, api_key: &str) -> String {
    format!("{endpoint}?api_key={api_key}")
}

fn subscription_string(key: &SubscriptionKey) -> String {
    format!("5~CCCAGG~{}~{}", key.base(), key.quote())
}

/// Classified CryptoCompare frame
#[derive(Debug, Clone, PartialEq)]
pub enum CryptoCompareMessage {
    /// Provider rejected a subscription; `parameter` is the subscription string
    InvalidSubscription { parameter: String },
    /// Aggregate index update
    Price {
        from: Option<String>,
        to: Option<String>,
        price: Option<f64>,
    },
    /// Control message such as welcome, heartbeat or subscribe-complete
    Info {
        message_type: Option<String>,
        message: String,
    },
    Unknown,
}

impl CryptoCompareMessage {
    /// Classify a frame by the fields it carries
    pub fn classify(value: &Value) -> Self {
        let message = value.get("MESSAGE").and_then(Value::as_str);
        let message_type = value.get("TYPE").and_then(Value::as_str);

        if message == Some(INVALID_SUB_MESSAGE) {
            return Self::InvalidSubscription {
                parameter: value
                    .get("PARAMETER")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            };
        }

        if message_type == Some(AGGREGATE_INDEX_TYPE) {
            return Self::Price {
                from: value.get("FROMSYMBOL").and_then(Value::as_str).map(String::from),
                to: value.get("TOSYMBOL").and_then(Value::as_str).map(String::from),
                price: finite_f64(value, "PRICE"),
            };
        }

        match message {
            Some(message) => Self::Info {
                message_type: message_type.map(String::from),
                message: message.to_string(),
            },
            None => Self::Unknown,
        }
    }
}

/// Pull the pair out of a `5~CCCAGG~BASE~QUOTE` subscription string
fn key_from_parameter(parameter: &str) -> Option<SubscriptionKey> {
    let mut parts = parameter.split('~');
    let base = parts.nth(2)?;
    let quote = parts.next()?;
    (!base.is_empty() && !quote.is_empty()).then(|| SubscriptionKey::new(base, quote))
}

/// CryptoCompare wire codec
#[derive(Debug, Clone, Copy, Default)]
pub struct CryptoCompareCodec;

impl WireCodec for CryptoCompareCodec {
    fn encode_subscribe(&self, key: &SubscriptionKey) -> Value {
        json!({"action": "SubAdd", "subs": [subscription_string(key)]})
    }

    fn encode_unsubscribe(&self, key: &SubscriptionKey) -> Value {
        json!({"action": "SubRemove", "subs": [subscription_string(key)]})
    }

    fn decode(&self, raw: &str) -> Vec<ProviderResult> {
        let Some(value) = parse_frame(raw) else {
            return vec![];
        };

        match CryptoCompareMessage::classify(&value) {
            CryptoCompareMessage::Info {
                message_type,
                message,
            } => {
                tracing::debug!(
                    message_type = ?message_type,
                    message = %message,
                    "Received info message"
                );
                vec![]
            }
            CryptoCompareMessage::InvalidSubscription { parameter } => {
                match key_from_parameter(&parameter) {
                    Some(key) => {
                        tracing::error!(
                            %key,
                            parameter = %parameter,
                            "asset not supported by data provider"
                        );
                        vec![ProviderResult::Error(ErrorResult::invalid_pair(key))]
                    }
                    None => {
                        tracing::warn!(parameter = %parameter, "INVALID_SUB without a usable pair");
                        vec![]
                    }
                }
            }
            CryptoCompareMessage::Price {
                from: Some(from),
                to: Some(to),
                price: Some(price),
            } => NormalizedResult::new(SubscriptionKey::new(from, to), price)
                .map(ProviderResult::Price)
                .into_iter()
                .collect(),
            CryptoCompareMessage::Price { .. } => {
                tracing::trace!("Price update without price or symbols, skipping");
                vec![]
            }
            CryptoCompareMessage::Unknown => {
                let preview: String = raw.chars().take(100).collect();
                tracing::trace!(preview = %preview, "Unrecognized message");
                vec![]
            }
        }
    }
}

/// CryptoCompare handshake: no login frame, wait for the welcome message
#[derive(Debug, Clone, Copy, Default)]
pub struct CryptoCompareHandshake;

impl Handshake for CryptoCompareHandshake {
    fn is_ready(&self, message: &Value) -> bool {
        message.get("MESSAGE").and_then(Value::as_str) == Some(WELCOME_MESSAGE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{INVALID_PAIR_MESSAGE, INVALID_PAIR_STATUS};

    fn eth_usd() -> SubscriptionKey {
        SubscriptionKey::new("ETH", "USD")
    }

    #[test]
    fn test_encode_subscribe() {
        let frame = CryptoCompareCodec.encode_subscribe(&eth_usd());
        assert_eq!(frame, json!({"action": "SubAdd", "subs": ["5~CCCAGG~ETH~USD"]}));
    }

    #[test]
    fn test_encode_unsubscribe() {
        let frame = CryptoCompareCodec.encode_unsubscribe(&eth_usd());
        assert_eq!(frame, json!({"action": "SubRemove", "subs": ["5~CCCAGG~ETH~USD"]}));
    }

    #[test]
    fn test_ws_url() {
        assert_eq!(
            ws_url(DEFAULT_WS_URL, "abc"),
            "wss://streamer.cryptocompare.com/v2?api_key=abc"
        );
    }

    #[test]
    fn test_decode_price() {
        let results = CryptoCompareCodec
            .decode(r#"{"TYPE":"5","PRICE":1595.50,"FROMSYMBOL":"ETH","TOSYMBOL":"USD"}"#);

        assert_eq!(results.len(), 1);
        match &results[0] {
            ProviderResult::Price(price) => {
                assert_eq!(price.key, eth_usd());
                assert_eq!(price.value, 1595.50);
                assert_eq!(price.auxiliary.bid, None);
                assert_eq!(price.provider_timestamp_ms, None);
            }
            other => panic!("expected price, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_update_without_price_is_dropped() {
        let results = CryptoCompareCodec.decode(
            r#"{"TYPE":"5","MARKET":"CCCAGG","FROMSYMBOL":"ETH","TOSYMBOL":"USD","FLAGS":4,"VOLUMEDAY":12.5}"#,
        );
        assert!(results.is_empty());
    }

    #[test]
    fn test_decode_invalid_sub() {
        let results = CryptoCompareCodec.decode(
            r#"{"TYPE":"500","MESSAGE":"INVALID_SUB","PARAMETER":"5~CCCAGG~ETH~XYZ","INFO":"We have not integrated any of the exchanges in the pair"}"#,
        );

        assert_eq!(results.len(), 1);
        match &results[0] {
            ProviderResult::Error(error) => {
                assert_eq!(error.key, SubscriptionKey::new("ETH", "XYZ"));
                assert_eq!(error.status_code, INVALID_PAIR_STATUS);
                assert_eq!(error.message, INVALID_PAIR_MESSAGE);
            }
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_invalid_sub_without_pair() {
        let results = CryptoCompareCodec
            .decode(r#"{"TYPE":"500","MESSAGE":"INVALID_SUB","PARAMETER":"5~CCCAGG"}"#);
        assert!(results.is_empty());
    }

    #[test]
    fn test_decode_info_messages() {
        for frame in [
            r#"{"TYPE":"20","MESSAGE":"STREAMERWELCOME","SERVER_UPTIME_SECONDS":1}"#,
            r#"{"TYPE":"16","MESSAGE":"SUBSCRIBECOMPLETE","SUB":"5~CCCAGG~ETH~USD"}"#,
            r#"{"TYPE":"999","MESSAGE":"HEARTBEAT","TIMEMS":1675196441000}"#,
        ] {
            assert!(CryptoCompareCodec.decode(frame).is_empty(), "{frame}");
        }
    }

    #[test]
    fn test_decode_garbage() {
        assert!(CryptoCompareCodec.decode("not json").is_empty());
        assert!(CryptoCompareCodec.decode("[1,2,3]").is_empty());
        assert!(CryptoCompareCodec.decode(r#"{"foo":"bar"}"#).is_empty());
    }

    #[test]
    fn test_classify() {
        let value = json!({"TYPE": "5", "FROMSYMBOL": "BTC", "TOSYMBOL": "EUR"});
        assert_eq!(
            CryptoCompareMessage::classify(&value),
            CryptoCompareMessage::Price {
                from: Some("BTC".into()),
                to: Some("EUR".into()),
                price: None
            }
        );
        assert_eq!(
            CryptoCompareMessage::classify(&json!({"TYPE": "999"})),
            CryptoCompareMessage::Unknown
        );
    }

    #[test]
    fn test_handshake_ready() {
        let welcome = json!({"TYPE": "20", "MESSAGE": "STREAMERWELCOME"});
        let unauthorized = json!({"TYPE": "401", "MESSAGE": "UNAUTHORIZED"});
        assert!(CryptoCompareHandshake.is_ready(&welcome));
        assert!(!CryptoCompareHandshake.is_ready(&unauthorized));
        assert!(CryptoCompareHandshake.login_payload().is_none());
    }
}
