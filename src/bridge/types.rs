//! Bridge data model: subscription keys, normalized results and connection state

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Fixed message attached to results for pairs the provider rejected
pub const INVALID_PAIR_MESSAGE: &str = "Could not retrieve valid data from Data Provider. This is likely an issue with the Data Provider or the input params/overrides";

/// HTTP-equivalent status for a provider-rejected pair
pub const INVALID_PAIR_STATUS: u16 = 400;

/// Identifies one logical price stream, e.g. ETH/USD
///
/// Symbols are case-sensitive and kept exactly as supplied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionKey {
    base: String,
    quote: String,
}

impl SubscriptionKey {
    /// Create a key from a base and quote symbol
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            quote: quote.into(),
        }
    }

    /// Base asset symbol
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Quote asset symbol
    pub fn quote(&self) -> &str {
        &self.quote
    }
}

impl fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

/// Error parsing a `BASE/QUOTE` pair
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid pair '{0}', expected BASE/QUOTE")]
pub struct ParseKeyError(String);

impl FromStr for SubscriptionKey {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().split_once('/') {
            Some((base, quote))
                if !base.is_empty() && !quote.is_empty() && !quote.contains('/') =>
            {
                Ok(Self::new(base, quote))
            }
            _ => Err(ParseKeyError(s.to_string())),
        }
    }
}

/// Side prices carried alongside the main value
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Auxiliary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bid: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ask: Option<f64>,
}

/// A single normalized price observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedResult {
    pub key: SubscriptionKey,
    pub value: f64,
    #[serde(default)]
    pub auxiliary: Auxiliary,
    /// Provider-indicated time in milliseconds since the Unix epoch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_timestamp_ms: Option<i64>,
}

impl NormalizedResult {
    /// Build a result, refusing values that are not finite
    pub fn new(key: SubscriptionKey, value: f64) -> Option<Self> {
        value.is_finite().then(|| Self {
            key,
            value,
            auxiliary: Auxiliary::default(),
            provider_timestamp_ms: None,
        })
    }

    /// Attach bid and ask prices
    pub fn with_bid_ask(mut self, bid: f64, ask: f64) -> Self {
        self.auxiliary = Auxiliary {
            bid: Some(bid),
            ask: Some(ask),
        };
        self
    }

    /// Attach the provider timestamp
    pub fn with_provider_timestamp(mut self, millis: Option<i64>) -> Self {
        self.provider_timestamp_ms = millis;
        self
    }
}

/// A per-pair failure reported by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResult {
    pub key: SubscriptionKey,
    pub status_code: u16,
    pub message: String,
}

impl ErrorResult {
    /// The result emitted when a provider rejects a pair
    pub fn invalid_pair(key: SubscriptionKey) -> Self {
        Self {
            key,
            status_code: INVALID_PAIR_STATUS,
            message: INVALID_PAIR_MESSAGE.to_string(),
        }
    }
}

/// Unit delivered to the result channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ProviderResult {
    Price(NormalizedResult),
    Error(ErrorResult),
}

impl ProviderResult {
    /// Key the result belongs to
    pub fn key(&self) -> &SubscriptionKey {
        match self {
            ProviderResult::Price(price) => &price.key,
            ProviderResult::Error(error) => &error.key,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ProviderResult::Error(_))
    }
}

/// Lifecycle of a bridge connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Created, not yet opened
    Idle,
    /// Transport connection in progress
    Connecting,
    /// Waiting for the provider's ready signal
    Authenticating,
    /// Accepting subscribe traffic
    Ready,
    /// Closed by the owner or by the remote end
    Closed,
    /// Open or handshake failed
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Authenticating => "authenticating",
            ConnectionState::Ready => "ready",
            ConnectionState::Closed => "closed",
            ConnectionState::Failed => "failed",
        };
        f.write_str(name)
    }
}
