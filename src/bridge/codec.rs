//! Wire codec seam between the bridge and a provider's message protocol

use super::types::{ProviderResult, SubscriptionKey};
use serde_json::Value;

/// Translates between subscription keys / normalized results and a
/// provider's wire frames
///
/// Implementations are pure: no I/O, no shared state. `decode` must never
/// panic; unknown or malformed frames yield no results.
pub trait WireCodec: Send + Sync {
    /// Frame that starts the price stream for `key`
    fn encode_subscribe(&self, key: &SubscriptionKey) -> Value;

    /// Frame that stops the price stream for `key`
    fn encode_unsubscribe(&self, key: &SubscriptionKey) -> Value;

    /// Decode one inbound frame into zero or more results
    fn decode(&self, raw: &str) -> Vec<ProviderResult>;
}

/// Parse a raw frame as JSON, logging and discarding anything else
pub(crate) fn parse_frame(raw: &str) -> Option<Value> {
    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(e) => {
            let preview: String = raw.chars().take(100).collect();
            tracing::trace!(error = %e, preview = %preview, "Dropping non-JSON frame");
            None
        }
    }
}

/// Read a field as a finite number
pub(crate) fn finite_f64(value: &Value, field: &str) -> Option<f64> {
    value.get(field)?.as_f64().filter(|v| v.is_finite())
}
