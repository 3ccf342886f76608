//! CryptoCompare REST price client
//!
//! `GET {endpoint}/data/price?fsym=ETH&tsyms=USD` answers `{"USD":1595.5}`,
//! or `{"Response":"Error","Message":"..."}` for unknown pairs.

use super::{HttpPriceSource, RestError};
use crate::bridge::{ErrorResult, NormalizedResult, ProviderResult, SubscriptionKey};
use crate::config::Secret;
use crate::telemetry::{increment, record_latency, CounterMetric, LatencyMetric};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::{Duration, Instant};

/// Default REST base URL
pub const CRYPTOCOMPARE_REST_URL: &str = "https://min-api.cryptocompare.com";

const PROVIDER: &str = "cryptocompare";

/// Turn a `/data/price` response body into a result for `key`
pub fn parse_price_response(
    key: &SubscriptionKey,
    body: &Value,
) -> Result<ProviderResult, RestError> {
    if body.get("Response").and_then(Value::as_str) == Some("Error") {
        let message = body.get("Message").and_then(Value::as_str).unwrap_or_default();
        tracing::error!(%key, message, "asset not supported by data provider");
        return Ok(ProviderResult::Error(ErrorResult::invalid_pair(key.clone())));
    }

    body.get(key.quote())
        .and_then(Value::as_f64)
        .and_then(|price| NormalizedResult::new(key.clone(), price))
        .map(ProviderResult::Price)
        .ok_or_else(|| {
            RestError::UnexpectedResponse(format!("no finite {} price in {}", key.quote(), body))
        })
}

/// CryptoCompare `/data/price` client
pub struct CryptoCompareRest {
    base_url: String,
    api_key: Secret,
    client: Client,
}

impl CryptoCompareRest {
    pub fn new(base_url: impl Into<String>, api_key: Secret) -> Result<Self, RestError> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            base_url: base_url.into(),
            api_key,
            client,
        })
    }
}

#[async_trait]
impl HttpPriceSource for CryptoCompareRest {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    async fn fetch(&self, key: &SubscriptionKey) -> Result<ProviderResult, RestError> {
        let url = format!("{}/data/price", self.base_url.trim_end_matches('/'));
        tracing::debug!(url = %url, %key, "Fetching price");

        let started = Instant::now();
        let response = self
            .client
            .get(&url)
            .query(&[("fsym", key.base()), ("tsyms", key.quote())])
            .header("authorization", format!("Apikey {}", self.api_key.expose()))
            .send()
            .await
            .and_then(|r| r.error_for_status());

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                increment(CounterMetric::RestErrors, PROVIDER);
                return Err(e.into());
            }
        };

        let body: Value = response.json().await?;
        record_latency(LatencyMetric::RestRequest, PROVIDER, started.elapsed());

        parse_price_response(key, &body)
    }
}
