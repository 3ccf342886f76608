//! REST fallback for providers with streaming disabled

mod cryptocompare;
mod poller;

pub use cryptocompare::{parse_price_response, CryptoCompareRest, CRYPTOCOMPARE_REST_URL};
pub use poller::PricePoller;

use crate::bridge::{ProviderResult, SubscriptionKey};
use async_trait::async_trait;
use thiserror::Error;

/// REST errors
#[derive(Debug, Error)]
pub enum RestError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

/// One-shot price lookup over HTTP
#[async_trait]
pub trait HttpPriceSource: Send + Sync {
    /// Provider name used in logs and metrics
    fn provider(&self) -> &'static str;

    /// Fetch the current price for `key`
    ///
    /// Provider-side rejections come back as `Ok(ProviderResult::Error)`;
    /// `Err` means the request itself failed.
    async fn fetch(&self, key: &SubscriptionKey) -> Result<ProviderResult, RestError>;
}
