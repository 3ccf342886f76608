//! Price command implementation

use crate::bridge::SubscriptionKey;
use crate::cache::ResultCache;
use crate::config::Config;
use crate::router::spawn_feed;
use crate::ws::WsClient;
use anyhow::Context;
use clap::Args;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Args, Debug)]
pub struct PriceArgs {
    /// Pair to price, e.g. ETH/USD
    #[arg(short, long)]
    pub pair: SubscriptionKey,

    /// Give up after this many seconds
    #[arg(short, long, default_value_t = 30)]
    pub timeout_secs: u64,
}

impl PriceArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let cache = Arc::new(
            ResultCache::new(Duration::from_secs(config.cache.max_age_secs))
                .provider(config.provider.kind.name()),
        );
        let (tx, rx) = mpsc::channel(config.bridge.result_buffer);
        let ingest = cache.spawn_ingest(rx);

        let transport = Arc::new(WsClient::new(config.bridge.ws_config()));
        let feed = spawn_feed(config, transport, std::slice::from_ref(&self.pair), tx)?;

        let entry = cache
            .wait_for(&self.pair, Duration::from_secs(self.timeout_secs))
            .await
            .with_context(|| format!("No price for {}", self.pair))?;
        println!("{}", serde_json::to_string(&entry)?);

        if let Err(e) = feed.shutdown().await {
            tracing::warn!(pair = %self.pair, error = %e, "Feed stopped with an error");
        }
        ingest.abort();

        if entry.result.is_error() {
            anyhow::bail!("Provider rejected {}", self.pair);
        }
        Ok(())
    }
}
