//! Stream command implementation

use super::print_result;
use crate::bridge::SubscriptionKey;
use crate::config::Config;
use crate::router::spawn_feed;
use crate::ws::WsClient;
use clap::Args;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Args, Debug)]
pub struct StreamArgs {
    /// Pairs to stream, e.g. ETH/USD,BTC/USD
    #[arg(short, long, value_delimiter = ',', required = true)]
    pub pairs: Vec<SubscriptionKey>,
}

impl StreamArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let (tx, mut rx) = mpsc::channel(config.bridge.result_buffer);
        let transport = Arc::new(WsClient::new(config.bridge.ws_config()));
        let feed = spawn_feed(config, transport, &self.pairs, tx)?;

        loop {
            tokio::select! {
                result = rx.recv() => match result {
                    Some(result) => print_result(&result)?,
                    None => break,
                },
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Interrupted, shutting down");
                    break;
                }
            }
        }

        drop(rx);
        feed.join().await
    }
}
