//! Feed routing: WebSocket supervisor or REST poller

use crate::bridge::{Interest, ProviderResult, Supervisor, SupervisorError, SubscriptionKey};
use crate::config::Config;
use crate::providers::{self, ProviderKind};
use crate::rest::{CryptoCompareRest, PricePoller, RestError};
use crate::ws::Transport;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const MIN_INTEREST_BUFFER: usize = 64;

/// How prices reach the result channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Streaming,
    Polling,
}

/// Pick the route for the configured provider
pub fn route(config: &Config) -> Route {
    if config.ws_enabled() {
        Route::Streaming
    } else {
        Route::Polling
    }
}

/// A running feed
pub enum Feed {
    Streaming {
        /// Send further interest changes here; dropping it stops the feed
        interest: mpsc::Sender<Interest>,
        handle: JoinHandle<Result<(), SupervisorError>>,
    },
    Polling {
        handle: JoinHandle<()>,
    },
}

impl Feed {
    /// Wait for the feed task to finish
    pub async fn join(self) -> anyhow::Result<()> {
        match self {
            Feed::Streaming { interest, handle } => {
                drop(interest);
                handle.await??;
            }
            Feed::Polling { handle } => handle.await?,
        }
        Ok(())
    }

    /// Stop the feed without waiting for a poller's next tick
    ///
    /// A streaming feed is drained as in [`Feed::join`], so a supervisor
    /// that already gave up still reports its error.
    pub async fn shutdown(self) -> anyhow::Result<()> {
        match self {
            Feed::Polling { handle } => {
                handle.abort();
                match handle.await {
                    Err(e) if !e.is_cancelled() => Err(e.into()),
                    _ => Ok(()),
                }
            }
            streaming => streaming.join().await,
        }
    }
}

/// Start delivering results for `keys` to `results`
pub fn spawn_feed(
    config: &Config,
    transport: Arc<dyn Transport>,
    keys: &[SubscriptionKey],
    results: mpsc::Sender<ProviderResult>,
) -> Result<Feed, RestError> {
    match route(config) {
        Route::Streaming => {
            let policy = providers::policy(config);
            tracing::info!(provider = policy.name, pairs = keys.len(), "Starting streaming feed");

            let (interest, handle) = Supervisor::new(policy, transport, results)
                .bridge_config(config.bridge.bridge_config())
                .reconnect(config.bridge.reconnect_config())
                .spawn(keys.len().max(MIN_INTEREST_BUFFER));

            for key in keys {
                if let Err(e) = interest.try_send(Interest::Subscribe(key.clone())) {
                    tracing::warn!(%key, error = %e, "Could not queue subscription");
                }
            }
            Ok(Feed::Streaming { interest, handle })
        }
        Route::Polling => {
            // Only CryptoCompare has a REST API; validation rejects NCFX here
            let cc = &config.cryptocompare;
            let source = CryptoCompareRest::new(cc.api_endpoint.clone(), cc.api_key.clone())?;
            tracing::info!(
                provider = ProviderKind::CryptoCompare.name(),
                pairs = keys.len(),
                interval_secs = cc.poll_interval_secs,
                "Starting polling feed"
            );

            let handle = PricePoller::new(
                Arc::new(source),
                keys.to_vec(),
                Duration::from_secs(cc.poll_interval_secs.max(1)),
                results,
            )
            .spawn();
            Ok(Feed::Polling { handle })
        }
    }
}
