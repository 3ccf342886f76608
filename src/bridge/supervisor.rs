//! Supervisor: owns a bridge, replaces it after failures and replays interest

use super::subscription::{Bridge, BridgeConfig};
use super::types::{ProviderResult, SubscriptionKey};
use super::ProviderPolicy;
use crate::telemetry::{increment, CounterMetric};
use crate::ws::Transport;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Reconnection backoff settings
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Maximum reconnection attempts before giving up (0 = infinite)
    pub max_reconnect_attempts: u32,
    /// Initial delay before first reconnection attempt
    pub initial_reconnect_delay: Duration,
    /// Maximum delay between reconnection attempts
    pub max_reconnect_delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: 0,
            initial_reconnect_delay: Duration::from_secs(1),
            max_reconnect_delay: Duration::from_secs(60),
        }
    }
}

/// A change of interest in a price stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interest {
    Subscribe(SubscriptionKey),
    Unsubscribe(SubscriptionKey),
}

/// Supervisor errors
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("Maximum reconnection attempts exceeded ({0})")]
    MaxReconnectsExceeded(u32),
}

enum Served {
    InterestClosed,
    ConnectionLost,
}

/// Keeps one bridge alive for as long as anyone is interested
pub struct Supervisor {
    policy: ProviderPolicy,
    bridge_config: BridgeConfig,
    reconnect: ReconnectConfig,
    transport: Arc<dyn Transport>,
    results: mpsc::Sender<ProviderResult>,
}

impl Supervisor {
    pub fn new(
        policy: ProviderPolicy,
        transport: Arc<dyn Transport>,
        results: mpsc::Sender<ProviderResult>,
    ) -> Self {
        Self {
            policy,
            bridge_config: BridgeConfig::default(),
            reconnect: ReconnectConfig::default(),
            transport,
            results,
        }
    }

    /// Set bridge settings
    pub fn bridge_config(mut self, config: BridgeConfig) -> Self {
        self.bridge_config = config;
        self
    }

    /// Set reconnection backoff
    pub fn reconnect(mut self, config: ReconnectConfig) -> Self {
        self.reconnect = config;
        self
    }

    /// Run on a background task, returning the interest sender
    ///
    /// Dropping every clone of the sender shuts the supervisor down.
    pub fn spawn(
        self,
        buffer: usize,
    ) -> (
        mpsc::Sender<Interest>,
        JoinHandle<Result<(), SupervisorError>>,
    ) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let handle = tokio::spawn(self.run(rx));
        (tx, handle)
    }

    /// Connect, serve interest changes and inbound frames, reconnect on loss
    ///
    /// Returns `Ok(())` once the interest channel closes.
    pub async fn run(self, mut interest: mpsc::Receiver<Interest>) -> Result<(), SupervisorError> {
        let mut wanted: HashSet<SubscriptionKey> = HashSet::new();
        let mut attempts = 0u32;
        let mut delay = self.reconnect.initial_reconnect_delay;

        loop {
            let mut bridge = Bridge::new(
                self.policy.clone(),
                self.bridge_config.clone(),
                self.results.clone(),
            );

            match bridge.open(self.transport.as_ref()).await {
                Ok(()) => {
                    attempts = 0;
                    delay = self.reconnect.initial_reconnect_delay;

                    for key in &wanted {
                        if let Err(e) = bridge.subscribe(key) {
                            tracing::warn!(
                                provider = self.policy.name,
                                %key,
                                error = %e,
                                "Resubscribe failed"
                            );
                        }
                    }
                    if !wanted.is_empty() {
                        tracing::info!(
                            provider = self.policy.name,
                            count = wanted.len(),
                            "Restored subscriptions"
                        );
                    }

                    match Self::serve(&mut bridge, &mut interest, &mut wanted).await {
                        Served::InterestClosed => {
                            bridge.close();
                            return Ok(());
                        }
                        Served::ConnectionLost => {}
                    }
                }
                Err(e) => {
                    tracing::warn!(provider = self.policy.name, error = %e, "Bridge open failed");
                }
            }

            attempts += 1;
            if self.reconnect.max_reconnect_attempts > 0
                && attempts >= self.reconnect.max_reconnect_attempts
            {
                tracing::error!(
                    provider = self.policy.name,
                    attempts,
                    "Max reconnection attempts reached"
                );
                return Err(SupervisorError::MaxReconnectsExceeded(attempts));
            }

            increment(CounterMetric::Reconnects, self.policy.name);
            tracing::warn!(
                provider = self.policy.name,
                attempt = attempts,
                delay_ms = delay.as_millis() as u64,
                "Reconnecting..."
            );

            // Keep tracking interest while waiting so nothing is lost
            let sleep = tokio::time::sleep(delay);
            tokio::pin!(sleep);
            loop {
                tokio::select! {
                    _ = &mut sleep => break,
                    msg = interest.recv() => match msg {
                        Some(Interest::Subscribe(key)) => {
                            wanted.insert(key);
                        }
                        Some(Interest::Unsubscribe(key)) => {
                            wanted.remove(&key);
                        }
                        None => return Ok(()),
                    }
                }
            }

            delay = (delay * 2).min(self.reconnect.max_reconnect_delay);
        }
    }

    async fn serve(
        bridge: &mut Bridge,
        interest: &mut mpsc::Receiver<Interest>,
        wanted: &mut HashSet<SubscriptionKey>,
    ) -> Served {
        loop {
            tokio::select! {
                msg = interest.recv() => match msg {
                    Some(Interest::Subscribe(key)) => {
                        if let Err(e) = bridge.subscribe(&key) {
                            tracing::warn!(
                                provider = bridge.provider(),
                                %key,
                                error = %e,
                                "Subscribe failed"
                            );
                        }
                        wanted.insert(key);
                    }
                    Some(Interest::Unsubscribe(key)) => {
                        wanted.remove(&key);
                        if let Err(e) = bridge.unsubscribe(&key) {
                            tracing::warn!(
                                provider = bridge.provider(),
                                %key,
                                error = %e,
                                "Unsubscribe failed"
                            );
                        }
                    }
                    None => {
                        tracing::info!(
                            provider = bridge.provider(),
                            "Interest channel closed, shutting down"
                        );
                        return Served::InterestClosed;
                    }
                },
                outcome = bridge.process_next() => {
                    if let Err(e) = outcome {
                        tracing::warn!(provider = bridge.provider(), error = %e, "Bridge stopped");
                        return Served::ConnectionLost;
                    }
                }
            }
        }
    }
}
