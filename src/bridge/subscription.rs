//! Subscription bridge: owns one provider connection and dispatches results

use super::handshake::{perform_handshake, HandshakeError, DEFAULT_HANDSHAKE_TIMEOUT};
use super::types::{ConnectionState, ProviderResult, SubscriptionKey};
use super::ProviderPolicy;
use crate::telemetry::{
    increment, record_latency, set_gauge, CounterMetric, GaugeMetric, LatencyMetric,
};
use crate::ws::{Connection, Transport, WsError, WsMessage};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Bridge settings
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Time allowed for the provider's ready signal
    pub handshake_timeout: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }
}

/// Bridge errors
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Bridge is {0}, expected ready")]
    NotReady(ConnectionState),

    #[error("Bridge can only be opened from idle, current state is {0}")]
    InvalidState(ConnectionState),

    #[error("Transport error: {0}")]
    Transport(#[from] WsError),

    #[error("Handshake failed: {0}")]
    Handshake(#[from] HandshakeError),

    #[error("Connection closed")]
    ConnectionClosed,
}

/// Holds one open provider connection
///
/// Subscribe and unsubscribe are fire-and-forget: providers never ack, so
/// results for a key simply start arriving through [`Bridge::process_next`].
/// Reconnection is the owner's job; a closed or failed bridge is discarded.
pub struct Bridge {
    policy: ProviderPolicy,
    config: BridgeConfig,
    state: ConnectionState,
    connection: Option<Connection>,
    active: HashSet<SubscriptionKey>,
    results: mpsc::Sender<ProviderResult>,
}

impl Bridge {
    /// Create an idle bridge delivering results to `results`
    pub fn new(
        policy: ProviderPolicy,
        config: BridgeConfig,
        results: mpsc::Sender<ProviderResult>,
    ) -> Self {
        Self {
            policy,
            config,
            state: ConnectionState::Idle,
            connection: None,
            active: HashSet::new(),
            results,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn provider(&self) -> &'static str {
        self.policy.name
    }

    /// Keys with a subscribe frame sent and no unsubscribe since
    pub fn active_keys(&self) -> impl Iterator<Item = &SubscriptionKey> {
        self.active.iter()
    }

    pub fn is_subscribed(&self, key: &SubscriptionKey) -> bool {
        self.active.contains(key)
    }

    /// Connect and run the provider handshake
    ///
    /// The bridge becomes `Ready` only once the handshake resolves. Any
    /// failure leaves it `Failed` with the connection released.
    pub async fn open(&mut self, transport: &dyn Transport) -> Result<(), BridgeError> {
        if self.state != ConnectionState::Idle {
            return Err(BridgeError::InvalidState(self.state));
        }

        self.state = ConnectionState::Connecting;
        let mut connection = match transport.open(&self.policy.url).await {
            Ok(connection) => connection,
            Err(e) => {
                self.state = ConnectionState::Failed;
                return Err(e.into());
            }
        };

        self.state = ConnectionState::Authenticating;
        let started = Instant::now();
        let handshake = perform_handshake(
            &mut connection,
            self.policy.handshake.as_ref(),
            self.config.handshake_timeout,
        )
        .await;

        if let Err(e) = handshake {
            tracing::warn!(
                provider = self.policy.name,
                connection_id = %connection.id(),
                error = %e,
                "Handshake failed"
            );
            connection.close();
            self.state = ConnectionState::Failed;
            increment(CounterMetric::HandshakeFailures, self.policy.name);
            return Err(e.into());
        }

        record_latency(LatencyMetric::Handshake, self.policy.name, started.elapsed());
        tracing::info!(
            provider = self.policy.name,
            connection_id = %connection.id(),
            "Connection ready"
        );
        self.connection = Some(connection);
        self.state = ConnectionState::Ready;
        Ok(())
    }

    /// Start streaming `key`; a no-op if it is already active
    pub fn subscribe(&mut self, key: &SubscriptionKey) -> Result<(), BridgeError> {
        let connection = self.ready_connection()?;

        if self.active.contains(key) {
            tracing::debug!(provider = self.policy.name, %key, "Already subscribed");
            return Ok(());
        }

        let frame = self.policy.codec.encode_subscribe(key);
        connection.send(frame.to_string())?;
        self.active.insert(key.clone());

        tracing::debug!(provider = self.policy.name, %key, "Subscribed");
        increment(CounterMetric::Subscribes, self.policy.name);
        set_gauge(
            GaugeMetric::ActiveSubscriptions,
            self.policy.name,
            self.active.len() as f64,
        );
        Ok(())
    }

    /// Stop streaming `key`; a no-op for keys that were never subscribed
    pub fn unsubscribe(&mut self, key: &SubscriptionKey) -> Result<(), BridgeError> {
        if !self.active.remove(key) {
            tracing::trace!(provider = self.policy.name, %key, "Unsubscribe for inactive key");
            return Ok(());
        }

        set_gauge(
            GaugeMetric::ActiveSubscriptions,
            self.policy.name,
            self.active.len() as f64,
        );

        let Ok(connection) = self.ready_connection() else {
            // Nothing to tell the provider about a connection that is gone
            return Ok(());
        };
        let frame = self.policy.codec.encode_unsubscribe(key);
        connection.send(frame.to_string())?;

        tracing::debug!(provider = self.policy.name, %key, "Unsubscribed");
        increment(CounterMetric::Unsubscribes, self.policy.name);
        Ok(())
    }

    /// Decode one inbound frame and deliver its results
    ///
    /// Returns the number of results delivered.
    pub fn on_message(&self, raw: &str) -> usize {
        increment(CounterMetric::FramesReceived, self.policy.name);
        tracing::trace!(provider = self.policy.name, frame = raw, "Got response from websocket");

        let results = self.policy.codec.decode(raw);
        if results.is_empty() {
            increment(CounterMetric::FramesIgnored, self.policy.name);
            return 0;
        }

        let mut delivered = 0;
        for result in results {
            let counter = if result.is_error() {
                CounterMetric::ErrorResults
            } else {
                CounterMetric::PriceResults
            };

            match self.results.try_send(result) {
                Ok(()) => {
                    delivered += 1;
                    increment(counter, self.policy.name);
                }
                Err(TrySendError::Full(result)) => {
                    tracing::warn!(
                        provider = self.policy.name,
                        key = %result.key(),
                        "Result channel full, dropping result"
                    );
                    increment(CounterMetric::ResultsDropped, self.policy.name);
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(provider = self.policy.name, "Result receiver dropped");
                    break;
                }
            }
        }
        delivered
    }

    /// Wait for the next inbound frame and route it through the codec
    ///
    /// When the transport goes away the bridge moves to `Closed` and
    /// `ConnectionClosed` is returned.
    pub async fn process_next(&mut self) -> Result<usize, BridgeError> {
        if self.state != ConnectionState::Ready {
            return Err(BridgeError::NotReady(self.state));
        }
        let Some(connection) = self.connection.as_mut() else {
            return Err(BridgeError::NotReady(self.state));
        };

        match connection.recv().await {
            Some(WsMessage::Text(text)) => Ok(self.on_message(&text)),
            Some(WsMessage::Binary(data)) => match String::from_utf8(data) {
                Ok(text) => Ok(self.on_message(&text)),
                Err(_) => {
                    tracing::trace!(provider = self.policy.name, "Dropping non-UTF-8 binary frame");
                    Ok(0)
                }
            },
            Some(WsMessage::Closed) | None => {
                tracing::warn!(provider = self.policy.name, "Connection closed by remote");
                self.close();
                Err(BridgeError::ConnectionClosed)
            }
        }
    }

    /// Close the connection; safe to call any number of times
    ///
    /// Pending callers are left to the result cache's timeout.
    pub fn close(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            connection.close();
            tracing::info!(
                provider = self.policy.name,
                connection_id = %connection.id(),
                active = self.active.len(),
                "Connection closed"
            );
        }
        if self.state != ConnectionState::Failed {
            self.state = ConnectionState::Closed;
        }
    }

    fn ready_connection(&self) -> Result<&Connection, BridgeError> {
        match (&self.state, &self.connection) {
            (ConnectionState::Ready, Some(connection)) => Ok(connection),
            _ => Err(BridgeError::NotReady(self.state)),
        }
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        self.close();
    }
}
