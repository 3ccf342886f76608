//! WebSocket transport backed by tokio-tungstenite with ping/pong keepalive

use super::connection::{Connection, Transport};
use super::types::{redact_url, WsConfig, WsError, WsMessage};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens real WebSocket connections
///
/// Each open spawns a task that owns the socket. The task ends when the
/// server closes, a pong is missed, or the [`Connection`] is closed.
/// Reconnection is left to the owner of the connection.
#[derive(Debug, Clone, Default)]
pub struct WsClient {
    config: WsConfig,
}

impl WsClient {
    /// Create a new WebSocket client with the given configuration
    pub fn new(config: WsConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WsConfig {
        &self.config
    }

    /// Pump frames between the socket and the connection channels
    async fn run_socket(
        ws_stream: Socket,
        config: WsConfig,
        inbound: mpsc::Sender<WsMessage>,
        mut outbound: mpsc::Receiver<String>,
    ) -> Result<(), WsError> {
        let (mut write, mut read) = ws_stream.split();

        let mut ping_interval = tokio::time::interval(config.ping_interval);
        ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut waiting_for_pong = false;

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            if inbound.send(WsMessage::Text(text)).await.is_err() {
                                tracing::debug!("Receiver dropped, closing connection");
                                return Ok(());
                            }
                        }
                        Some(Ok(Message::Binary(data))) => {
                            if inbound.send(WsMessage::Binary(data)).await.is_err() {
                                tracing::debug!("Receiver dropped, closing connection");
                                return Ok(());
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            write.send(Message::Pong(data)).await
                                .map_err(|e| WsError::SendFailed(e.to_string()))?;
                        }
                        Some(Ok(Message::Pong(_))) => {
                            waiting_for_pong = false;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            tracing::info!(?frame, "Received close frame");
                            return Ok(());
                        }
                        Some(Ok(Message::Frame(_))) => {}
                        Some(Err(e)) => {
                            return Err(WsError::ConnectionFailed(e.to_string()));
                        }
                        None => {
                            return Err(WsError::ConnectionFailed(
                                "Stream ended unexpectedly".into(),
                            ));
                        }
                    }
                }

                text = outbound.recv() => {
                    match text {
                        Some(text) => {
                            write.send(Message::Text(text)).await
                                .map_err(|e| WsError::SendFailed(e.to_string()))?;
                        }
                        None => {
                            // Connection closed by its owner
                            let _ = write.send(Message::Close(None)).await;
                            return Ok(());
                        }
                    }
                }

                _ = ping_interval.tick() => {
                    if waiting_for_pong {
                        return Err(WsError::ConnectionFailed("Pong timeout".into()));
                    }
                    write.send(Message::Ping(vec![])).await
                        .map_err(|e| WsError::SendFailed(e.to_string()))?;
                    waiting_for_pong = true;
                }
            }
        }
    }
}

#[async_trait]
impl Transport for WsClient {
    async fn open(&self, url: &str) -> Result<Connection, WsError> {
        tracing::info!(url = %redact_url(url), "Connecting to WebSocket");

        let connect = tokio::time::timeout(self.config.connect_timeout, connect_async(url));
        let (ws_stream, _response) = connect
            .await
            .map_err(|_| {
                WsError::ConnectionFailed(format!(
                    "Connect timed out after {:?}",
                    self.config.connect_timeout
                ))
            })?
            .map_err(|e| WsError::ConnectionFailed(e.to_string()))?;

        let (inbound_tx, inbound_rx) = mpsc::channel(self.config.buffer_size);
        let (outbound_tx, outbound_rx) = mpsc::channel(self.config.buffer_size);
        let connection = Connection::new(outbound_tx, inbound_rx);
        let connection_id = connection.id();
        let config = self.config.clone();

        tokio::spawn(async move {
            let closed_tx = inbound_tx.clone();
            match Self::run_socket(ws_stream, config, inbound_tx, outbound_rx).await {
                Ok(()) => tracing::info!(%connection_id, "WebSocket connection closed"),
                Err(e) => tracing::warn!(%connection_id, error = %e, "WebSocket connection lost"),
            }
            let _ = closed_tx.send(WsMessage::Closed).await;
        });

        tracing::info!(%connection_id, "WebSocket connected");
        Ok(connection)
    }
}
