//! WebSocket types and configuration

use std::time::Duration;
use thiserror::Error;

/// WebSocket transport configuration
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// Interval for sending ping frames
    pub ping_interval: Duration,
    /// Time allowed for the TCP, TLS and upgrade exchange
    pub connect_timeout: Duration,
    /// Buffer size of the inbound and outbound frame channels
    pub buffer_size: usize,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            buffer_size: 1024,
        }
    }
}

impl WsConfig {
    /// Set ping interval
    pub fn ping_interval(mut self, d: Duration) -> Self {
        self.ping_interval = d;
        self
    }

    /// Set connect timeout
    pub fn connect_timeout(mut self, d: Duration) -> Self {
        self.connect_timeout = d;
        self
    }

    /// Set channel buffer size
    pub fn buffer_size(mut self, n: usize) -> Self {
        self.buffer_size = n.max(1);
        self
    }
}

/// Inbound WebSocket frames
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsMessage {
    /// Text message
    Text(String),
    /// Binary message
    Binary(Vec<u8>),
    /// The remote end or the transport closed the connection
    Closed,
}

/// WebSocket errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WsError {
    /// Connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    /// Channel closed
    #[error("Channel closed")]
    ChannelClosed,
    /// Send failed
    #[error("Send failed: {0}")]
    SendFailed(String),
}

/// Strip the query string from a URL so credentials never reach the logs
pub fn redact_url(url: &str) -> &str {
    url.split_once('?').map_or(url, |(base, _)| base)
}
