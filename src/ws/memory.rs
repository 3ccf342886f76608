//! In-memory transport for tests and offline tooling

use super::connection::{Connection, Transport};
use super::types::{WsError, WsMessage};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;

/// The remote side of an in-memory connection
#[derive(Debug)]
pub struct Peer {
    sent: mpsc::Receiver<String>,
    inbound: mpsc::Sender<WsMessage>,
}

impl Peer {
    /// Push a text frame to the connection as if the server sent it
    pub async fn push_text(&self, text: impl Into<String>) -> Result<(), WsError> {
        self.inbound
            .send(WsMessage::Text(text.into()))
            .await
            .map_err(|_| WsError::ChannelClosed)
    }

    /// Simulate the server closing the connection
    pub async fn close(&self) {
        let _ = self.inbound.send(WsMessage::Closed).await;
    }

    /// Next frame the connection sent, waiting if none is queued
    pub async fn next_sent(&mut self) -> Option<String> {
        self.sent.recv().await
    }

    /// Next frame the connection sent, if one is already queued
    pub fn try_next_sent(&mut self) -> Option<String> {
        self.sent.try_recv().ok()
    }

    /// Whether the connection side dropped its outbound sender with nothing
    /// left to read. Consumes a queued frame if there is one.
    pub fn is_disconnected(&mut self) -> bool {
        matches!(
            self.sent.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        )
    }
}

/// Hands out pre-made connections in order
///
/// Opening with no queued connection fails like an unreachable host.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    pending: Mutex<VecDeque<Connection>>,
    opened: AtomicUsize,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a connection for the next `open` and return its remote side
    pub fn push_connection(&self) -> Peer {
        let (out_tx, out_rx) = mpsc::channel(64);
        let (in_tx, in_rx) = mpsc::channel(64);
        if let Ok(mut pending) = self.pending.lock() {
            pending.push_back(Connection::new(out_tx, in_rx));
        }
        Peer {
            sent: out_rx,
            inbound: in_tx,
        }
    }

    /// Number of successful opens
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn open(&self, url: &str) -> Result<Connection, WsError> {
        let next = self
            .pending
            .lock()
            .map_err(|_| WsError::ConnectionFailed("transport lock poisoned".into()))?
            .pop_front();

        match next {
            Some(connection) => {
                self.opened.fetch_add(1, Ordering::SeqCst);
                Ok(connection)
            }
            None => Err(WsError::ConnectionFailed(format!(
                "no in-memory connection queued for {url}"
            ))),
        }
    }
}
