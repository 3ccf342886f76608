//! Transport seam: an opened connection and the trait that opens one

use super::types::{WsError, WsMessage};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

/// Opens connections to a provider endpoint
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a new connection to `url`
    async fn open(&self, url: &str) -> Result<Connection, WsError>;
}

/// One open connection
///
/// Inbound frames are buffered from the moment the connection exists, so a
/// greeting sent by the server immediately after open is never missed.
/// Dropping the outbound sender (via [`Connection::close`] or drop) tells the
/// transport task to close the socket.
#[derive(Debug)]
pub struct Connection {
    id: Uuid,
    outbound: Option<mpsc::Sender<String>>,
    inbound: mpsc::Receiver<WsMessage>,
}

impl Connection {
    /// Wrap the two halves of a transport
    pub fn new(outbound: mpsc::Sender<String>, inbound: mpsc::Receiver<WsMessage>) -> Self {
        Self {
            id: Uuid::new_v4(),
            outbound: Some(outbound),
            inbound,
        }
    }

    /// Connection id used in logs
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Queue a text frame without waiting for the socket
    pub fn send(&self, text: impl Into<String>) -> Result<(), WsError> {
        let outbound = self.outbound.as_ref().ok_or(WsError::ChannelClosed)?;
        outbound.try_send(text.into()).map_err(|e| match e {
            TrySendError::Full(_) => WsError::SendFailed("outbound buffer full".into()),
            TrySendError::Closed(_) => WsError::ChannelClosed,
        })
    }

    /// Wait for the next inbound frame; `None` once the transport is gone
    pub async fn recv(&mut self) -> Option<WsMessage> {
        self.inbound.recv().await
    }

    /// Close the connection. Returns false if it was already closed.
    pub fn close(&mut self) -> bool {
        let was_open = self.outbound.take().is_some();
        self.inbound.close();
        was_open
    }

    pub fn is_closed(&self) -> bool {
        self.outbound.as_ref().map_or(true, |tx| tx.is_closed())
    }
}
