//! Connection lifecycle: provider login and ready detection

use crate::ws::{Connection, WsError, WsMessage};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Default time allowed for the provider to confirm readiness
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Provider-specific login/ready policy
pub trait Handshake: Send + Sync {
    /// Payload to send as soon as the connection opens, if the provider
    /// expects explicit credentials
    fn login_payload(&self) -> Option<Value> {
        None
    }

    /// Whether the first message from the provider is its ready signal
    fn is_ready(&self, message: &Value) -> bool;
}

/// Handshake failures; each is fatal for the connection attempt
#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("Unexpected message after WS connection open: {raw}")]
    Unexpected { raw: String },

    #[error("Malformed message after WS connection open: {raw}")]
    Malformed { raw: String },

    #[error("No ready message within {0:?}")]
    Timeout(Duration),

    #[error("Connection closed during handshake")]
    ConnectionClosed,

    #[error("Failed to send login payload: {0}")]
    Send(#[from] WsError),
}

/// Run the handshake on a freshly opened connection
///
/// Only the first qualifying frame is inspected: either it is the ready
/// signal, or the attempt fails carrying that frame for diagnostics.
pub async fn perform_handshake(
    connection: &mut Connection,
    handshake: &dyn Handshake,
    timeout: Duration,
) -> Result<(), HandshakeError> {
    if let Some(payload) = handshake.login_payload() {
        tracing::debug!(connection_id = %connection.id(), "Logging in WS connection");
        connection.send(payload.to_string())?;
    }

    let raw = tokio::time::timeout(timeout, first_text_frame(connection))
        .await
        .map_err(|_| HandshakeError::Timeout(timeout))?
        .ok_or(HandshakeError::ConnectionClosed)?;

    let message: Value =
        serde_json::from_str(&raw).map_err(|_| HandshakeError::Malformed { raw: raw.clone() })?;

    if handshake.is_ready(&message) {
        tracing::debug!(
            connection_id = %connection.id(),
            "Got logged in response, connection is ready"
        );
        Ok(())
    } else {
        Err(HandshakeError::Unexpected { raw })
    }
}

async fn first_text_frame(connection: &mut Connection) -> Option<String> {
    loop {
        match connection.recv().await? {
            WsMessage::Text(text) => return Some(text),
            WsMessage::Binary(data) => match String::from_utf8(data) {
                Ok(text) => return Some(text),
                Err(_) => tracing::trace!("Skipping non-UTF-8 binary frame during handshake"),
            },
            WsMessage::Closed => return None,
        }
    }
}
