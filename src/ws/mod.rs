//! WebSocket transport
//!
//! A [`Transport`] opens a [`Connection`]: a pair of channels to a task that
//! owns the socket. The tungstenite-backed [`WsClient`] handles ping/pong
//! keepalive; [`MemoryTransport`] stands in for it in tests.

mod client;
mod connection;
mod memory;
mod types;

pub use client::WsClient;
pub use connection::{Connection, Transport};
pub use memory::{MemoryTransport, Peer};
pub use types::{redact_url, WsConfig, WsError, WsMessage};
