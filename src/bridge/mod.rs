//! WebSocket subscription bridge
//!
//! A [`Bridge`] holds one open provider connection. It is generic over the
//! provider: each adapter supplies only a [`WireCodec`] and a [`Handshake`],
//! bundled as a [`ProviderPolicy`]. The [`Supervisor`] owns a bridge and
//! replaces it when the connection fails.

mod codec;
mod handshake;
mod subscription;
mod supervisor;
mod types;

pub use codec::WireCodec;
pub(crate) use codec::{finite_f64, parse_frame};
pub use handshake::{perform_handshake, Handshake, HandshakeError, DEFAULT_HANDSHAKE_TIMEOUT};
pub use subscription::{Bridge, BridgeConfig, BridgeError};
pub use supervisor::{Interest, ReconnectConfig, Supervisor, SupervisorError};
pub use types::{
    Auxiliary, ConnectionState, ErrorResult, NormalizedResult, ParseKeyError, ProviderResult,
    SubscriptionKey, INVALID_PAIR_MESSAGE, INVALID_PAIR_STATUS,
};

use crate::ws::redact_url;
use std::fmt;
use std::sync::Arc;

/// Everything provider-specific a bridge needs
#[derive(Clone)]
pub struct ProviderPolicy {
    /// Provider name used in logs and metrics
    pub name: &'static str,
    /// WebSocket URL, possibly carrying credentials in its query string
    pub url: String,
    pub codec: Arc<dyn WireCodec>,
    pub handshake: Arc<dyn Handshake>,
}

impl fmt::Debug for ProviderPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderPolicy")
            .field("name", &self.name)
            .field("url", &redact_url(&self.url))
            .finish_non_exhaustive()
    }
}
