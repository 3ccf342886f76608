//! Provider adapters
//!
//! Each provider contributes a codec and a handshake; the bridge does the rest.

pub mod cryptocompare;
pub mod ncfx;

pub use cryptocompare::{CryptoCompareCodec, CryptoCompareHandshake, CryptoCompareMessage};
pub use ncfx::{NcfxCodec, NcfxHandshake, NcfxMessage};

use crate::bridge::{ProviderPolicy, WireCodec};
use crate::config::Config;
use clap::ValueEnum;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;

/// Supported providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[value(name = "cryptocompare")]
    CryptoCompare,
    Ncfx,
}

impl ProviderKind {
    /// Name used in logs and metrics
    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::CryptoCompare => "cryptocompare",
            ProviderKind::Ncfx => "ncfx",
        }
    }

    /// Codec for this provider, usable without any configuration
    pub fn codec(&self) -> Arc<dyn WireCodec> {
        match self {
            ProviderKind::CryptoCompare => Arc::new(CryptoCompareCodec),
            ProviderKind::Ncfx => Arc::new(NcfxCodec),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Build the bridge policy for the configured provider
pub fn policy(config: &Config) -> ProviderPolicy {
    let kind = config.provider.kind;
    match kind {
        ProviderKind::CryptoCompare => {
            let cc = &config.cryptocompare;
            ProviderPolicy {
                name: kind.name(),
                url: cryptocompare::ws_url(&cc.ws_api_endpoint, cc.streaming_key().expose()),
                codec: kind.codec(),
                handshake: Arc::new(CryptoCompareHandshake),
            }
        }
        ProviderKind::Ncfx => {
            let ncfx = &config.ncfx;
            ProviderPolicy {
                name: kind.name(),
                url: ncfx.ws_api_endpoint.clone(),
                codec: kind.codec(),
                handshake: Arc::new(NcfxHandshake::new(
                    ncfx.api_username.clone(),
                    ncfx.api_password.clone(),
                )),
            }
        }
    }
}
