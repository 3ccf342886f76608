//! Configuration types for price-bridge

use crate::bridge::{BridgeConfig, ReconnectConfig};
use crate::providers::{cryptocompare, ncfx, ProviderKind};
use crate::telemetry::LogFormat;
use crate::ws::WsConfig;
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// A credential that never shows up in logs
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw value, for building wire payloads only
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub cryptocompare: CryptoCompareConfig,
    #[serde(default)]
    pub ncfx: NcfxConfig,
    #[serde(default)]
    pub bridge: BridgeSettings,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Which provider to run
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::CryptoCompare,
        }
    }
}

/// CryptoCompare settings
#[derive(Debug, Clone, Deserialize)]
pub struct CryptoCompareConfig {
    #[serde(default = "default_cryptocompare_ws")]
    pub ws_api_endpoint: String,

    /// REST base URL used when streaming is disabled
    #[serde(default = "default_cryptocompare_rest")]
    pub api_endpoint: String,

    #[serde(default)]
    pub api_key: Secret,

    /// Streaming key; falls back to `api_key` when empty
    #[serde(default)]
    pub ws_api_key: Option<Secret>,

    #[serde(default = "default_true")]
    pub ws_enabled: bool,

    /// REST polling interval (seconds)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

impl CryptoCompareConfig {
    /// Key used on the streaming URL
    pub fn streaming_key(&self) -> &Secret {
        match &self.ws_api_key {
            Some(key) if !key.is_empty() => key,
            _ => &self.api_key,
        }
    }
}

impl Default for CryptoCompareConfig {
    fn default() -> Self {
        Self {
            ws_api_endpoint: default_cryptocompare_ws(),
            api_endpoint: default_cryptocompare_rest(),
            api_key: Secret::default(),
            ws_api_key: None,
            ws_enabled: true,
            poll_interval_secs: default_poll_interval(),
        }
    }
}

/// NCFX settings
#[derive(Debug, Clone, Deserialize)]
pub struct NcfxConfig {
    #[serde(default = "default_ncfx_ws")]
    pub ws_api_endpoint: String,

    #[serde(default)]
    pub api_username: String,

    #[serde(default)]
    pub api_password: Secret,

    /// NCFX is streaming-only; must stay enabled
    #[serde(default = "default_true")]
    pub ws_enabled: bool,
}

impl Default for NcfxConfig {
    fn default() -> Self {
        Self {
            ws_api_endpoint: default_ncfx_ws(),
            api_username: String::new(),
            api_password: Secret::default(),
            ws_enabled: true,
        }
    }
}

/// Bridge, transport and reconnection settings
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeSettings {
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,

    /// Capacity of the result delivery channel
    #[serde(default = "default_result_buffer")]
    pub result_buffer: usize,

    /// Maximum reconnection attempts (0 = infinite)
    #[serde(default)]
    pub max_reconnects: u32,

    #[serde(default = "default_initial_reconnect_delay_ms")]
    pub initial_reconnect_delay_ms: u64,

    #[serde(default = "default_max_reconnect_delay_ms")]
    pub max_reconnect_delay_ms: u64,

    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,

    /// Time allowed to establish the WebSocket
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_true() -> bool {
    true
}
fn default_cryptocompare_ws() -> String {
    cryptocompare::DEFAULT_WS_URL.to_string()
}
fn default_cryptocompare_rest() -> String {
    crate::rest::CRYPTOCOMPARE_REST_URL.to_string()
}
fn default_ncfx_ws() -> String {
    ncfx::DEFAULT_WS_URL.to_string()
}
fn default_poll_interval() -> u64 {
    10
}
fn default_handshake_timeout_ms() -> u64 {
    10_000
}
fn default_result_buffer() -> usize {
    1024
}
fn default_initial_reconnect_delay_ms() -> u64 {
    1_000
}
fn default_max_reconnect_delay_ms() -> u64 {
    60_000
}
fn default_ping_interval_secs() -> u64 {
    30
}
fn default_connect_timeout_ms() -> u64 {
    10_000
}
fn default_max_age_secs() -> u64 {
    90
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            handshake_timeout_ms: default_handshake_timeout_ms(),
            result_buffer: default_result_buffer(),
            max_reconnects: 0,
            initial_reconnect_delay_ms: default_initial_reconnect_delay_ms(),
            max_reconnect_delay_ms: default_max_reconnect_delay_ms(),
            ping_interval_secs: default_ping_interval_secs(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl BridgeSettings {
    pub fn bridge_config(&self) -> BridgeConfig {
        BridgeConfig {
            handshake_timeout: Duration::from_millis(self.handshake_timeout_ms),
        }
    }

    pub fn reconnect_config(&self) -> ReconnectConfig {
        ReconnectConfig {
            max_reconnect_attempts: self.max_reconnects,
            initial_reconnect_delay: Duration::from_millis(self.initial_reconnect_delay_ms),
            max_reconnect_delay: Duration::from_millis(self.max_reconnect_delay_ms),
        }
    }

    pub fn ws_config(&self) -> WsConfig {
        WsConfig::default()
            .ping_interval(Duration::from_secs(self.ping_interval_secs))
            .connect_timeout(Duration::from_millis(self.connect_timeout_ms))
    }
}

/// Result cache configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Results older than this are treated as missing
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_age_secs: default_max_age_secs(),
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
    /// Prometheus exporter port; no exporter when unset
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            metrics_port: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Apply adapter environment variables to the selected provider
    ///
    /// Recognised: `WS_API_ENDPOINT`, `API_ENDPOINT`, `API_KEY`, `WS_API_KEY`,
    /// `API_USERNAME`, `API_PASSWORD`, `WS_ENABLED`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let ws_enabled = lookup("WS_ENABLED")
            .map(|raw| {
                raw.trim()
                    .parse::<bool>()
                    .map_err(|_| {
                        ConfigError::Invalid(format!(
                            "WS_ENABLED must be true or false, got '{raw}'"
                        ))
                    })
            })
            .transpose()?;

        match self.provider.kind {
            ProviderKind::CryptoCompare => {
                let cc = &mut self.cryptocompare;
                if let Some(v) = lookup("WS_API_ENDPOINT") {
                    cc.ws_api_endpoint = v;
                }
                if let Some(v) = lookup("API_ENDPOINT") {
                    cc.api_endpoint = v;
                }
                if let Some(v) = lookup("API_KEY") {
                    cc.api_key = Secret::new(v);
                }
                if let Some(v) = lookup("WS_API_KEY") {
                    cc.ws_api_key = Some(Secret::new(v));
                }
                if let Some(v) = ws_enabled {
                    cc.ws_enabled = v;
                }
            }
            ProviderKind::Ncfx => {
                let nc = &mut self.ncfx;
                if let Some(v) = lookup("WS_API_ENDPOINT") {
                    nc.ws_api_endpoint = v;
                }
                if let Some(v) = lookup("API_USERNAME") {
                    nc.api_username = v;
                }
                if let Some(v) = lookup("API_PASSWORD") {
                    nc.api_password = Secret::new(v);
                }
                if let Some(v) = ws_enabled {
                    nc.ws_enabled = v;
                }
            }
        }
        Ok(())
    }

    /// Whether the selected provider streams over WebSocket
    pub fn ws_enabled(&self) -> bool {
        match self.provider.kind {
            ProviderKind::CryptoCompare => self.cryptocompare.ws_enabled,
            ProviderKind::Ncfx => self.ncfx.ws_enabled,
        }
    }

    /// Check the settings the selected provider needs to connect
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bridge.result_buffer == 0 {
            return Err(ConfigError::Invalid("bridge.result_buffer must be positive".into()));
        }
        if self.bridge.handshake_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "bridge.handshake_timeout_ms must be positive".into(),
            ));
        }

        match self.provider.kind {
            ProviderKind::CryptoCompare => {
                if self.cryptocompare.api_key.is_empty()
                    && self.cryptocompare.streaming_key().is_empty()
                {
                    return Err(ConfigError::Invalid("cryptocompare requires API_KEY".into()));
                }
                if !self.cryptocompare.ws_enabled && self.cryptocompare.poll_interval_secs == 0 {
                    return Err(ConfigError::Invalid(
                        "cryptocompare.poll_interval_secs must be positive".into(),
                    ));
                }
            }
            ProviderKind::Ncfx => {
                if !self.ncfx.ws_enabled {
                    return Err(ConfigError::Invalid(
                        "ncfx has no REST API, ws_enabled must be true".into(),
                    ));
                }
                if self.ncfx.api_username.is_empty() || self.ncfx.api_password.is_empty() {
                    return Err(ConfigError::Invalid(
                        "ncfx requires API_USERNAME and API_PASSWORD".into(),
                    ));
                }
            }
        }
        Ok(())
    }
}
