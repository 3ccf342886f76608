//! price-bridge: streaming price adapters over WebSocket
//!
//! This library provides the core components for:
//! - A provider-agnostic subscription bridge over one WebSocket connection
//! - CryptoCompare and NCFX wire codecs and handshakes
//! - Reconnection with subscription replay
//! - A result cache for one-shot lookups
//! - REST polling when streaming is disabled
//! - Structured logging and Prometheus metrics

pub mod bridge;
pub mod cache;
pub mod cli;
pub mod config;
pub mod providers;
pub mod rest;
pub mod router;
pub mod telemetry;
pub mod ws;
