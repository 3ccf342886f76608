//! CLI interface for price-bridge
//!
//! Provides subcommands for:
//! - `stream`: Stream prices for a set of pairs
//! - `price`: Fetch a single price and exit
//! - `decode`: Run raw provider frames through a codec
//! - `config`: Show the effective configuration

mod decode;
mod price;
mod stream;

pub use decode::DecodeArgs;
pub use price::PriceArgs;
pub use stream::StreamArgs;

use crate::bridge::ProviderResult;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "price-bridge")]
#[command(about = "WebSocket price streaming bridge for CryptoCompare and NCFX")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Stream prices until interrupted
    Stream(StreamArgs),
    /// Wait for one price and print it
    Price(PriceArgs),
    /// Decode raw frames without connecting
    Decode(DecodeArgs),
    /// Show configuration
    Config,
}

/// Print a result as one JSON line on stdout
pub(crate) fn print_result(result: &ProviderResult) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string(result)?);
    Ok(())
}
