use anyhow::Context;
use clap::Parser;
use price_bridge::cli::{Cli, Commands};
use price_bridge::config::Config;
use price_bridge::router;
use price_bridge::ws::redact_url;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::load(&cli.config).or_else(|e| {
        eprintln!("Warning: Could not load config from {}: {}", cli.config, e);
        eprintln!("Using default configuration");
        Config::from_toml(include_str!("../config.toml.example"))
            .context("Invalid bundled default config")
    })?;
    config.apply_env_overrides(|key| std::env::var(key).ok())?;

    // Initialize telemetry
    price_bridge::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Stream(args) => {
            config.validate()?;
            tracing::info!(provider = %config.provider.kind, "Starting price stream");
            args.execute(&config).await?;
        }
        Commands::Price(args) => {
            config.validate()?;
            args.execute(&config).await?;
        }
        Commands::Decode(args) => {
            args.execute().await?;
        }
        Commands::Config => {
            let policy = price_bridge::providers::policy(&config);
            println!("Current configuration:");
            println!("  Provider: {}", config.provider.kind);
            println!("  Route: {:?}", router::route(&config));
            println!("  Endpoint: {}", redact_url(&policy.url));
            println!(
                "  Handshake timeout: {}ms, reconnects: {}",
                config.bridge.handshake_timeout_ms,
                match config.bridge.max_reconnects {
                    0 => "unlimited".to_string(),
                    n => n.to_string(),
                }
            );
            println!("  Cache max age: {}s", config.cache.max_age_secs);
            match config.validate() {
                Ok(()) => println!("  Valid: yes"),
                Err(e) => println!("  Valid: no ({})", e),
            }
        }
    }

    Ok(())
}
