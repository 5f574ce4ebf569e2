//! CampusChat - campus assistant chat CLI
//!
//! Main entry point for the CampusChat client application.

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use campuschat::cli::{Cli, Commands};
use campuschat::commands;
use campuschat::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize tracing
    init_tracing(cli.verbose);

    // Load configuration
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| "config/config.yaml".to_string());
    let config = Config::load(&config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    // Execute command; no subcommand means interactive chat
    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => {
            tracing::info!("Starting interactive chat mode");
            commands::chat::run_chat(config).await
        }
        Commands::Test => {
            tracing::info!("Running connection test");
            commands::diag::run_test(config).await
        }
        Commands::Quality => {
            tracing::info!("Probing network quality");
            commands::diag::run_quality(config).await
        }
    }
}

/// Initialize tracing subscriber with environment filter
fn init_tracing(verbosity: u8) {
    let default_filter = match verbosity {
        0 => "campuschat=info",
        1 => "campuschat=debug",
        _ => "trace",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
