//! Toolrelay - stream model replies with MCP tool calls
//!
#![doc = "Toolrelay - stream model replies with MCP tool calls"]
#![doc = "Main entry point for the toolrelay binary."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use toolrelay::cli::{Cli, Commands};
use toolrelay::commands;
use toolrelay::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    init_tracing(cli.verbose);

    // Load configuration
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| "config/config.yaml".to_string());
    let config = Config::load(&config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    // Execute command
    match cli.command {
        Commands::Chat {
            message,
            no_tools,
            framed,
            ..
        } => {
            tracing::info!("Starting chat");
            if no_tools {
                tracing::debug!("Tools disabled");
            }
            commands::chat::run_chat(config, message, no_tools, framed).await?;
            Ok(())
        }
        Commands::Tools => {
            tracing::info!("Listing tools");
            commands::tools::list_tools(&config).await?;
            Ok(())
        }
        Commands::Servers { command } => {
            tracing::info!("Starting server management command");
            commands::servers::handle_servers(command, config, &config_path).await?;
            Ok(())
        }
    }
}

/// Initialize tracing subscriber with environment filter
///
/// Logs go to stderr; stdout carries the event stream.
fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "toolrelay=debug"
    } else {
        "toolrelay=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
