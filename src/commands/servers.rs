//! Server record management handlers
//!
//! `servers list` shows each configured server with its connection status,
//! `servers export` prints the records as a JSON array and
//! `servers import` appends records from such an array to the config file.

use std::collections::HashMap;
use std::path::Path;

use super::{build_registry, connect_servers};
use crate::cli::ServerCommand;
use crate::config::Config;
use crate::error::{Result, RelayError};
use crate::mcp::records::{export_records, import_records, server_statuses, ServerRecord, ServerStatus};

/// Handle a `servers` subcommand
///
/// # Arguments
///
/// * `command` - The subcommand to execute
/// * `config` - Loaded configuration
/// * `config_path` - Where the configuration lives, for `import`
///
/// # Errors
///
/// Returns error if an import file is invalid or the config cannot be saved
pub async fn handle_servers(command: ServerCommand, config: Config, config_path: &str) -> Result<()> {
    match command {
        ServerCommand::List { probe } => {
            for line in list_servers(&config, probe).await {
                println!("{}", line);
            }
            Ok(())
        }
        ServerCommand::Export => {
            println!("{}", export_records(&config.mcp.servers)?);
            Ok(())
        }
        ServerCommand::Import { file } => {
            let imported = import_file(config, config_path, &file)?;
            for record in &imported {
                println!("Imported {} ({})", record.name, record.id);
            }
            Ok(())
        }
    }
}

/// Status lines for every configured server
///
/// With `probe` set each server is connected (and disconnected again) so
/// the status reflects whether it is reachable.
pub async fn list_servers(config: &Config, probe: bool) -> Vec<String> {
    if config.mcp.servers.is_empty() {
        return vec!["No servers configured.".to_string()];
    }

    let registry = build_registry(config);
    let failures = if probe {
        connect_servers(&registry, &config.mcp.servers).await
    } else {
        HashMap::new()
    };
    let statuses = server_statuses(&config.mcp.servers, &registry, &failures).await;
    registry.disconnect_all().await;

    statuses
        .iter()
        .map(|(record, status)| render_status(record, status))
        .collect()
}

fn render_status(record: &ServerRecord, status: &ServerStatus) -> String {
    let status = match status {
        ServerStatus::Disconnected => "disconnected".to_string(),
        ServerStatus::Connected { since } => format!("connected since {}", since.to_rfc3339()),
        ServerStatus::Error { detail } => format!("error: {}", detail),
    };
    format!(
        "{}  {}  [{}]  {}",
        record.id, record.name, record.transport_type, status
    )
}

/// Append the records in `file` to the configuration and save it
///
/// Nothing is written unless every record imports and the resulting
/// configuration validates.
///
/// # Errors
///
/// Returns `RelayError::Config` if the file cannot be read or is invalid
pub fn import_file(mut config: Config, config_path: &str, file: &Path) -> Result<Vec<ServerRecord>> {
    let contents = std::fs::read_to_string(file).map_err(|e| {
        RelayError::Config(format!("Failed to read {}: {}", file.display(), e))
    })?;
    let imported = import_records(&contents)?;
    config.mcp.servers.extend(imported.iter().cloned());
    config.validate()?;
    config.save(config_path)?;
    tracing::info!(
        "Imported {} server(s) into {}",
        imported.len(),
        config_path
    );
    Ok(imported)
}
