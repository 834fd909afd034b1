//! Command-line interface definition for Toolrelay
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for chat, tool listing and server record management.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Toolrelay - stream model replies with MCP tool calls
///
/// Connects to the configured MCP servers, lets the model call their tools
/// mid-reply, and writes the encoded event stream to stdout.
#[derive(Parser, Debug, Clone)]
#[command(name = "toolrelay")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for Toolrelay
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Send one message and stream the reply to stdout
    Chat {
        /// Message to send
        #[arg(short, long)]
        message: String,

        /// Do not offer tools to the model
        #[arg(long)]
        no_tools: bool,

        /// Write newline-delimited JSON events instead of the delimited stream
        #[arg(long)]
        framed: bool,

        /// Override the model from config
        #[arg(long)]
        model: Option<String>,

        /// Override the round limit from config
        #[arg(long)]
        max_rounds: Option<u32>,
    },

    /// List qualified tool names across the configured servers
    Tools,

    /// Manage configured MCP server records
    Servers {
        /// Server management subcommand
        #[command(subcommand)]
        command: ServerCommand,
    },
}

/// Server record subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ServerCommand {
    /// List configured servers and their connection status
    List {
        /// Try to connect to each server to report its status
        #[arg(long)]
        probe: bool,
    },

    /// Print configured servers as a JSON array
    Export,

    /// Add servers from an exported JSON array to the config file
    Import {
        /// Path to the exported JSON file
        file: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some("config/config.yaml".to_string()),
            verbose: false,
            command: Commands::Tools,
        }
    }
}
