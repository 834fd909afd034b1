//! Configuration management for Toolrelay
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{Result, RelayError};
use crate::mcp::config::McpConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for Toolrelay
///
/// This structure holds all configuration needed for a run: the model
/// provider, the agentic loop limits and the MCP servers to connect to.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Model provider configuration
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Agentic loop configuration
    #[serde(default)]
    pub agent: LoopConfig,
    /// MCP client and server configuration
    #[serde(default)]
    pub mcp: McpConfig,
}

/// Provider configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Ollama configuration
    #[serde(default)]
    pub ollama: OllamaConfig,
}

/// Ollama provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Ollama server host
    #[serde(default = "default_ollama_host")]
    pub host: String,

    /// Model to use for Ollama
    #[serde(default = "default_ollama_model")]
    pub model: String,
}

fn default_ollama_host() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "llama3.2:latest".to_string()
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: default_ollama_host(),
            model: default_ollama_model(),
        }
    }
}

/// Agentic loop configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopConfig {
    /// Maximum number of generations per request
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,
}

fn default_max_rounds() -> u32 {
    10
}

/// Upper bound accepted for `agent.max_rounds`
pub const MAX_ROUNDS_LIMIT: u32 = 100;

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
        }
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Returns
    ///
    /// Returns the loaded and merged configuration
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| RelayError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| RelayError::Config(format!("Failed to parse config: {}", e)).into())
    }

    /// Write the configuration back as YAML
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written
    pub fn save(&self, path: &str) -> Result<()> {
        let contents = serde_yaml::to_string(self)?;
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, contents)
            .map_err(|e| RelayError::Config(format!("Failed to write config file: {}", e)))?;
        Ok(())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(ollama_host) = std::env::var("TOOLRELAY_OLLAMA_HOST") {
            self.provider.ollama.host = ollama_host;
        }

        if let Ok(ollama_model) = std::env::var("TOOLRELAY_OLLAMA_MODEL") {
            self.provider.ollama.model = ollama_model;
        }

        if let Ok(max_rounds) = std::env::var("TOOLRELAY_MAX_ROUNDS") {
            if let Ok(value) = max_rounds.parse() {
                self.agent.max_rounds = value;
            } else {
                tracing::warn!("Invalid TOOLRELAY_MAX_ROUNDS: {}", max_rounds);
            }
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if cli.verbose {
            tracing::debug!("Verbose mode enabled");
        }

        if let crate::cli::Commands::Chat {
            model, max_rounds, ..
        } = &cli.command
        {
            if let Some(model) = model {
                self.provider.ollama.model = model.clone();
            }
            if let Some(max_rounds) = max_rounds {
                self.agent.max_rounds = *max_rounds;
            }
        }
    }

    /// Validate the configuration
    ///
    /// Ensures all configuration values are within acceptable ranges
    /// and that required fields are properly set.
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        if self.provider.ollama.host.trim().is_empty() {
            return Err(RelayError::Config("ollama.host cannot be empty".to_string()).into());
        }

        if self.provider.ollama.model.trim().is_empty() {
            return Err(RelayError::Config("ollama.model cannot be empty".to_string()).into());
        }

        if self.agent.max_rounds == 0 {
            return Err(
                RelayError::Config("max_rounds must be greater than 0".to_string()).into(),
            );
        }

        if self.agent.max_rounds > MAX_ROUNDS_LIMIT {
            return Err(RelayError::Config(format!(
                "max_rounds must be less than or equal to {}",
                MAX_ROUNDS_LIMIT
            ))
            .into());
        }

        self.mcp.validate()
    }
}
