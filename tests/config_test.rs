//! Configuration loading tests
//!
//! These tests mutate `TOOLRELAY_*` environment variables, so every test
//! that loads a config runs under `#[serial]`.

mod common;

use serial_test::serial;

use toolrelay::cli::{Cli, Commands};
use toolrelay::config::Config;
use toolrelay::error::RelayError;
use toolrelay::mcp::TransportConfig;

use common::temp_config_file;

const ENV_VARS: [&str; 3] = [
    "TOOLRELAY_OLLAMA_HOST",
    "TOOLRELAY_OLLAMA_MODEL",
    "TOOLRELAY_MAX_ROUNDS",
];

fn clear_env() {
    for var in ENV_VARS {
        std::env::remove_var(var);
    }
}

fn chat_cli(model: Option<&str>, max_rounds: Option<u32>) -> Cli {
    Cli {
        config: None,
        verbose: false,
        command: Commands::Chat {
            message: "hello".to_string(),
            no_tools: false,
            framed: false,
            model: model.map(str::to_string),
            max_rounds,
        },
    }
}

const SAMPLE: &str = r#"
provider:
  ollama:
    host: http://gpu-box:11434
    model: qwen2.5
agent:
  max_rounds: 6
mcp:
  servers:
    - id: files
      name: Files
      transportType: stdio
      command: mcp-files
      args: ["--root", "/srv"]
      env:
        LOG_LEVEL: debug
      createdAt: 1700000000000
    - id: search
      name: Search
      transportType: http
      url: http://localhost:3000/mcp
      createdAt: 1700000000001
"#;

#[test]
#[serial]
fn test_file_values_load() {
    clear_env();
    let (_dir, path) = temp_config_file(SAMPLE);

    let config = Config::load(path.to_str().unwrap(), &Cli::default()).unwrap();
    config.validate().unwrap();

    assert_eq!(config.provider.ollama.host, "http://gpu-box:11434");
    assert_eq!(config.provider.ollama.model, "qwen2.5");
    assert_eq!(config.agent.max_rounds, 6);
    assert_eq!(config.mcp.servers.len(), 2);

    match config.mcp.servers[0].transport_config().unwrap() {
        TransportConfig::Stdio { command, args, env } => {
            assert_eq!(command, "mcp-files");
            assert_eq!(args, vec!["--root", "/srv"]);
            assert_eq!(env.get("LOG_LEVEL").map(String::as_str), Some("debug"));
        }
        other => panic!("expected stdio transport, got {other:?}"),
    }
    assert!(matches!(
        config.mcp.servers[1].transport_config().unwrap(),
        TransportConfig::Http { url } if url == "http://localhost:3000/mcp"
    ));
}

#[test]
#[serial]
fn test_env_overrides_file() {
    clear_env();
    let (_dir, path) = temp_config_file(SAMPLE);
    std::env::set_var("TOOLRELAY_OLLAMA_HOST", "http://other:11434");
    std::env::set_var("TOOLRELAY_OLLAMA_MODEL", "llama3.1");
    std::env::set_var("TOOLRELAY_MAX_ROUNDS", "3");

    let config = Config::load(path.to_str().unwrap(), &Cli::default()).unwrap();
    clear_env();

    assert_eq!(config.provider.ollama.host, "http://other:11434");
    assert_eq!(config.provider.ollama.model, "llama3.1");
    assert_eq!(config.agent.max_rounds, 3);
}

#[test]
#[serial]
fn test_invalid_env_round_limit_is_ignored() {
    clear_env();
    let (_dir, path) = temp_config_file(SAMPLE);
    std::env::set_var("TOOLRELAY_MAX_ROUNDS", "many");

    let config = Config::load(path.to_str().unwrap(), &Cli::default()).unwrap();
    clear_env();

    assert_eq!(config.agent.max_rounds, 6);
}

#[test]
#[serial]
fn test_cli_overrides_env() {
    clear_env();
    let (_dir, path) = temp_config_file(SAMPLE);
    std::env::set_var("TOOLRELAY_OLLAMA_MODEL", "llama3.1");
    std::env::set_var("TOOLRELAY_MAX_ROUNDS", "3");

    let config = Config::load(path.to_str().unwrap(), &chat_cli(Some("mistral"), Some(8))).unwrap();
    clear_env();

    assert_eq!(config.provider.ollama.model, "mistral");
    assert_eq!(config.agent.max_rounds, 8);
}

#[test]
#[serial]
fn test_out_of_range_round_limit_fails_validation() {
    clear_env();
    let (_dir, path) = temp_config_file("agent:\n  max_rounds: 500\n");

    let config = Config::load(path.to_str().unwrap(), &Cli::default()).unwrap();
    let err = config.validate().unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RelayError>(),
        Some(RelayError::Config(_))
    ));
}

#[test]
#[serial]
fn test_malformed_yaml_is_config_error() {
    clear_env();
    let (_dir, path) = temp_config_file("provider: [not, a, map");

    let err = Config::load(path.to_str().unwrap(), &Cli::default()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RelayError>(),
        Some(RelayError::Config(message)) if message.contains("Failed to parse config")
    ));
}

#[test]
#[serial]
fn test_duplicate_server_ids_fail_validation() {
    clear_env();
    let yaml = r#"
mcp:
  servers:
    - id: files
      name: Files
      transportType: stdio
      command: a
      createdAt: 1700000000000
    - id: files
      name: Files again
      transportType: stdio
      command: b
      createdAt: 1700000000000
"#;
    let (_dir, path) = temp_config_file(yaml);

    let config = Config::load(path.to_str().unwrap(), &Cli::default()).unwrap();
    assert!(config.validate().is_err());
}
