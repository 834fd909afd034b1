use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;
use toolrelay::mcp::TransportConfig;

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

/// Returns the path to the `mcp_test_server` binary.
///
/// Cargo sets `CARGO_BIN_EXE_mcp_test_server` when building integration
/// tests; the fallback covers running a test binary by hand.
#[allow(dead_code)]
pub fn test_server_exe() -> String {
    if let Some(p) = option_env!("CARGO_BIN_EXE_mcp_test_server") {
        return p.to_string();
    }
    if let Ok(manifest) = std::env::var("CARGO_MANIFEST_DIR") {
        let debug = PathBuf::from(manifest)
            .join("target")
            .join("debug")
            .join("mcp_test_server");
        if debug.exists() {
            return debug.to_string_lossy().into_owned();
        }
    }
    "mcp_test_server".to_string()
}

/// Stdio transport config for the test server with extra environment.
#[allow(dead_code)]
pub fn test_server_config(env: &[(&str, &str)]) -> TransportConfig {
    TransportConfig::Stdio {
        command: test_server_exe(),
        args: Vec::new(),
        env: env
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>(),
    }
}
