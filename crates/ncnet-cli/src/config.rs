//! Network configuration loading for the CLI

use std::path::Path;

use anyhow::Context;
use ncnet_core::NetworkConfig;

use crate::error::{CliError, CliResult};

/// Load a network configuration, or the defaults when no file is given
pub fn load_network_config(path: Option<&Path>) -> CliResult<NetworkConfig> {
    let Some(path) = path else {
        tracing::debug!("No configuration file given, using defaults");
        return Ok(NetworkConfig::default());
    };
    if !path.exists() {
        return Err(CliError::missing_resource(format!(
            "configuration file {}",
            path.display()
        )));
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let config = NetworkConfig::from_toml_str(&content)
        .map_err(|e| CliError::config(format!("Invalid config file {}: {}", path.display(), e)))?;
    tracing::info!(
        "Loaded {} with {} inputs on a {}x{} grid",
        path.display(),
        config.feeds.len(),
        config.grid.x,
        config.grid.y
    );
    Ok(config)
}

/// Render a configuration as TOML
pub fn render_network_config(config: &NetworkConfig) -> CliResult<String> {
    config
        .to_toml_string()
        .map_err(|e| CliError::config(format!("Failed to serialize config: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_without_file() {
        let config = load_network_config(None).unwrap();
        assert_eq!(config, NetworkConfig::default());
    }

    #[test]
    fn test_missing_file() {
        let err = load_network_config(Some(Path::new("/nonexistent/ncnet.toml"))).unwrap_err();
        assert!(matches!(err, CliError::MissingResource(_)));
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "tstop = 120.0\n[grid]\nx = 2\ny = 2").unwrap();
        let config = load_network_config(Some(file.path())).unwrap();
        assert_eq!(config.tstop, 120.0);
        assert_eq!(config.grid.x, 2);
    }

    #[test]
    fn test_unreadable_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_network_config(Some(dir.path())).unwrap_err();
        assert!(matches!(err, CliError::Generic(_)));
        assert!(err.to_string().contains("reading"));
    }

    #[test]
    fn test_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "tstop = -5.0").unwrap();
        let err = load_network_config(Some(file.path())).unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
    }
}
