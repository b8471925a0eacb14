//! Configuration loader: resolves the YAML path, reads it and validates the result

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::AppError;

use super::types::AppConfig;

/// Default configuration file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Configuration path from `STRATEGY_CONFIG`, falling back to `config.yaml`
pub fn config_path() -> PathBuf {
    std::env::var("STRATEGY_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Resolve [`config_path`] and load it
///
/// Returns the resolved path alongside the config so the caller can log where
/// the status and params seeds came from.
pub fn load_default_config() -> Result<(PathBuf, AppConfig), AppError> {
    let path = config_path();
    let config = load_config(&path)?;
    Ok((path, config))
}

/// Load and validate configuration from a YAML file
///
/// A missing file is a `Config` error naming the path; other read failures
/// surface as `Io`.
pub fn load_config(path: &Path) -> Result<AppConfig, AppError> {
    let yaml = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => {
            AppError::Config(format!("Configuration file not found: {}", path.display()))
        }
        _ => AppError::Io(e),
    })?;

    parse_config(&yaml, &path.display().to_string())
}

/// Load configuration from an inline YAML document
pub fn load_config_from_str(yaml_content: &str) -> Result<AppConfig, AppError> {
    parse_config(yaml_content, "<inline>")
}

fn parse_config(yaml: &str, source: &str) -> Result<AppConfig, AppError> {
    let config: AppConfig = serde_yaml::from_str(yaml)
        .map_err(|e| AppError::Config(format!("YAML parse error in '{}': {}", source, e)))?;
    config.validate()?;
    Ok(config)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::{Kind, Value};
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const DEMO_CONFIG_YAML: &str = r#"
controller:
  lock_timeout_secs: 15
  publish_interval_ms: 1000
  publish_log_interval_ms: 1000
  log_step_delay_ms: 100
server:
  host: 127.0.0.1
  port: 8080
status:
  exchanges_connected: 4
  profitable_trades: 38
  overall_pnl_usd: 283
  fees_paid: 591
  trade_allow: true
params:
  binance_on: true
  huobi_on: true
  okx_leverage: 1.5
  bitmex_on: true
  max_positon: 10000
  trade_direction: OPEN
"#;

    #[test]
    fn test_load_config_from_str_valid() {
        let config = load_config_from_str(DEMO_CONFIG_YAML).unwrap();
        assert_eq!(config.controller.lock_timeout_secs, 15);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.status.len(), 5);
        assert_eq!(config.params.get("okx_leverage").map(Value::kind), Some(Kind::Float));
        assert_eq!(
            config.params.keys().collect::<Vec<_>>(),
            vec!["binance_on", "huobi_on", "okx_leverage", "bitmex_on", "max_positon", "trade_direction"]
        );
    }

    #[test]
    fn test_load_config_from_str_invalid_yaml() {
        let result = load_config_from_str("invalid: yaml: content: [");
        assert!(result.unwrap_err().to_string().contains("YAML parse error"));
    }

    #[test]
    fn test_nested_param_value_rejected() {
        let yaml = r#"
params:
  symbols: [BTC, ETH]
"#;
        assert!(load_config_from_str(yaml).is_err());
    }

    #[test]
    fn test_load_config_from_str_validation_failure() {
        let yaml = r#"
controller:
  lock_timeout_secs: 0
"#;
        let result = load_config_from_str(yaml);
        assert!(result.unwrap_err().to_string().contains("lock_timeout_secs"));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/path/config.yaml"));
        assert!(result.unwrap_err().to_string().contains("Configuration file not found"));
    }

    #[test]
    fn test_load_config_from_file_valid() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(DEMO_CONFIG_YAML.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.params.get("max_positon"), Some(&Value::Int(10000)));
    }

    #[test]
    fn test_load_config_from_file_invalid_yaml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"invalid: [yaml: content").unwrap();
        temp_file.flush().unwrap();

        let result = load_config(temp_file.path());
        assert!(result.unwrap_err().to_string().contains("YAML parse error"));
    }

    #[test]
    #[serial(env)]
    fn test_config_path_env_override() {
        std::env::remove_var("STRATEGY_CONFIG");
        assert_eq!(config_path(), PathBuf::from(DEFAULT_CONFIG_PATH));

        std::env::set_var("STRATEGY_CONFIG", "/etc/strategy/demo.yaml");
        assert_eq!(config_path(), PathBuf::from("/etc/strategy/demo.yaml"));

        std::env::remove_var("STRATEGY_CONFIG");
    }

    #[test]
    #[serial(env)]
    fn test_load_default_config_follows_env() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(DEMO_CONFIG_YAML.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        std::env::set_var("STRATEGY_CONFIG", temp_file.path());
        let (path, config) = load_default_config().unwrap();
        assert_eq!(path, temp_file.path());
        assert_eq!(config.status.get("fees_paid"), Some(&Value::Int(591)));

        std::env::set_var("STRATEGY_CONFIG", "/nonexistent/strategy.yaml");
        let err = load_default_config().unwrap_err();
        assert!(err.to_string().contains("/nonexistent/strategy.yaml"));

        std::env::remove_var("STRATEGY_CONFIG");
    }

    #[test]
    fn test_parse_error_names_source() {
        let err = load_config_from_str("invalid: yaml: content: [").unwrap_err();
        assert!(err.to_string().contains("<inline>"));

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"invalid: [yaml: content").unwrap();
        temp_file.flush().unwrap();
        let err = load_config(temp_file.path()).unwrap_err();
        assert!(err.to_string().contains(&temp_file.path().display().to_string()));
    }
}
