//! Logging setup for the control plane
//!
//! # Environment Variables
//! - `LOG_FORMAT`: Output format - `json` (default) or `pretty`
//! - `RUST_LOG`: Log level filter (default: `strategy_ctl=info`)

use std::sync::atomic::{AtomicBool, Ordering};

use tracing_subscriber::EnvFilter;

static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Default filter when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "strategy_ctl=info";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    /// Anything other than `pretty` selects JSON
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("pretty") {
            LogFormat::Pretty
        } else {
            LogFormat::Json
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Json,
            filter: DEFAULT_FILTER.to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn from_env() -> Self {
        let format = std::env::var("LOG_FORMAT")
            .map(|raw| LogFormat::parse(&raw))
            .unwrap_or(LogFormat::Json);
        let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_FILTER.to_string());
        Self { format, filter }
    }
}

/// Initialize logging from `LOG_FORMAT` / `RUST_LOG`
pub fn init_logging() {
    init_logging_with_config(&LoggingConfig::from_env());
}

/// Install the global subscriber once; later calls are no-ops
pub fn init_logging_with_config(config: &LoggingConfig) {
    if INITIALIZED.swap(true, Ordering::SeqCst) {
        return;
    }

    let env_filter =
        EnvFilter::try_new(&config.filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let result = match config.format {
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .pretty()
            .try_init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .json()
            .try_init(),
    };

    if let Err(e) = result {
        eprintln!("logging already initialized: {}", e);
    }
}

/// Test-writer subscriber; safe to call from every test
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("strategy_ctl=debug"))
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse(" PRETTY "), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse("compact"), LogFormat::Json);
    }

    #[test]
    #[serial(env)]
    fn test_from_env_defaults() {
        std::env::remove_var("LOG_FORMAT");
        std::env::remove_var("RUST_LOG");
        assert_eq!(LoggingConfig::from_env(), LoggingConfig::default());
    }

    #[test]
    #[serial(env)]
    fn test_from_env_overrides() {
        std::env::set_var("LOG_FORMAT", "pretty");
        std::env::set_var("RUST_LOG", "debug");
        let config = LoggingConfig::from_env();
        assert_eq!(config.format, LogFormat::Pretty);
        assert_eq!(config.filter, "debug");
        std::env::remove_var("LOG_FORMAT");
        std::env::remove_var("RUST_LOG");
    }

    #[test]
    fn test_init_is_idempotent() {
        init_test_logging();
        init_test_logging();
    }
}
