//! Configuration module: YAML loading, env-overridable constants, logging setup
//!
//! This module provides:
//! - Configuration types (`AppConfig`, `ControllerConfig`, `ServerConfig`)
//! - YAML loading functionality (`load_config`, `load_default_config`)
//! - Application constants with environment variable overrides

pub mod constants;
pub mod logging;
mod loader;
mod types;

// Re-export types
pub use types::{AppConfig, ControllerConfig, ServerConfig};

// Re-export loader functions
pub use loader::{
    config_path, load_config, load_config_from_str, load_default_config, DEFAULT_CONFIG_PATH,
};
