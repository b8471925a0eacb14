//! Configuration types for the control plane
//!
//! Loaded from YAML. Every section has defaults, so an empty file yields a
//! runnable configuration with no status or params.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::value::ValueMap;
use crate::error::AppError;

use super::constants;

// ============================================================================
// Configuration Structs
// ============================================================================

/// Controller timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Bound on waiting for an event's named lock (seconds)
    pub lock_timeout_secs: u64,
    /// Status/params snapshot publish interval (milliseconds)
    pub publish_interval_ms: u64,
    /// Frontend log-mirroring job interval (milliseconds); `None` disables the job
    pub publish_log_interval_ms: Option<u64>,
    /// Delay between the steps of one log-mirroring run (milliseconds)
    pub log_step_delay_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            lock_timeout_secs: constants::default_lock_timeout_secs(),
            publish_interval_ms: 1_000,
            publish_log_interval_ms: Some(1_000),
            log_step_delay_ms: constants::log_step_delay_ms(),
        }
    }
}

impl ControllerConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }

    pub fn publish_interval(&self) -> Duration {
        Duration::from_millis(self.publish_interval_ms)
    }

    pub fn publish_log_interval(&self) -> Option<Duration> {
        self.publish_log_interval_ms.map(Duration::from_millis)
    }

    pub fn log_step_delay(&self) -> Duration {
        Duration::from_millis(self.log_step_delay_ms)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.lock_timeout_secs == 0 {
            return Err(AppError::Config(
                "controller: lock_timeout_secs must be > 0".to_string(),
            ));
        }
        if self.publish_interval_ms == 0 {
            return Err(AppError::Config(
                "controller: publish_interval_ms must be > 0".to_string(),
            ));
        }
        if self.publish_log_interval_ms == Some(0) {
            return Err(AppError::Config(
                "controller: publish_log_interval_ms must be > 0 (omit it to disable)".to_string(),
            ));
        }
        Ok(())
    }
}

/// WebSocket bridge to the frontend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if !self.enabled {
            return Ok(());
        }
        if self.host.trim().is_empty() {
            return Err(AppError::Config("server: host cannot be empty".to_string()));
        }
        if self.port == 0 {
            return Err(AppError::Config("server: port must be non-zero".to_string()));
        }
        Ok(())
    }
}

/// Root application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub controller: ControllerConfig,
    pub server: ServerConfig,
    /// Initial read-only status
    pub status: ValueMap,
    /// Initial writable params
    pub params: ValueMap,
}

impl AppConfig {
    /// Validate all configuration rules
    pub fn validate(&self) -> Result<(), AppError> {
        self.controller.validate()?;
        self.server.validate()?;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
