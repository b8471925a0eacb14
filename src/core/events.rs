//! Event seam between exchange/market collaborators and the strategy
//!
//! Collaborators deliver events through `StrategyEvents`. Implementations
//! serialize each event stream behind its own named lock, so a method
//! returns `AppError::LockTimeout` when the previous event of the same kind
//! is still being handled past the configured bound. Callers log or ignore
//! that error; no retry is expected.

use std::fmt;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::Result;

use super::market::Orderbook;

/// Free-form key/value context attached to init and error events
pub type EventContext = serde_json::Map<String, serde_json::Value>;

#[async_trait]
pub trait StrategyEvents: Send + Sync {
    /// Trade/market object for a platform finished initializing
    async fn on_init(&self, success: bool, context: EventContext) -> Result<()>;

    /// Trade/market object reported a runtime error
    async fn on_error(&self, error: String, context: EventContext) -> Result<()>;

    async fn on_orderbook_update(&self, orderbook: Orderbook) -> Result<()>;
}

/// Severity of a log line mirrored to the frontend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warning => write!(f, "warning"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// Get current timestamp in milliseconds since Unix epoch
pub fn current_timestamp_ms() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}
