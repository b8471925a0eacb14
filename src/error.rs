//! Application-wide error types using thiserror
//!
//! Every fallible operation in the control plane returns `AppError`.
//! Handler and job failures are contained at the dispatcher/scheduler
//! boundary, so only startup paths let these escape to `main`.

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// Lock for `key` could not be acquired within `timeout`; the handler was not run
    #[error("Lock timeout: '{key}' not acquired within {timeout:?}")]
    LockTimeout { key: String, timeout: Duration },

    /// Params projection hit a value it cannot encode
    #[error("Transform error: {0}")]
    Transform(String),

    #[error("Malformed command: {0}")]
    MalformedCommand(String),

    #[error("WebSocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<tokio_tungstenite::tungstenite::Error> for AppError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        AppError::WebSocket(Box::new(err))
    }
}

impl AppError {
    pub fn is_lock_timeout(&self) -> bool {
        matches!(self, AppError::LockTimeout { .. })
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
