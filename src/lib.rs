//! Strategy control plane
//!
//! Exposes a running strategy's status and params to a remote frontend:
//! - Named lock dispatcher serializing each event stream
//! - Periodic scheduler for background publishes
//! - Target-routed command channel, bridged to WebSocket clients

pub mod config;
pub mod core;
pub mod error;
pub mod server;

pub use error::AppError;
