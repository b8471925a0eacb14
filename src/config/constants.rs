//! Application-wide constants and configuration defaults
//!
//! Values can be overridden via environment variables.

use std::time::Duration;

// =============================================================================
// Command Channel
// =============================================================================

/// Command channel buffer per subscriber (default: 256 commands)
///
/// Environment variable: `COMMAND_CHANNEL_CAPACITY`
pub fn command_channel_capacity() -> usize {
    std::env::var("COMMAND_CHANNEL_CAPACITY")
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|&n: &usize| n > 0)
        .unwrap_or(256)
}

// =============================================================================
// Controller
// =============================================================================

/// Default named-lock wait bound in seconds (default: 15)
///
/// Environment variable: `LOCK_TIMEOUT_SECS`
pub fn default_lock_timeout_secs() -> u64 {
    std::env::var("LOCK_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(15)
}

/// Delay between log-mirroring steps in milliseconds (default: 100)
///
/// Environment variable: `LOG_STEP_DELAY_MS`
pub fn log_step_delay_ms() -> u64 {
    std::env::var("LOG_STEP_DELAY_MS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(100)
}

// =============================================================================
// Frontend Bridge
// =============================================================================

/// Interval between WebSocket pings sent to connected clients (default: 30 seconds)
///
/// Environment variable: `WS_HEARTBEAT_INTERVAL_SECS`
pub fn ws_heartbeat_interval() -> Duration {
    let secs = std::env::var("WS_HEARTBEAT_INTERVAL_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|&n: &u64| n > 0)
        .unwrap_or(30);
    Duration::from_secs(secs)
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Print all configuration values (for startup logs)
pub fn log_configuration() {
    tracing::info!("=== Application Configuration ===");
    tracing::info!("Command channel:");
    tracing::info!("  - Capacity: {}", command_channel_capacity());
    tracing::info!("Controller:");
    tracing::info!("  - Default lock timeout: {}s", default_lock_timeout_secs());
    tracing::info!("  - Log step delay: {}ms", log_step_delay_ms());
    tracing::info!("Frontend bridge:");
    tracing::info!("  - Heartbeat interval: {:?}", ws_heartbeat_interval());
    tracing::info!("==================================");
}
