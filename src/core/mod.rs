//! Core module - named locks, periodic jobs, command bus, strategy state and controller
//!
//! This module uses **explicit re-exports** instead of glob exports (`pub use module::*`)
//! to provide better API visibility and prevent accidental public API changes.
//!
//! ## Usage
//! Prefer importing from `crate::core`:
//! ```ignore
//! use crate::core::{CommandChannel, PeriodicScheduler, StrategyController};
//! ```

pub mod command;
pub mod controller;
pub mod events;
pub mod lock;
pub mod market;
pub mod scheduler;
pub mod state;
pub mod value;

// Explicit re-exports for value module
pub use value::{Kind, Value, ValueMap};

// Explicit re-exports for state module
pub use state::{MergeReport, ParamEntry, Snapshot};

// Explicit re-exports for lock module
pub use lock::NamedLockDispatcher;

// Explicit re-exports for scheduler module
pub use scheduler::{JobSummary, PeriodicScheduler};

// Explicit re-exports for command module
pub use command::{to_message, Command, CommandChannel, Message, Subscription, Target};

// Explicit re-exports for events module
pub use events::{current_timestamp_ms, EventContext, LogLevel, StrategyEvents};

// Explicit re-exports for market module
pub use market::{Orderbook, OrderbookLevel};

// Explicit re-exports for controller module
pub use controller::{
    CommandOutcome, ControllerHandle, StrategyController, ON_COMMAND_LOCK, ON_ERROR_LOCK,
    ON_INIT_LOCK, ON_ORDERBOOK_UPDATE_LOCK, PUBLISH_LOG_JOB, PUBLISH_STATUS_JOB, UPDATED_AT_KEY,
};
