//! Strategy controller
//!
//! Owns the `StateStore`, answers backend commands, mirrors status and logs
//! to the frontend through the `CommandChannel`, and receives exchange/market
//! events through `StrategyEvents`. Every event stream is serialized behind
//! its own named lock.
//!
//! Nothing runs until `start` is called:
//!
//! ```ignore
//! let controller = Arc::new(StrategyController::from_config(&config, channel.clone()));
//! let handle = controller.start(PeriodicScheduler::new())?;
//! // ...
//! handle.shutdown().await;
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, error, info, trace, warn};

use crate::config::{AppConfig, ControllerConfig};
use crate::error::{AppError, Result};

use super::command::{Command, CommandChannel, Message, Subscription, Target};
use super::events::{current_timestamp_ms, EventContext, LogLevel, StrategyEvents};
use super::lock::NamedLockDispatcher;
use super::market::Orderbook;
use super::scheduler::PeriodicScheduler;
use super::state::{MergeReport, ParamEntry, SharedStateStore, Snapshot, StateStore};
use super::value::{Value, ValueMap};

// Lock keys, one per event stream
pub const ON_COMMAND_LOCK: &str = "on_command.locker";
pub const ON_INIT_LOCK: &str = "on_init.locker";
pub const ON_ERROR_LOCK: &str = "on_error.locker";
pub const ON_ORDERBOOK_UPDATE_LOCK: &str = "on_orderbook_update.locker";

// Periodic job names
pub const PUBLISH_STATUS_JOB: &str = "publish_status";
pub const PUBLISH_LOG_JOB: &str = "publish_log";

/// Status key refreshed on every status publish (Unix ms)
pub const UPDATED_AT_KEY: &str = "updated_at";

const SUBSCRIBER_NAME: &str = "strategy_controller";

/// What `on_command` did with a command
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    /// Not addressed to the backend
    Ignored,
    /// Backend command without a usable `request`; nothing published
    Malformed,
    /// Request merged into params and acknowledged
    Applied(MergeReport),
}

#[derive(Serialize)]
struct LogRecord<'a> {
    level: LogLevel,
    msg: &'a str,
    ts: u64,
}

#[derive(Serialize)]
struct LogPayload<'a> {
    logging: LogRecord<'a>,
}

fn ack_message() -> Message {
    let mut message = Message::new();
    message.insert("response".to_string(), serde_json::Value::from("success"));
    message
}

fn encodable(key: &str, value: &Value) -> Result<()> {
    match value.to_json() {
        Some(_) => Ok(()),
        None => Err(AppError::Transform(format!(
            "param '{}' has no JSON encoding ({})",
            key, value
        ))),
    }
}

pub struct StrategyController {
    store: SharedStateStore,
    channel: CommandChannel,
    locks: NamedLockDispatcher,
    config: ControllerConfig,
}

impl StrategyController {
    pub fn new(
        config: ControllerConfig,
        channel: CommandChannel,
        status: ValueMap,
        params: ValueMap,
    ) -> Self {
        Self {
            store: StateStore::new(status, params).into_shared(),
            channel,
            locks: NamedLockDispatcher::new(),
            config,
        }
    }

    pub fn from_config(config: &AppConfig, channel: CommandChannel) -> Self {
        Self::new(
            config.controller.clone(),
            channel,
            config.status.clone(),
            config.params.clone(),
        )
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn channel(&self) -> &CommandChannel {
        &self.channel
    }

    pub fn locks(&self) -> &NamedLockDispatcher {
        &self.locks
    }

    pub(crate) fn store(&self) -> SharedStateStore {
        Arc::clone(&self.store)
    }

    /// Copy of the current status
    pub async fn status(&self) -> ValueMap {
        self.store.read().await.status().clone()
    }

    /// Copy of the current params
    pub async fn params(&self) -> ValueMap {
        self.store.read().await.params().clone()
    }

    pub async fn snapshot(&self) -> Snapshot {
        let store = self.store.read().await;
        Snapshot {
            status: store.status().clone(),
            params: Self::transform_params(store.params()),
        }
    }

    /// Project params into `[key, value, kind]` rows, in param order.
    ///
    /// Stops at the first value that cannot be encoded, logs it, and returns
    /// the rows accumulated so far.
    pub fn transform_params(params: &ValueMap) -> Vec<ParamEntry> {
        let mut entries = Vec::with_capacity(params.len());

        for (key, value) in params.iter() {
            if let Err(e) = encodable(key, value) {
                error!(error = %e, transformed = entries.len(), "Cannot transform params");
                return entries;
            }
            entries.push(ParamEntry(key.to_string(), value.clone(), value.kind().label()));
        }

        entries
    }

    /// Run `body` under `key`, logging a dropped event at warn
    async fn guarded<Fut, T>(&self, key: &str, body: Fut) -> Result<T>
    where
        Fut: Future<Output = T>,
    {
        let result = self.locks.guard(key, self.config.lock_timeout(), || body).await;
        if let Err(e) = &result {
            warn!(key = %key, error = %e, "Event dropped");
        }
        result
    }

    /// Handle a command from the channel.
    ///
    /// Only backend commands carrying a non-empty `request` object change
    /// anything: the request is merged into params and `{response: "success"}`
    /// is published to the frontend.
    pub async fn on_command(&self, command: Command) -> Result<CommandOutcome> {
        self.guarded(ON_COMMAND_LOCK, self.apply_command(command)).await
    }

    async fn apply_command(&self, command: Command) -> CommandOutcome {
        if command.target != Target::Backend {
            trace!(target = %command.target, "Command not addressed to backend");
            return CommandOutcome::Ignored;
        }

        info!(message = %serde_json::Value::Object(command.message.clone()), "Backend command received");

        let Some(request) = command.request() else {
            debug!("Backend command has no request, ignoring");
            return CommandOutcome::Malformed;
        };

        let report = {
            let mut store = self.store.write().await;
            store.merge_params(request)
        };
        info!(updated = ?report.updated, rejected = ?report.rejected, "Params updated from request");

        self.channel.publish(Target::Frontend, ack_message());
        CommandOutcome::Applied(report)
    }

    /// Log locally at `level` and mirror the line to the frontend
    pub fn logging(&self, msg: &str, level: LogLevel) {
        match level {
            LogLevel::Info => info!("{}", msg),
            LogLevel::Warning => warn!("{}", msg),
            LogLevel::Error => error!("{}", msg),
        }

        let payload = LogPayload {
            logging: LogRecord {
                level,
                msg,
                ts: current_timestamp_ms(),
            },
        };
        if let Err(e) = self.channel.publish_payload(Target::Frontend, &payload) {
            error!(error = %e, "Failed to publish log line");
        }
    }

    /// Refresh `updated_at` and publish `{status, params}` to the frontend
    pub async fn publish_status(&self) -> Result<usize> {
        debug!("Sending status and params to frontend");

        let snapshot = {
            let mut store = self.store.write().await;
            store.set_status(UPDATED_AT_KEY, current_timestamp_ms() as i64);
            Snapshot {
                status: store.status().clone(),
                params: Self::transform_params(store.params()),
            }
        };

        self.channel.publish_payload(Target::Frontend, &snapshot)
    }

    /// Mirror one info, warning and error line, each after the step delay
    pub async fn publish_log(&self) {
        debug!("Running publish log");
        let delay = self.config.log_step_delay();

        let steps = [
            ("This is a test = info- msg", LogLevel::Info),
            ("This is a test = warning- msg", LogLevel::Warning),
            ("This is a test = error- msg", LogLevel::Error),
        ];
        for (msg, level) in steps {
            tokio::time::sleep(delay).await;
            self.logging(msg, level);
        }
    }

    /// Register the periodic jobs, then subscribe to the command channel.
    ///
    /// Fails without subscribing if a job cannot be registered.
    pub fn start(self: &Arc<Self>, scheduler: PeriodicScheduler) -> Result<ControllerHandle> {
        let controller = Arc::clone(self);
        scheduler.register(PUBLISH_STATUS_JOB, self.config.publish_interval(), move || {
            let controller = Arc::clone(&controller);
            async move {
                controller.publish_status().await?;
                Ok::<(), anyhow::Error>(())
            }
        })?;

        if let Some(interval) = self.config.publish_log_interval() {
            let controller = Arc::clone(self);
            scheduler.register(PUBLISH_LOG_JOB, interval, move || {
                let controller = Arc::clone(&controller);
                async move {
                    controller.publish_log().await;
                    Ok::<(), anyhow::Error>(())
                }
            })?;
        }

        let controller = Arc::clone(self);
        let subscription = self.channel.subscribe(SUBSCRIBER_NAME, move |command| {
            let controller = Arc::clone(&controller);
            async move {
                match controller.on_command(command).await {
                    Ok(outcome) => trace!(outcome = ?outcome, "Command handled"),
                    Err(e) => debug!(error = %e, "Command not handled"),
                }
            }
        });

        info!(
            jobs = scheduler.jobs().len(),
            lock_timeout_secs = self.config.lock_timeout_secs,
            "Strategy controller started"
        );

        Ok(ControllerHandle {
            subscription,
            scheduler,
        })
    }
}

#[async_trait]
impl StrategyEvents for StrategyController {
    async fn on_init(&self, success: bool, context: EventContext) -> Result<()> {
        self.guarded(ON_INIT_LOCK, async move {
            info!(success = success, context = %serde_json::Value::Object(context), "Trade object initialized");
        })
        .await
    }

    async fn on_error(&self, error: String, context: EventContext) -> Result<()> {
        self.guarded(ON_ERROR_LOCK, async move {
            info!(error = %error, context = %serde_json::Value::Object(context), "Trade object reported an error");
        })
        .await
    }

    async fn on_orderbook_update(&self, orderbook: Orderbook) -> Result<()> {
        self.guarded(ON_ORDERBOOK_UPDATE_LOCK, async move {
            trace!(
                platform = %orderbook.platform,
                symbol = %orderbook.symbol,
                best_bid = ?orderbook.best_bid(),
                best_ask = ?orderbook.best_ask(),
                "Orderbook update"
            );
        })
        .await
    }
}

impl std::fmt::Debug for StrategyController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyController")
            .field("config", &self.config)
            .field("locks", &self.locks)
            .finish()
    }
}

/// Running controller: its command subscription and the scheduler driving its jobs
pub struct ControllerHandle {
    subscription: Subscription,
    scheduler: PeriodicScheduler,
}

impl ControllerHandle {
    pub fn scheduler(&self) -> &PeriodicScheduler {
        &self.scheduler
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_active()
    }

    /// Stop the periodic jobs, then the command subscription
    pub async fn shutdown(self) {
        info!("Strategy controller shutting down");
        self.scheduler.shutdown().await;
        self.subscription.unsubscribe().await;
    }
}
