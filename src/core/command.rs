//! Target-routed command bus between the controller and the frontend
//!
//! Every publish is fanned out to all subscribers; subscribers look at
//! `Command::target` to decide whether a command concerns them. Publishing
//! never waits for handlers. Each subscriber drains its own queue in order,
//! so commands from one producer arrive in program order.
//!
//! The bus is bounded: a subscriber that falls more than `capacity` commands
//! behind loses the oldest ones (at-most-once delivery).

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::error::{AppError, Result};

/// JSON object carried by a command
pub type Message = serde_json::Map<String, serde_json::Value>;

/// Command addressee
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Frontend,
    Backend,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Frontend => write!(f, "frontend"),
            Target::Backend => write!(f, "backend"),
        }
    }
}

impl FromStr for Target {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "frontend" => Ok(Target::Frontend),
            "backend" => Ok(Target::Backend),
            other => Err(AppError::MalformedCommand(format!("unknown target '{}'", other))),
        }
    }
}

/// `{target, message}` as exchanged with the frontend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub target: Target,
    pub message: Message,
}

impl Command {
    pub fn new(target: Target, message: Message) -> Self {
        Self { target, message }
    }

    /// The `request` mapping of a backend command, if present and non-empty
    pub fn request(&self) -> Option<&Message> {
        self.message
            .get("request")
            .and_then(|r| r.as_object())
            .filter(|r| !r.is_empty())
    }
}

/// Turn a serializable payload into a command message.
///
/// Fails with `AppError::MalformedCommand` unless the payload serializes to
/// a JSON object.
pub fn to_message<T: Serialize>(payload: &T) -> Result<Message> {
    match serde_json::to_value(payload)? {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(AppError::MalformedCommand(format!(
            "message must be a JSON object, got {}",
            other
        ))),
    }
}

/// Handle to one subscriber task
pub struct Subscription {
    name: String,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl Subscription {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop receiving and wait for the subscriber task to exit
    pub async fn unsubscribe(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}

/// Process-wide publish/subscribe bus, cheap to clone
#[derive(Clone)]
pub struct CommandChannel {
    tx: broadcast::Sender<Command>,
    cancel: CancellationToken,
    tracker: TaskTracker,
    subscribers: Arc<AtomicUsize>,
}

impl CommandChannel {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            cancel: CancellationToken::new(),
            tracker: TaskTracker::new(),
            subscribers: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Enqueue `message` for every current subscriber.
    ///
    /// Returns the number of receivers the command was queued for.
    pub fn publish(&self, target: Target, message: Message) -> usize {
        let command = Command::new(target, message);
        match self.tx.send(command) {
            Ok(receivers) => {
                debug!(target = %target, receivers = receivers, "Command published");
                receivers
            }
            Err(_) => {
                debug!(target = %target, "Command published with no subscribers");
                0
            }
        }
    }

    /// Serialize `payload` and publish it
    pub fn publish_payload<T: Serialize>(&self, target: Target, payload: &T) -> Result<usize> {
        let message = to_message(payload)?;
        Ok(self.publish(target, message))
    }

    /// Register `handler` for every command published from now on.
    ///
    /// Commands are handed to the handler one at a time, in publish order.
    /// Must be called from within a tokio runtime.
    pub fn subscribe<F, Fut>(&self, name: &str, handler: F) -> Subscription
    where
        F: Fn(Command) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let rx = self.tx.subscribe();
        let cancel = self.cancel.child_token();
        let count = self.subscribers.fetch_add(1, Ordering::SeqCst) + 1;
        info!(subscriber = %name, subscribers = count, "Command subscriber registered");

        let task = self.tracker.spawn(subscriber_loop(
            name.to_string(),
            rx,
            handler,
            cancel.clone(),
            self.subscribers.clone(),
        ));

        Subscription {
            name: name.to_string(),
            cancel,
            task,
        }
    }

    /// Raw receiver for transports that forward commands themselves
    pub fn receiver(&self) -> broadcast::Receiver<Command> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.load(Ordering::SeqCst)
    }

    /// Cancellation token fired by `shutdown`
    pub fn shutdown_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop every subscriber and wait for them to exit
    pub async fn shutdown(&self) {
        info!(subscribers = self.subscriber_count(), "Command channel shutting down");
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }
}

impl fmt::Debug for CommandChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandChannel")
            .field("subscribers", &self.subscriber_count())
            .field("receivers", &self.tx.receiver_count())
            .finish()
    }
}

async fn subscriber_loop<F, Fut>(
    name: String,
    mut rx: broadcast::Receiver<Command>,
    handler: F,
    cancel: CancellationToken,
    subscribers: Arc<AtomicUsize>,
) where
    F: Fn(Command) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            received = rx.recv() => {
                match received {
                    Ok(command) => {
                        tokio::select! {
                            _ = cancel.cancelled() => break,
                            _ = handler(command) => {}
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(subscriber = %name, skipped = skipped, "Command subscriber lagged, skipped commands");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    subscribers.fetch_sub(1, Ordering::SeqCst);
    debug!(subscriber = %name, "Command subscriber stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn message(value: serde_json::Value) -> Message {
        to_message(&value).unwrap()
    }

    #[test]
    fn test_command_wire_shape() {
        let raw = r#"{"target":"backend","message":{"request":{"max_positon":500}}}"#;
        let command: Command = serde_json::from_str(raw).unwrap();
        assert_eq!(command.target, Target::Backend);
        assert_eq!(command.request().unwrap().get("max_positon"), Some(&json!(500)));
        assert_eq!(serde_json::to_string(&command).unwrap(), raw);
    }

    #[test]
    fn test_request_requires_non_empty_mapping() {
        let cmd = |m| Command::new(Target::Backend, message(m));
        assert!(cmd(json!({"ping": 1})).request().is_none());
        assert!(cmd(json!({"request": "max_positon=5"})).request().is_none());
        assert!(cmd(json!({"request": {}})).request().is_none());
        assert!(cmd(json!({"request": {"a": 1}})).request().is_some());
    }

    #[test]
    fn test_target_parse() {
        assert_eq!("frontend".parse::<Target>().unwrap(), Target::Frontend);
        assert_eq!("backend".parse::<Target>().unwrap(), Target::Backend);
        assert!("Backend".parse::<Target>().is_err());
    }

    #[test]
    fn test_to_message_rejects_non_object() {
        assert!(matches!(to_message(&json!([1, 2])), Err(AppError::MalformedCommand(_))));
    }

    #[tokio::test]
    async fn test_every_subscriber_receives_in_order() {
        let channel = CommandChannel::new(16);
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();

        let _a = channel.subscribe("a", move |cmd| {
            let tx = tx_a.clone();
            async move {
                let _ = tx.send(cmd);
            }
        });
        let _b = channel.subscribe("b", move |cmd| {
            let tx = tx_b.clone();
            async move {
                let _ = tx.send(cmd);
            }
        });

        for i in 0..5 {
            assert_eq!(channel.publish(Target::Frontend, message(json!({ "seq": i }))), 2);
        }

        for rx in [&mut rx_a, &mut rx_b] {
            for i in 0..5 {
                let cmd = rx.recv().await.unwrap();
                assert_eq!(cmd.target, Target::Frontend);
                assert_eq!(cmd.message.get("seq"), Some(&json!(i)));
            }
        }
        channel.shutdown().await;
    }

    #[tokio::test]
    async fn test_publish_does_not_wait_for_handler() {
        let channel = CommandChannel::new(16);
        let _slow = channel.subscribe("slow", |_cmd| async {
            tokio::time::sleep(Duration::from_secs(3_600)).await;
        });

        let published = tokio::time::timeout(Duration::from_millis(100), async {
            channel.publish(Target::Backend, message(json!({"request": {"a": 1}})));
            channel.publish(Target::Backend, message(json!({"request": {"a": 2}})));
        })
        .await;
        assert!(published.is_ok());

        tokio::time::timeout(Duration::from_secs(1), channel.shutdown())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let channel = CommandChannel::new(4);
        assert_eq!(channel.publish(Target::Frontend, Message::new()), 0);
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let channel = CommandChannel::new(16);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sub = channel.subscribe("short-lived", move |cmd| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(cmd);
            }
        });
        assert_eq!(sub.name(), "short-lived");
        assert!(sub.is_active());

        sub.unsubscribe().await;
        assert_eq!(channel.subscriber_count(), 0);
        assert_eq!(channel.publish(Target::Frontend, Message::new()), 0);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_lagging_subscriber_keeps_running() {
        let channel = CommandChannel::new(2);
        let (gate_tx, gate_rx) = tokio::sync::watch::channel(false);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let _sub = channel.subscribe("lagging", move |cmd| {
            let tx = tx.clone();
            let mut gate = gate_rx.clone();
            async move {
                // Hold the first command until the test opens the gate
                let _ = gate.wait_for(|open| *open).await;
                let _ = tx.send(cmd);
            }
        });

        channel.publish(Target::Frontend, message(json!({"seq": 0})));
        // Let the subscriber pick up seq 0 and block on the gate
        tokio::time::sleep(Duration::from_millis(50)).await;
        for i in 1..10 {
            channel.publish(Target::Frontend, message(json!({ "seq": i })));
        }
        gate_tx.send(true).unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.message.get("seq"), Some(&json!(0)));

        // Older commands were dropped; the newest ones still arrive
        let mut last = first;
        while let Ok(Some(cmd)) = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await {
            last = cmd;
        }
        assert_eq!(last.message.get("seq"), Some(&json!(9)));

        channel.publish(Target::Frontend, message(json!({"seq": 10})));
        let next = rx.recv().await.unwrap();
        assert_eq!(next.message.get("seq"), Some(&json!(10)));
        channel.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_fires_token() {
        let channel = CommandChannel::new(8);
        let token = channel.shutdown_token();
        assert!(!token.is_cancelled());

        channel.shutdown().await;
        assert!(token.is_cancelled());
        // Tokens handed out after shutdown are already cancelled
        assert!(channel.shutdown_token().is_cancelled());
    }
}
