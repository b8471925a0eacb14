//! Named lock dispatcher
//!
//! Serializes async handlers per string key: two invocations with the same
//! key never run at the same time, invocations with different keys run
//! concurrently. Waiting is bounded; a waiter that runs out of time gets
//! `AppError::LockTimeout` and its handler is never called.
//!
//! ```ignore
//! let locks = NamedLockDispatcher::new();
//! locks.guard("on_orderbook_update.locker", Duration::from_secs(15), || async {
//!     // exclusive section
//! }).await?;
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tracing::{debug, trace};

use crate::error::{AppError, Result};

type KeyLock = Arc<tokio::sync::Mutex<()>>;

/// Registry of per-key async mutexes, created on first use
#[derive(Clone, Default)]
pub struct NamedLockDispatcher {
    // Allocation lock: held only while looking up or creating a key's mutex
    locks: Arc<Mutex<HashMap<String, KeyLock>>>,
}

impl NamedLockDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, key: &str) -> KeyLock {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks
            .entry(key.to_string())
            .or_insert_with(|| {
                trace!(key = %key, "Allocating named lock");
                Arc::new(tokio::sync::Mutex::new(()))
            })
            .clone()
    }

    /// Run `handler` while holding the lock for `key`.
    ///
    /// Fails with `AppError::LockTimeout` if the lock is not acquired within
    /// `timeout`. The lock is released when the handler's future completes,
    /// panics or is dropped.
    pub async fn guard<F, Fut, T>(&self, key: &str, timeout: Duration, handler: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let lock = self.lock_for(key);

        let _held = match tokio::time::timeout(timeout, lock.lock_owned()).await {
            Ok(held) => held,
            Err(_) => {
                debug!(key = %key, timeout_ms = timeout.as_millis() as u64, "Named lock wait timed out");
                return Err(AppError::LockTimeout {
                    key: key.to_string(),
                    timeout,
                });
            }
        };

        trace!(key = %key, "Named lock acquired");
        Ok(handler().await)
    }

    /// Whether an execution currently holds `key`
    pub fn is_running(&self, key: &str) -> bool {
        let locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks
            .get(key)
            .map(|lock| lock.try_lock().is_err())
            .unwrap_or(false)
    }

    /// Keys allocated so far, sorted
    pub fn keys(&self) -> Vec<String> {
        let locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        let mut keys: Vec<String> = locks.keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl std::fmt::Debug for NamedLockDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamedLockDispatcher")
            .field("keys", &self.keys())
            .finish()
    }
}
