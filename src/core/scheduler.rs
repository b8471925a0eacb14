//! Periodic job scheduler
//!
//! Every registered job gets its own timer loop. A tick that fires while the
//! previous run of the same job is still in progress is skipped, so one job
//! never overlaps itself, and a slow job never delays the others. Failed or
//! panicking runs are logged and the loop carries on with the next tick.
//!
//! Loops live until `PeriodicScheduler::shutdown`, which signals every loop,
//! aborts runs still in flight and waits for the loops to exit.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::error::{AppError, Result};

#[derive(Debug, Default)]
struct JobStats {
    runs: AtomicU64,
    skipped: AtomicU64,
    failures: AtomicU64,
}

/// Registration and counters for one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSummary {
    pub name: String,
    pub interval: Duration,
    /// Runs started
    pub runs: u64,
    /// Ticks dropped because the previous run was still in progress
    pub skipped: u64,
    /// Runs that returned an error or panicked
    pub failures: u64,
}

struct JobEntry {
    name: String,
    interval: Duration,
    stats: Arc<JobStats>,
}

impl JobEntry {
    fn summary(&self) -> JobSummary {
        JobSummary {
            name: self.name.clone(),
            interval: self.interval,
            runs: self.stats.runs.load(Ordering::Relaxed),
            skipped: self.stats.skipped.load(Ordering::Relaxed),
            failures: self.stats.failures.load(Ordering::Relaxed),
        }
    }
}

/// Drives registered callbacks at fixed intervals
#[derive(Clone)]
pub struct PeriodicScheduler {
    shutdown_tx: broadcast::Sender<()>,
    tracker: TaskTracker,
    jobs: Arc<Mutex<Vec<JobEntry>>>,
    stopped: Arc<AtomicBool>,
}

impl PeriodicScheduler {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            shutdown_tx,
            tracker: TaskTracker::new(),
            jobs: Arc::new(Mutex::new(Vec::new())),
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Register `callback` to run every `interval`, first run one interval
    /// from now. Must be called from within a tokio runtime.
    pub fn register<F, Fut>(&self, name: &str, interval: Duration, callback: F) -> Result<()>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        if interval.is_zero() {
            return Err(AppError::Config(format!(
                "Periodic job '{}': interval must be > 0",
                name
            )));
        }
        if self.stopped.load(Ordering::SeqCst) {
            return Err(AppError::Config(format!(
                "Periodic job '{}': scheduler is already shut down",
                name
            )));
        }

        let stats = Arc::new(JobStats::default());
        {
            let mut jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
            jobs.push(JobEntry {
                name: name.to_string(),
                interval,
                stats: stats.clone(),
            });
        }

        let shutdown_rx = self.shutdown_tx.subscribe();
        self.tracker.spawn(job_loop(
            name.to_string(),
            interval,
            callback,
            stats,
            shutdown_rx,
            self.tracker.clone(),
        ));

        info!(job = %name, interval_ms = interval.as_millis() as u64, "Periodic job registered");
        Ok(())
    }

    pub fn jobs(&self) -> Vec<JobSummary> {
        let jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        jobs.iter().map(JobEntry::summary).collect()
    }

    pub fn job(&self, name: &str) -> Option<JobSummary> {
        let jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        jobs.iter().find(|j| j.name == name).map(JobEntry::summary)
    }

    /// Stop all loops and wait for them to exit
    pub async fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(jobs = self.jobs().len(), "Periodic scheduler shutting down");

        let _ = self.shutdown_tx.send(());
        self.tracker.close();
        self.tracker.wait().await;

        info!("Periodic scheduler stopped");
    }
}

impl Default for PeriodicScheduler {
    fn default() -> Self {
        Self::new()
    }
}

async fn job_loop<F, Fut>(
    name: String,
    period: Duration,
    callback: F,
    stats: Arc<JobStats>,
    mut shutdown_rx: broadcast::Receiver<()>,
    tracker: TaskTracker,
) where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut in_flight: Option<JoinHandle<anyhow::Result<()>>> = None;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                if let Some(handle) = in_flight.take() {
                    debug!(job = %name, "Aborting in-flight run");
                    handle.abort();
                }
                break;
            }
            result = async {
                match in_flight.as_mut() {
                    Some(handle) => handle.await,
                    None => std::future::pending().await,
                }
            }, if in_flight.is_some() => {
                in_flight = None;
                match result {
                    Ok(Ok(())) => {
                        debug!(job = %name, "Periodic run completed");
                    }
                    Ok(Err(e)) => {
                        stats.failures.fetch_add(1, Ordering::Relaxed);
                        error!(job = %name, error = %e, "Periodic run failed");
                    }
                    Err(e) if e.is_panic() => {
                        stats.failures.fetch_add(1, Ordering::Relaxed);
                        error!(job = %name, "Periodic run panicked");
                    }
                    Err(e) => {
                        warn!(job = %name, error = %e, "Periodic run cancelled");
                    }
                }
            }
            _ = ticker.tick() => {
                if in_flight.is_some() {
                    stats.skipped.fetch_add(1, Ordering::Relaxed);
                    debug!(job = %name, "Previous run still in progress, skipping tick");
                    continue;
                }
                stats.runs.fetch_add(1, Ordering::Relaxed);
                in_flight = Some(tracker.spawn(callback()));
            }
        }
    }

    debug!(job = %name, "Periodic job loop stopped");
}
