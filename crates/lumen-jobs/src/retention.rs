//! Background purge of expired terminal jobs.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use lumen_core::defaults;

use crate::registry::JobRegistry;

/// How long finished and failed jobs stay pollable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Age past `finished_at` after which a job is purged. `None` keeps jobs
    /// until they are unregistered.
    pub ttl: Option<Duration>,
    /// Pause between sweeps.
    pub sweep_interval: Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            ttl: Some(Duration::from_secs(defaults::JOB_RETENTION_SECS)),
            sweep_interval: Duration::from_secs(defaults::JOB_RETENTION_SWEEP_SECS),
        }
    }
}

impl RetentionPolicy {
    /// `JOB_RETENTION_SECS` (0 disables) and `JOB_RETENTION_SWEEP_SECS`.
    pub fn from_env() -> Self {
        let ttl_secs = std::env::var("JOB_RETENTION_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::JOB_RETENTION_SECS);
        let sweep_secs = std::env::var("JOB_RETENTION_SWEEP_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::JOB_RETENTION_SWEEP_SECS)
            .max(1);

        Self {
            ttl: (ttl_secs > 0).then(|| Duration::from_secs(ttl_secs)),
            sweep_interval: Duration::from_secs(sweep_secs),
        }
    }

    pub fn disabled() -> Self {
        Self {
            ttl: None,
            ..Self::default()
        }
    }
}

/// Periodically removes expired jobs from the registry.
pub struct RetentionSweeper {
    registry: JobRegistry,
    policy: RetentionPolicy,
}

/// Handle to a running sweeper. Dropping it stops the sweeper.
pub struct RetentionHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RetentionHandle {
    /// Stop sweeping and wait for the task to exit.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        let _ = self.task.await;
    }
}

impl RetentionSweeper {
    pub fn new(registry: JobRegistry, policy: RetentionPolicy) -> Self {
        Self { registry, policy }
    }

    /// Purge once. Returns how many jobs were removed.
    pub fn sweep(&self) -> usize {
        match self.policy.ttl {
            Some(ttl) => self.registry.purge_terminal_older_than(ttl),
            None => 0,
        }
    }

    /// Start sweeping in the background. Returns `None` when retention is
    /// disabled.
    pub fn start(self) -> Option<RetentionHandle> {
        let ttl = self.policy.ttl?;
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            info!(
                ttl_secs = ttl.as_secs(),
                sweep_secs = self.policy.sweep_interval.as_secs(),
                "Retention sweeper started"
            );
            let mut ticker = tokio::time::interval(self.policy.sweep_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = stop_rx.changed() => break,
                    _ = ticker.tick() => {
                        let purged = self.sweep();
                        debug!(purged_count = purged, remaining = self.registry.len(), "Retention sweep");
                    }
                }
            }
            info!("Retention sweeper stopped");
        });

        Some(RetentionHandle { stop_tx, task })
    }
}
