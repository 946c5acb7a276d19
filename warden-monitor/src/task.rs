//! Background sampling task
//!
//! Records one sample per `sample_interval` and runs maintenance once per
//! idle-reset period until the shutdown signal flips to `true`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use warden_core::constants::{DEFAULT_SAMPLE_INTERVAL_SECS, MAINTENANCE_IDLE_RESET_SECS};

use crate::monitor::PerformanceMonitor;

/// Counters for the sampling task.
#[derive(Debug, Default)]
pub struct MonitorTaskMetrics {
    pub samples_recorded: AtomicU64,
    pub maintenance_runs: AtomicU64,
    pub samples_pruned: AtomicU64,
    pub budget_resets: AtomicU64,
}

impl MonitorTaskMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MonitorTaskSnapshot {
        MonitorTaskSnapshot {
            samples_recorded: self.samples_recorded.load(Ordering::Relaxed),
            maintenance_runs: self.maintenance_runs.load(Ordering::Relaxed),
            samples_pruned: self.samples_pruned.load(Ordering::Relaxed),
            budget_resets: self.budget_resets.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorTaskSnapshot {
    pub samples_recorded: u64,
    pub maintenance_runs: u64,
    pub samples_pruned: u64,
    pub budget_resets: u64,
}

/// Run the sampler until `shutdown_rx` observes `true`.
///
/// Returns the task counters so the caller can log or assert on them.
pub async fn performance_monitor_task(
    monitor: Arc<PerformanceMonitor>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<MonitorTaskMetrics> {
    let metrics = Arc::new(MonitorTaskMetrics::new());

    let period = sample_period(monitor.config().sample_interval);
    let mut sample_interval = interval(period);
    sample_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut maintenance_interval = interval(Duration::from_secs(MAINTENANCE_IDLE_RESET_SECS));
    maintenance_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        sample_interval_secs = period.as_secs(),
        retention_secs = monitor.config().retention_window.as_secs(),
        max_samples = monitor.config().max_samples,
        "Performance monitor task started"
    );

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    tracing::info!("Performance monitor task shutting down");
                    break;
                }
            }

            _ = sample_interval.tick() => {
                monitor.record_sample();
                metrics.samples_recorded.fetch_add(1, Ordering::Relaxed);
            }

            _ = maintenance_interval.tick() => {
                let outcome = monitor.perform_maintenance_optimization();
                metrics.maintenance_runs.fetch_add(1, Ordering::Relaxed);
                metrics
                    .samples_pruned
                    .fetch_add(outcome.pruned as u64, Ordering::Relaxed);
                if outcome.budget_reset {
                    metrics.budget_resets.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }

    let snapshot = metrics.snapshot();
    tracing::info!(
        samples_recorded = snapshot.samples_recorded,
        maintenance_runs = snapshot.maintenance_runs,
        samples_pruned = snapshot.samples_pruned,
        budget_resets = snapshot.budget_resets,
        "Performance monitor task completed"
    );

    metrics
}

/// A zero period cannot drive a timer; fall back to the default.
fn sample_period(configured: Duration) -> Duration {
    if configured.is_zero() {
        tracing::warn!(
            default_secs = DEFAULT_SAMPLE_INTERVAL_SECS,
            "Sample interval is zero, using the default"
        );
        Duration::from_secs(DEFAULT_SAMPLE_INTERVAL_SECS)
    } else {
        configured
    }
}
