//! Background validation task
//!
//! Runs a validation pass every `validation_interval`. Each pass runs on its
//! own task; a pass that panics is logged and counted, and the timer keeps
//! going.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use warden_core::constants::DEFAULT_VALIDATION_INTERVAL_SECS;

use crate::validator::ComplianceValidator;

/// Counters for the validation task.
#[derive(Debug, Default)]
pub struct ValidationTaskMetrics {
    /// Passes that produced a result
    pub passes: AtomicU64,
    /// Passes that failed before producing one
    pub failures: AtomicU64,
}

impl ValidationTaskMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> ValidationTaskSnapshot {
        ValidationTaskSnapshot {
            passes: self.passes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationTaskSnapshot {
    pub passes: u64,
    pub failures: u64,
}

/// Validate until `shutdown_rx` observes `true`. Errors never propagate.
pub async fn compliance_validation_task(
    validator: Arc<ComplianceValidator>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<ValidationTaskMetrics> {
    let metrics = Arc::new(ValidationTaskMetrics::new());

    let period = validation_period(validator.config().validation_interval);
    let mut validation_interval = interval(period);
    validation_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        validation_interval_secs = period.as_secs(),
        memory_limit_mb = validator.config().memory_limit_mb,
        "Compliance validation task started"
    );

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    tracing::info!("Compliance validation task shutting down");
                    break;
                }
            }

            _ = validation_interval.tick() => {
                run_pass(&validator, &metrics).await;
            }
        }
    }

    let snapshot = metrics.snapshot();
    tracing::info!(
        passes = snapshot.passes,
        failures = snapshot.failures,
        "Compliance validation task completed"
    );

    metrics
}

/// A zero period cannot drive a timer; fall back to the default.
fn validation_period(configured: Duration) -> Duration {
    if configured.is_zero() {
        tracing::warn!(
            default_secs = DEFAULT_VALIDATION_INTERVAL_SECS,
            "Validation interval is zero, using the default"
        );
        Duration::from_secs(DEFAULT_VALIDATION_INTERVAL_SECS)
    } else {
        configured
    }
}

async fn run_pass(validator: &Arc<ComplianceValidator>, metrics: &ValidationTaskMetrics) {
    let validator = Arc::clone(validator);
    match tokio::spawn(async move { validator.validate_complete_performance(None) }).await {
        Ok(result) => {
            metrics.passes.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(
                validation_id = %result.validation_id,
                overall_score = result.overall_score,
                "Scheduled validation pass completed"
            );
        }
        Err(e) => {
            metrics.failures.fetch_add(1, Ordering::Relaxed);
            tracing::error!(error = %e, "Scheduled validation pass failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use warden_core::{ComplianceConfig, CoordinatorProbe, GuardConfig, MonitorConfig, RequestBudget};
    use warden_guard::AccessGuard;
    use warden_monitor::{MemoryProbe, PerformanceMonitor};
    use warden_test_utils::{FixedMemoryProbe, StaticProbe};

    use crate::validator::CoordinatorHandle;

    struct Probe(StaticProbe);

    impl CoordinatorProbe for Probe {
        fn budget(&self) -> RequestBudget {
            self.0.budget()
        }
        fn cache_hit_rate(&self) -> f64 {
            0.0
        }
        fn last_load_duration(&self) -> Option<Duration> {
            None
        }
        fn reset_budget(&self) {}
    }

    impl CoordinatorHandle for Probe {
        fn invalidate_cache(&self, _pattern: Option<&str>) -> usize {
            0
        }
    }

    struct BrokenMemory;

    impl MemoryProbe for BrokenMemory {
        fn memory_mb(&self) -> f64 {
            panic!("memory probe unavailable")
        }
    }

    fn validator(memory: Arc<dyn MemoryProbe>) -> Arc<ComplianceValidator> {
        validator_with(memory, Duration::from_secs(30))
    }

    fn validator_with(memory: Arc<dyn MemoryProbe>, period: Duration) -> Arc<ComplianceValidator> {
        let coordinator = Arc::new(Probe(StaticProbe::new(10, 1)));
        let monitor = Arc::new(PerformanceMonitor::new(
            MonitorConfig::default(),
            coordinator.clone(),
            memory,
        ));
        Arc::new(ComplianceValidator::new(
            ComplianceConfig::default().with_validation_interval(period),
            coordinator,
            Arc::new(AccessGuard::new(GuardConfig::default())),
            monitor,
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_validates_on_interval() {
        let validator = validator(Arc::new(FixedMemoryProbe::new(20.0)));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(compliance_validation_task(Arc::clone(&validator), shutdown_rx));

        tokio::time::sleep(Duration::from_secs(65)).await;
        shutdown_tx.send(true).unwrap();
        let snapshot = handle.await.unwrap().snapshot();

        assert!(snapshot.passes >= 2);
        assert_eq!(snapshot.failures, 0);
        assert_eq!(validator.history().len() as u64, snapshot.passes);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_pass_is_swallowed() {
        let validator = validator(Arc::new(BrokenMemory));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(compliance_validation_task(Arc::clone(&validator), shutdown_rx));

        tokio::time::sleep(Duration::from_secs(35)).await;
        shutdown_tx.send(true).unwrap();
        let snapshot = handle.await.unwrap().snapshot();

        assert_eq!(snapshot.passes, 0);
        assert!(snapshot.failures >= 1);
        assert!(validator.history().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_falls_back_to_default() {
        let validator = validator_with(Arc::new(FixedMemoryProbe::new(20.0)), Duration::ZERO);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(compliance_validation_task(Arc::clone(&validator), shutdown_rx));

        tokio::time::sleep(Duration::from_secs(45)).await;
        shutdown_tx.send(true).unwrap();
        let snapshot = handle.await.unwrap().snapshot();

        // Ticks at 0s and 30s.
        assert_eq!(snapshot.passes, 2);
        assert_eq!(snapshot.failures, 0);
    }

    #[test]
    fn test_validation_period() {
        assert_eq!(
            validation_period(Duration::ZERO),
            Duration::from_secs(DEFAULT_VALIDATION_INTERVAL_SECS)
        );
        assert_eq!(validation_period(Duration::from_secs(5)), Duration::from_secs(5));
    }
}
