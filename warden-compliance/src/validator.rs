//! Compliance validator.
//!
//! [`ComplianceValidator`] pulls the page budget from the coordinator, the
//! memory estimate from the performance monitor and the violation count
//! from the access guard, scores each, and keeps a bounded history of the
//! results.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use warden_coordinator::RequestCoordinator;
use warden_core::{
    elapsed_between, new_validation_id, Clock, ComplianceConfig, CoordinatorProbe, HealthCheck, SystemClock,
    Timestamp, ValidationId,
};
use warden_guard::AccessGuard;
use warden_monitor::PerformanceMonitor;

use crate::scoring::{
    overall_score, recommendations, score_architecture, score_budget, score_memory,
    ArchitecturalCompliance, BudgetCompliance, MemoryCompliance,
};

/// Component name used in health checks.
pub const COMPLIANCE_COMPONENT: &str = "compliance";

/// Coordinator operations the validator drives.
pub trait CoordinatorHandle: CoordinatorProbe {
    /// Drop cached entries whose key contains `pattern`, or all of them.
    fn invalidate_cache(&self, pattern: Option<&str>) -> usize;
}

impl CoordinatorHandle for RequestCoordinator {
    fn invalidate_cache(&self, pattern: Option<&str>) -> usize {
        RequestCoordinator::invalidate_cache(self, pattern)
    }
}

/// Whether the host application has finished moving its reads onto the
/// coordinator. Supplied by the host; this crate never decides it.
pub trait MigrationSignal: Send + Sync {
    fn is_complete(&self) -> bool;
}

/// Settable migration flag. Starts incomplete.
#[derive(Debug, Default)]
pub struct MigrationFlag {
    complete: AtomicBool,
}

impl MigrationFlag {
    pub fn new(complete: bool) -> Self {
        Self {
            complete: AtomicBool::new(complete),
        }
    }

    pub fn set(&self, complete: bool) {
        self.complete.store(complete, Ordering::SeqCst);
    }
}

impl MigrationSignal for MigrationFlag {
    fn is_complete(&self) -> bool {
        self.complete.load(Ordering::SeqCst)
    }
}

/// Outcome of one validation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub validation_id: ValidationId,
    pub route: Option<String>,
    pub validated_at: Timestamp,
    pub budget_compliance: BudgetCompliance,
    pub memory_compliance: MemoryCompliance,
    pub architectural_compliance: ArchitecturalCompliance,
    /// Rounded mean of the three dimension scores
    pub overall_score: u8,
    pub recommendations: Vec<String>,
}

impl ValidationResult {
    /// True when every dimension passed.
    pub fn passed(&self) -> bool {
        self.budget_compliance.passed
            && self.memory_compliance.passed
            && self.architectural_compliance.passed
    }
}

/// What [`ComplianceValidator::optimize_request_budget`] found and did.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BudgetOptimization {
    /// Mean request count over recent history, if there is any history
    pub average_request_count: Option<f64>,
    /// Request count above which usage counts as trending high
    pub threshold: f64,
    pub trending_high: bool,
    /// Cache entries dropped
    pub invalidated: usize,
}

pub struct ComplianceValidator {
    config: ComplianceConfig,
    coordinator: Arc<dyn CoordinatorHandle>,
    guard: Arc<AccessGuard>,
    monitor: Arc<PerformanceMonitor>,
    migration: Arc<dyn MigrationSignal>,
    clock: Arc<dyn Clock>,
    history: Mutex<VecDeque<ValidationResult>>,
}

impl ComplianceValidator {
    pub fn new(
        config: ComplianceConfig,
        coordinator: Arc<dyn CoordinatorHandle>,
        guard: Arc<AccessGuard>,
        monitor: Arc<PerformanceMonitor>,
    ) -> Self {
        Self {
            config,
            coordinator,
            guard,
            monitor,
            migration: Arc::new(MigrationFlag::default()),
            clock: Arc::new(SystemClock),
            history: Mutex::new(VecDeque::new()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_migration_signal(mut self, signal: Arc<dyn MigrationSignal>) -> Self {
        self.migration = signal;
        self
    }

    pub fn config(&self) -> &ComplianceConfig {
        &self.config
    }

    fn history_guard(&self) -> MutexGuard<'_, VecDeque<ValidationResult>> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drop results older than the monitor's retention window, then the
    /// oldest beyond `history_limit`. Returns how many were dropped.
    fn prune_history_locked(
        &self,
        history: &mut VecDeque<ValidationResult>,
        now: Timestamp,
    ) -> usize {
        let before = history.len();
        let retention = self.monitor.config().retention_window;
        while history
            .front()
            .is_some_and(|r| elapsed_between(r.validated_at, now) > retention)
        {
            history.pop_front();
        }
        while history.len() > self.config.history_limit {
            history.pop_front();
        }
        before - history.len()
    }

    pub fn prune_history(&self) -> usize {
        let now = self.clock.now();
        self.prune_history_locked(&mut self.history_guard(), now)
    }

    /// Score the current state and append the result to history.
    ///
    /// `route` only labels the result; nothing is loaded.
    pub fn validate_complete_performance(&self, route: Option<&str>) -> ValidationResult {
        let budget = score_budget(&self.coordinator.budget());
        let memory = score_memory(self.monitor.current_memory_mb(), self.config.memory_limit_mb);
        let architecture = score_architecture(self.guard.violation_count());

        let result = ValidationResult {
            validation_id: new_validation_id(),
            route: route.map(str::to_string),
            validated_at: self.clock.now(),
            overall_score: overall_score(
                f64::from(budget.score),
                memory.score,
                f64::from(architecture.score),
            ),
            recommendations: recommendations(&budget, &memory, &architecture),
            budget_compliance: budget,
            memory_compliance: memory,
            architectural_compliance: architecture,
        };

        {
            let mut history = self.history_guard();
            history.push_back(result.clone());
            self.prune_history_locked(&mut history, result.validated_at);
        }

        if result.passed() {
            info!(
                validation_id = %result.validation_id,
                route = ?result.route,
                overall_score = result.overall_score,
                "Compliance validation passed"
            );
        } else {
            warn!(
                validation_id = %result.validation_id,
                route = ?result.route,
                overall_score = result.overall_score,
                budget_score = result.budget_compliance.score,
                memory_score = result.memory_compliance.score,
                architectural_score = result.architectural_compliance.score,
                "Compliance validation found issues"
            );
        }
        result
    }

    /// Retained results, oldest first.
    pub fn history(&self) -> Vec<ValidationResult> {
        self.history_guard().iter().cloned().collect()
    }

    pub fn last_result(&self) -> Option<ValidationResult> {
        self.history_guard().back().cloned()
    }

    /// Warn when recent request usage trends toward the budget, then drop
    /// the coordinator's cache so the next loads read fresh data.
    ///
    /// Usage comes from validation history, falling back to the monitor's
    /// samples before the first pass.
    pub fn optimize_request_budget(&self) -> BudgetOptimization {
        let average_request_count = {
            let now = self.clock.now();
            let mut history = self.history_guard();
            self.prune_history_locked(&mut history, now);
            if history.is_empty() {
                None
            } else {
                let total: u64 = history
                    .iter()
                    .map(|r| u64::from(r.budget_compliance.current))
                    .sum();
                Some(total as f64 / history.len() as f64)
            }
        }
        .or_else(|| self.monitor.average_request_count());

        let max_per_page = self.coordinator.budget().max_per_page;
        let threshold = self.config.budget_warn_ratio * f64::from(max_per_page);
        let trending_high = average_request_count.is_some_and(|avg| avg > threshold);
        if trending_high {
            warn!(
                average_request_count = ?average_request_count,
                threshold,
                max_per_page,
                "Request usage trending toward the page budget"
            );
        }

        let invalidated = self.coordinator.invalidate_cache(None);
        BudgetOptimization {
            average_request_count,
            threshold,
            trending_high,
            invalidated,
        }
    }

    /// True only with no recorded violations and a completed migration.
    pub fn verify_architectural_compliance(&self) -> bool {
        self.guard.violation_count() == 0 && self.migration.is_complete()
    }

    pub fn health_check(&self) -> HealthCheck {
        let Some(last) = self.last_result() else {
            return HealthCheck::unknown(COMPLIANCE_COMPONENT);
        };

        let mut check =
            HealthCheck::from_score(COMPLIANCE_COMPONENT, last.overall_score, last.validated_at)
                .with_metadata("validation_id", json!(last.validation_id.to_string()))
                .with_metadata(
                    "violations",
                    json!(last.architectural_compliance.violation_count),
                )
                .with_metadata("request_count", json!(last.budget_compliance.current))
                .with_metadata("memory_mb", json!(last.memory_compliance.current_mb));
        if let Some(first) = last.recommendations.first() {
            check = check.with_message(first.clone());
        }
        check
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use warden_core::{
        GuardConfig, HealthStatus, ManualClock, MonitorConfig, RequestBudget, Violation,
    };
    use warden_test_utils::{fixtures, FixedMemoryProbe, StaticProbe};

    struct StubCoordinator {
        probe: StaticProbe,
        invalidations: std::sync::atomic::AtomicUsize,
    }

    impl CoordinatorProbe for StubCoordinator {
        fn budget(&self) -> RequestBudget {
            self.probe.budget()
        }
        fn cache_hit_rate(&self) -> f64 {
            self.probe.cache_hit_rate()
        }
        fn last_load_duration(&self) -> Option<Duration> {
            self.probe.last_load_duration()
        }
        fn reset_budget(&self) {
            self.probe.reset_budget()
        }
    }

    impl CoordinatorHandle for StubCoordinator {
        fn invalidate_cache(&self, _pattern: Option<&str>) -> usize {
            self.invalidations.fetch_add(1, Ordering::SeqCst);
            3
        }
    }

    struct Harness {
        validator: ComplianceValidator,
        coordinator: Arc<StubCoordinator>,
        guard: Arc<AccessGuard>,
        memory: Arc<FixedMemoryProbe>,
    }

    fn harness(current: u32, memory_mb: f64, config: ComplianceConfig) -> Harness {
        let coordinator = Arc::new(StubCoordinator {
            probe: StaticProbe::new(10, current),
            invalidations: std::sync::atomic::AtomicUsize::new(0),
        });
        let memory = Arc::new(FixedMemoryProbe::new(memory_mb));
        let monitor = Arc::new(PerformanceMonitor::new(
            MonitorConfig::default(),
            coordinator.clone(),
            memory.clone(),
        ));
        let guard = Arc::new(AccessGuard::new(GuardConfig::default()));
        let validator =
            ComplianceValidator::new(config, coordinator.clone(), Arc::clone(&guard), monitor);
        Harness {
            validator,
            coordinator,
            guard,
            memory,
        }
    }

    #[test]
    fn test_clean_state_scores_full() {
        let h = harness(4, 50.0, ComplianceConfig::default());
        let result = h.validator.validate_complete_performance(Some("/"));

        assert!(result.passed());
        assert_eq!(result.overall_score, 100);
        assert_eq!(result.route.as_deref(), Some("/"));
        assert_eq!(result.recommendations.len(), 1);
        assert_eq!(h.validator.last_result(), Some(result));
    }

    #[test]
    fn test_over_budget_example_scores_93() {
        let h = harness(12, 50.0, ComplianceConfig::default());
        let result = h.validator.validate_complete_performance(None);

        assert_eq!(result.budget_compliance.score, 80);
        assert_eq!(result.memory_compliance.score, 100.0);
        assert_eq!(result.architectural_compliance.score, 100);
        assert_eq!(result.overall_score, 93);
        assert_eq!(result.recommendations.len(), 1);
        assert!(result.recommendations[0].contains("12/10"));
    }

    #[test]
    fn test_violations_and_memory_lower_the_score() {
        let h = harness(2, 50.0, ComplianceConfig::default());
        h.guard.record_violation(fixtures::unauthorized("ArticleCard"));
        h.guard.record_violation(fixtures::unauthorized("Feed"));
        h.memory.set(110.0);

        let result = h.validator.validate_complete_performance(None);
        assert_eq!(result.architectural_compliance.score, 60);
        assert_eq!(result.memory_compliance.score, 80.0);
        assert_eq!(result.overall_score, 80);
        assert_eq!(result.recommendations.len(), 2);
    }

    #[test]
    fn test_history_is_bounded() {
        let h = harness(1, 10.0, ComplianceConfig::default().with_history_limit(3));
        let ids: Vec<ValidationId> = (0..5)
            .map(|_| h.validator.validate_complete_performance(None).validation_id)
            .collect();

        let history = h.validator.history();
        assert_eq!(history.len(), 3);
        let kept: Vec<ValidationId> = history.iter().map(|r| r.validation_id).collect();
        assert_eq!(kept, ids[2..].to_vec());
    }

    #[test]
    fn test_history_drops_results_past_retention() {
        let clock = Arc::new(ManualClock::starting_now());
        let h = harness(2, 10.0, ComplianceConfig::default());
        let validator = h.validator.with_clock(clock.clone());

        validator.validate_complete_performance(Some("/"));
        validator.validate_complete_performance(Some("/issues"));
        clock.advance(Duration::from_secs(301));
        let fresh = validator.validate_complete_performance(Some("/issues/7"));

        assert_eq!(validator.history(), vec![fresh]);

        clock.advance(Duration::from_secs(301));
        assert_eq!(validator.prune_history(), 1);
        assert!(validator.history().is_empty());
        assert_eq!(validator.optimize_request_budget().average_request_count, None);
    }

    #[test]
    fn test_optimize_warns_on_high_average_and_invalidates() {
        let h = harness(9, 10.0, ComplianceConfig::default());
        h.validator.validate_complete_performance(None);

        let outcome = h.validator.optimize_request_budget();
        assert_eq!(outcome.average_request_count, Some(9.0));
        assert_eq!(outcome.threshold, 8.0);
        assert!(outcome.trending_high);
        assert_eq!(outcome.invalidated, 3);
        assert_eq!(h.coordinator.invalidations.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_optimize_without_history_still_invalidates() {
        let h = harness(2, 10.0, ComplianceConfig::default());
        let outcome = h.validator.optimize_request_budget();
        assert_eq!(outcome.average_request_count, None);
        assert!(!outcome.trending_high);
        assert_eq!(h.coordinator.invalidations.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_architectural_compliance_needs_migration_signal() {
        let h = harness(0, 10.0, ComplianceConfig::default());
        assert!(!h.validator.verify_architectural_compliance());

        let flag = Arc::new(MigrationFlag::new(true));
        let validator = h.validator.with_migration_signal(flag.clone());
        assert!(validator.verify_architectural_compliance());

        h.guard.record_violation(Violation::unauthorized_call(
            "Feed",
            "http://localhost:54321/rest/v1/a",
            chrono::Utc::now(),
        ));
        assert!(!validator.verify_architectural_compliance());

        h.guard.reset_violations();
        flag.set(false);
        assert!(!validator.verify_architectural_compliance());
    }

    #[test]
    fn test_health_check_follows_last_score() {
        let h = harness(12, 10.0, ComplianceConfig::default());
        assert_eq!(h.validator.health_check().status, HealthStatus::Unknown);

        h.validator.validate_complete_performance(None);
        let check = h.validator.health_check();
        assert_eq!(check.status, HealthStatus::Healthy);
        assert_eq!(check.score, Some(93));
        assert_eq!(check.component, COMPLIANCE_COMPONENT);
        assert!(check.message.unwrap().contains("Request budget exceeded"));
        assert_eq!(check.metadata.unwrap()["request_count"], json!(12));

        h.guard.record_violation(fixtures::unauthorized("A"));
        h.guard.record_violation(fixtures::unauthorized("B"));
        h.guard.record_violation(fixtures::unauthorized("C"));
        h.validator.validate_complete_performance(None);
        // budget 80, memory 100, architecture 40
        assert_eq!(h.validator.health_check().status, HealthStatus::Degraded);
    }
}
