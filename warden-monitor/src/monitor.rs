//! Performance monitor.
//!
//! Keeps a bounded history of [`MetricsSample`]s and per-unit render
//! statistics. Samples are pruned by age and by count; whichever rule is
//! stricter wins.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use warden_core::constants::{MAINTENANCE_IDLE_RESET_SECS, SUMMARY_RECENT_SAMPLES, SUMMARY_TOP_UNITS};
use warden_core::{
    elapsed_between, Clock, CoordinatorProbe, MetricsSample, MonitorConfig, RequestBudget,
    SystemClock, Timestamp, UnitRenderStat,
};

use crate::memory::MemoryProbe;
use crate::metrics::MonitorMetrics;

/// Snapshot returned by [`PerformanceMonitor::get_performance_summary`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub memory_mb: f64,
    pub budget: RequestBudget,
    pub cache_hit_rate: f64,
    /// Most recent samples, oldest first
    pub recent_samples: Vec<MetricsSample>,
    /// Units with the most renders
    pub top_units: Vec<UnitRenderStat>,
    pub generated_at: Timestamp,
}

/// What one maintenance pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceOutcome {
    pub pruned: usize,
    pub budget_reset: bool,
}

pub struct PerformanceMonitor {
    config: MonitorConfig,
    coordinator: Arc<dyn CoordinatorProbe>,
    memory: Arc<dyn MemoryProbe>,
    clock: Arc<dyn Clock>,
    samples: Mutex<VecDeque<MetricsSample>>,
    renders: DashMap<String, UnitRenderStat>,
    metrics: Option<MonitorMetrics>,
}

impl PerformanceMonitor {
    pub fn new(
        config: MonitorConfig,
        coordinator: Arc<dyn CoordinatorProbe>,
        memory: Arc<dyn MemoryProbe>,
    ) -> Self {
        Self::with_clock(config, coordinator, memory, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: MonitorConfig,
        coordinator: Arc<dyn CoordinatorProbe>,
        memory: Arc<dyn MemoryProbe>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            coordinator,
            memory,
            clock,
            samples: Mutex::new(VecDeque::new()),
            renders: DashMap::new(),
            metrics: None,
        }
    }

    /// Update `metrics` on every recorded sample.
    pub fn with_metrics(mut self, metrics: MonitorMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    fn samples_guard(&self) -> MutexGuard<'_, VecDeque<MetricsSample>> {
        self.samples.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drop samples outside the retention window, then the oldest beyond
    /// the count cap. Returns how many were removed.
    fn prune_locked(&self, samples: &mut VecDeque<MetricsSample>, now: Timestamp) -> usize {
        let before = samples.len();
        while samples
            .front()
            .is_some_and(|s| elapsed_between(s.timestamp, now) > self.config.retention_window)
        {
            samples.pop_front();
        }
        while samples.len() > self.config.max_samples {
            samples.pop_front();
        }
        before - samples.len()
    }

    /// Take one sample of coordinator and process state and append it.
    pub fn record_sample(&self) -> MetricsSample {
        let budget = self.coordinator.budget();
        let sample = MetricsSample {
            timestamp: self.clock.now(),
            request_count: budget.current,
            memory_mb: self.memory.memory_mb(),
            cache_hit_rate: self.coordinator.cache_hit_rate(),
            load_time_ms: self
                .coordinator
                .last_load_duration()
                .map(|d| d.as_secs_f64() * 1000.0)
                .unwrap_or(0.0),
        };

        let retained = {
            let mut samples = self.samples_guard();
            samples.push_back(sample.clone());
            self.prune_locked(&mut samples, sample.timestamp);
            samples.len()
        };

        if let Some(metrics) = &self.metrics {
            metrics.observe(&sample);
        }
        debug!(
            request_count = sample.request_count,
            memory_mb = sample.memory_mb,
            cache_hit_rate = sample.cache_hit_rate,
            load_time_ms = sample.load_time_ms,
            retained,
            "Performance sample recorded"
        );
        sample
    }

    /// Prune without recording. Returns how many samples were removed.
    pub fn prune_samples(&self) -> usize {
        let now = self.clock.now();
        let mut samples = self.samples_guard();
        self.prune_locked(&mut samples, now)
    }

    pub fn samples(&self) -> Vec<MetricsSample> {
        self.samples_guard().iter().cloned().collect()
    }

    pub fn last_sample(&self) -> Option<MetricsSample> {
        self.samples_guard().back().cloned()
    }

    /// Average request count over the retained samples, if any.
    pub fn average_request_count(&self) -> Option<f64> {
        let samples = self.samples_guard();
        if samples.is_empty() {
            return None;
        }
        let total: u64 = samples.iter().map(|s| u64::from(s.request_count)).sum();
        Some(total as f64 / samples.len() as f64)
    }

    pub fn current_memory_mb(&self) -> f64 {
        self.memory.memory_mb()
    }

    /// Record one render of `name`. Advisory; never fails.
    ///
    /// Non-finite durations are ignored and negative ones count as zero.
    pub fn track_component_render(&self, name: &str, duration_ms: f64) {
        if !duration_ms.is_finite() {
            debug!(unit = %name, duration_ms, "Ignoring non-finite render duration");
            return;
        }
        let duration_ms = duration_ms.max(0.0);
        let averaging = self.config.averaging;

        self.renders
            .entry(name.to_string())
            .and_modify(|stat| {
                stat.render_count += 1;
                stat.average_render_time_ms =
                    averaging.fold(stat.average_render_time_ms, duration_ms, stat.render_count);
            })
            .or_insert_with(|| UnitRenderStat::first(name, duration_ms));
    }

    pub fn render_stat(&self, name: &str) -> Option<UnitRenderStat> {
        self.renders.get(name).map(|stat| stat.value().clone())
    }

    /// Units ordered by render count, most rendered first. Ties break by name.
    pub fn top_units(&self, limit: usize) -> Vec<UnitRenderStat> {
        let mut stats: Vec<UnitRenderStat> =
            self.renders.iter().map(|entry| entry.value().clone()).collect();
        stats.sort_by(|a, b| {
            b.render_count
                .cmp(&a.render_count)
                .then_with(|| a.name.cmp(&b.name))
        });
        stats.truncate(limit);
        stats
    }

    pub fn get_performance_summary(&self) -> PerformanceSummary {
        let recent_samples = {
            let samples = self.samples_guard();
            let skip = samples.len().saturating_sub(SUMMARY_RECENT_SAMPLES);
            samples.iter().skip(skip).cloned().collect()
        };

        PerformanceSummary {
            memory_mb: self.memory.memory_mb(),
            budget: self.coordinator.budget(),
            cache_hit_rate: self.coordinator.cache_hit_rate(),
            recent_samples,
            top_units: self.top_units(SUMMARY_TOP_UNITS),
            generated_at: self.clock.now(),
        }
    }

    /// Prune samples, and reset the page budget when nothing has been
    /// sampled for more than a minute.
    ///
    /// With no sample ever recorded there is nothing to measure idleness
    /// against, so the budget is left alone.
    pub fn perform_maintenance_optimization(&self) -> MaintenanceOutcome {
        let now = self.clock.now();
        let (pruned, last_sampled_at) = {
            let mut samples = self.samples_guard();
            let last = samples.back().map(|s| s.timestamp);
            (self.prune_locked(&mut samples, now), last)
        };

        let idle_limit = Duration::from_secs(MAINTENANCE_IDLE_RESET_SECS);
        let budget_reset =
            last_sampled_at.is_some_and(|at| elapsed_between(at, now) > idle_limit);
        if budget_reset {
            self.coordinator.reset_budget();
        }

        if pruned > 0 || budget_reset {
            info!(pruned, budget_reset, "Performance maintenance applied");
        }
        MaintenanceOutcome {
            pruned,
            budget_reset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use warden_core::{ManualClock, RenderAveraging};

    struct StubProbe {
        budget: Mutex<RequestBudget>,
        resets: AtomicUsize,
    }

    impl StubProbe {
        fn with_current(current: u32) -> Arc<Self> {
            let mut budget = RequestBudget::new(10);
            budget.current = current;
            Arc::new(Self {
                budget: Mutex::new(budget),
                resets: AtomicUsize::new(0),
            })
        }
    }

    impl CoordinatorProbe for StubProbe {
        fn budget(&self) -> RequestBudget {
            *self.budget.lock().unwrap()
        }

        fn cache_hit_rate(&self) -> f64 {
            0.5
        }

        fn last_load_duration(&self) -> Option<Duration> {
            Some(Duration::from_millis(250))
        }

        fn reset_budget(&self) {
            self.budget.lock().unwrap().reset();
            self.resets.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct FixedMemory(f64);

    impl MemoryProbe for FixedMemory {
        fn memory_mb(&self) -> f64 {
            self.0
        }
    }

    fn monitor(config: MonitorConfig) -> (PerformanceMonitor, Arc<StubProbe>, ManualClock) {
        let probe = StubProbe::with_current(3);
        let clock = ManualClock::starting_now();
        let monitor = PerformanceMonitor::with_clock(
            config,
            probe.clone(),
            Arc::new(FixedMemory(64.0)),
            Arc::new(clock.clone()),
        );
        (monitor, probe, clock)
    }

    #[test]
    fn test_record_sample_reads_probes() {
        let (monitor, _, _) = monitor(MonitorConfig::default());
        let sample = monitor.record_sample();
        assert_eq!(sample.request_count, 3);
        assert_eq!(sample.memory_mb, 64.0);
        assert_eq!(sample.cache_hit_rate, 0.5);
        assert_eq!(sample.load_time_ms, 250.0);
        assert_eq!(monitor.samples().len(), 1);
        assert_eq!(monitor.last_sample(), Some(sample));
    }

    #[test]
    fn test_count_cap_keeps_newest() {
        let (monitor, _, clock) = monitor(MonitorConfig::default().with_max_samples(3));
        for _ in 0..5 {
            monitor.record_sample();
            clock.advance(Duration::from_secs(1));
        }
        let samples = monitor.samples();
        assert_eq!(samples.len(), 3);
        assert!(samples.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[test]
    fn test_retention_window_prunes_old_samples() {
        let (monitor, _, clock) =
            monitor(MonitorConfig::default().with_retention(Duration::from_secs(300)));
        monitor.record_sample();
        clock.advance(Duration::from_secs(200));
        monitor.record_sample();
        clock.advance(Duration::from_secs(150));

        assert_eq!(monitor.prune_samples(), 1);
        assert_eq!(monitor.samples().len(), 1);
    }

    #[test]
    fn test_two_point_render_average() {
        let (monitor, _, _) = monitor(MonitorConfig::default());
        monitor.track_component_render("Feed", 10.0);
        monitor.track_component_render("Feed", 20.0);
        monitor.track_component_render("Feed", 40.0);

        let stat = monitor.render_stat("Feed").unwrap();
        assert_eq!(stat.render_count, 3);
        assert_eq!(stat.average_render_time_ms, 27.5);
    }

    #[test]
    fn test_running_mean_render_average() {
        let (monitor, _, _) =
            monitor(MonitorConfig::default().with_averaging(RenderAveraging::RunningMean));
        monitor.track_component_render("Feed", 10.0);
        monitor.track_component_render("Feed", 20.0);
        monitor.track_component_render("Feed", 40.0);

        let stat = monitor.render_stat("Feed").unwrap();
        assert!((stat.average_render_time_ms - 70.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_non_finite_render_is_ignored() {
        let (monitor, _, _) = monitor(MonitorConfig::default());
        monitor.track_component_render("Feed", f64::NAN);
        assert!(monitor.render_stat("Feed").is_none());
        monitor.track_component_render("Feed", -5.0);
        assert_eq!(monitor.render_stat("Feed").unwrap().average_render_time_ms, 0.0);
    }

    #[test]
    fn test_summary_limits_samples_and_units() {
        let (monitor, _, clock) = monitor(MonitorConfig::default());
        for _ in 0..8 {
            monitor.record_sample();
            clock.advance(Duration::from_secs(1));
        }
        for (i, name) in ["a", "b", "c", "d", "e", "f", "g"].iter().enumerate() {
            for _ in 0..=i {
                monitor.track_component_render(name, 1.0);
            }
        }

        let summary = monitor.get_performance_summary();
        assert_eq!(summary.recent_samples.len(), SUMMARY_RECENT_SAMPLES);
        assert_eq!(summary.recent_samples, monitor.samples()[3..].to_vec());
        let names: Vec<&str> = summary.top_units.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["g", "f", "e", "d", "c"]);
        assert_eq!(summary.budget.current, 3);
        assert_eq!(summary.memory_mb, 64.0);
    }

    #[test]
    fn test_top_units_tie_breaks_by_name() {
        let (monitor, _, _) = monitor(MonitorConfig::default());
        monitor.track_component_render("beta", 1.0);
        monitor.track_component_render("alpha", 1.0);
        let names: Vec<String> = monitor.top_units(5).into_iter().map(|u| u.name).collect();
        assert_eq!(names, vec!["alpha".to_string(), "beta".to_string()]);
    }

    #[test]
    fn test_maintenance_resets_budget_after_idle_minute() {
        let (monitor, probe, clock) = monitor(MonitorConfig::default());
        monitor.record_sample();

        clock.advance(Duration::from_secs(60));
        assert!(!monitor.perform_maintenance_optimization().budget_reset);
        assert_eq!(probe.budget().current, 3);

        clock.advance(Duration::from_secs(1));
        let outcome = monitor.perform_maintenance_optimization();
        assert!(outcome.budget_reset);
        assert_eq!(probe.budget().current, 0);
        assert_eq!(probe.resets.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_maintenance_without_samples_keeps_budget() {
        let (monitor, probe, clock) = monitor(MonitorConfig::default());
        clock.advance(Duration::from_secs(600));
        assert_eq!(
            monitor.perform_maintenance_optimization(),
            MaintenanceOutcome::default()
        );
        assert_eq!(probe.resets.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_average_request_count() {
        let (monitor, probe, _) = monitor(MonitorConfig::default());
        assert_eq!(monitor.average_request_count(), None);
        monitor.record_sample();
        probe.budget.lock().unwrap().current = 7;
        monitor.record_sample();
        assert_eq!(monitor.average_request_count(), Some(5.0));
    }
}
