//! Integration tests for sampling a live coordinator
//!
//! The monitor reads a real `RequestCoordinator` through its probe and
//! feeds a Prometheus registry.

use std::sync::Arc;
use std::time::Duration;

use prometheus::{Encoder, Registry, TextEncoder};
use warden_coordinator::RequestCoordinator;
use warden_core::{CoordinatorConfig, CoordinatorProbe, ManualClock, MonitorConfig};
use warden_monitor::{MonitorMetrics, PerformanceMonitor};
use warden_test_utils::{fixtures, FixedMemoryProbe, StaticProbe};

struct Setup {
    coordinator: Arc<RequestCoordinator>,
    monitor: PerformanceMonitor,
    memory: Arc<FixedMemoryProbe>,
    clock: ManualClock,
}

fn setup(registry: &Registry) -> Setup {
    let coordinator = Arc::new(RequestCoordinator::new(
        CoordinatorConfig::default(),
        Arc::new(fixtures::page_source()),
    ));
    let memory = Arc::new(FixedMemoryProbe::new(48.0));
    let clock = ManualClock::starting_now();
    let monitor = PerformanceMonitor::with_clock(
        MonitorConfig::default(),
        coordinator.clone(),
        memory.clone(),
        Arc::new(clock.clone()),
    )
    .with_metrics(MonitorMetrics::register(registry).unwrap());
    Setup {
        coordinator,
        monitor,
        memory,
        clock,
    }
}

#[tokio::test]
async fn test_samples_follow_coordinator_state() {
    let registry = Registry::new();
    let s = setup(&registry);

    let idle = s.monitor.record_sample();
    assert_eq!(idle.request_count, 0);
    assert_eq!(idle.cache_hit_rate, 0.0);
    assert_eq!(idle.load_time_ms, 0.0);

    s.coordinator.load_page_data("/issues", None).await.unwrap();
    s.coordinator.load_page_data("/issues", None).await.unwrap();
    s.memory.set(96.5);
    s.clock.advance(Duration::from_secs(30));

    let busy = s.monitor.record_sample();
    assert_eq!(busy.request_count, 2);
    assert_eq!(busy.cache_hit_rate, 0.5);
    assert_eq!(busy.memory_mb, 96.5);
    assert!(s.coordinator.last_load_duration().is_some());

    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&registry.gather(), &mut buffer)
        .unwrap();
    let exposition = String::from_utf8(buffer).unwrap();
    assert!(exposition.contains("warden_request_count 2"));
    assert!(exposition.contains("warden_memory_mb 96.5"));
    assert!(exposition.contains("warden_samples_total 2"));
}

#[tokio::test]
async fn test_idle_maintenance_resets_the_live_budget() {
    let registry = Registry::new();
    let s = setup(&registry);

    s.coordinator.load_page_data("/", None).await.unwrap();
    s.monitor.record_sample();
    assert_eq!(s.coordinator.budget().current, 2);

    s.clock.advance(Duration::from_secs(61));
    let outcome = s.monitor.perform_maintenance_optimization();
    assert!(outcome.budget_reset);
    assert_eq!(s.coordinator.budget().current, 0);
}

#[test]
fn test_summary_reports_renders_and_budget() {
    let registry = Registry::new();
    let s = setup(&registry);

    for (unit, ms) in [("Feed", 12.0), ("Feed", 8.0), ("Header", 3.0)] {
        s.monitor.track_component_render(unit, ms);
    }
    s.monitor.record_sample();

    let summary = s.monitor.get_performance_summary();
    assert_eq!(summary.memory_mb, 48.0);
    assert_eq!(summary.budget.max_per_page, 10);
    assert_eq!(summary.recent_samples.len(), 1);
    assert_eq!(summary.top_units[0].name, "Feed");
    assert_eq!(summary.top_units[0].render_count, 2);
    assert_eq!(summary.top_units[0].average_render_time_ms, 10.0);

    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["budget"]["current"], 0);
    assert_eq!(json["top_units"][1]["name"], "Header");
}

#[test]
fn test_samples_from_a_scripted_coordinator() {
    let coordinator = Arc::new(
        StaticProbe::new(10, 3)
            .with_hit_rate(0.75)
            .with_last_load(Duration::from_millis(120)),
    );
    let clock = ManualClock::starting_now();
    let monitor = PerformanceMonitor::with_clock(
        MonitorConfig::default(),
        coordinator.clone(),
        Arc::new(FixedMemoryProbe::new(20.0)),
        Arc::new(clock.clone()),
    );

    let first = monitor.record_sample();
    assert_eq!(first.request_count, 3);
    assert_eq!(first.cache_hit_rate, 0.75);
    assert!((first.load_time_ms - 120.0).abs() < 1e-9);

    coordinator.set_current(7);
    clock.advance(Duration::from_secs(30));
    assert_eq!(monitor.record_sample().request_count, 7);
    assert_eq!(monitor.average_request_count(), Some(5.0));

    clock.advance(Duration::from_secs(61));
    assert!(monitor.perform_maintenance_optimization().budget_reset);
    assert_eq!(coordinator.resets(), 1);
    assert_eq!(coordinator.budget().current, 0);
}
