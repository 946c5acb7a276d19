//! Prometheus gauges for performance samples
//!
//! Registered into a caller-supplied [`Registry`] so hosts decide where
//! (and whether) the gauges are exposed.

use prometheus::core::Collector;
use prometheus::{Gauge, IntCounter, IntGauge, Registry};
use warden_core::{MetricsSample, MonitorError};

/// Gauges updated on every recorded sample.
#[derive(Clone)]
pub struct MonitorMetrics {
    /// Requests issued against the current page budget
    pub request_count: IntGauge,
    pub memory_mb: Gauge,
    pub cache_hit_rate: Gauge,
    /// Duration of the most recent page load
    pub load_time_ms: Gauge,
    pub samples_total: IntCounter,
}

fn registered<C>(registry: &Registry, collector: C, name: &str) -> Result<C, MonitorError>
where
    C: Collector + Clone + 'static,
{
    registry
        .register(Box::new(collector.clone()))
        .map_err(|e| MonitorError::Registry {
            reason: format!("Failed to register {}: {}", name, e),
        })?;
    Ok(collector)
}

fn build_err(name: &str, e: prometheus::Error) -> MonitorError {
    MonitorError::Registry {
        reason: format!("Failed to create {}: {}", name, e),
    }
}

impl MonitorMetrics {
    /// Create every gauge and register it with `registry`.
    pub fn register(registry: &Registry) -> Result<Self, MonitorError> {
        let request_count = IntGauge::new(
            "warden_request_count",
            "Requests issued against the current page budget",
        )
        .map_err(|e| build_err("warden_request_count", e))?;
        let memory_mb = Gauge::new("warden_memory_mb", "Estimated process memory in megabytes")
            .map_err(|e| build_err("warden_memory_mb", e))?;
        let cache_hit_rate = Gauge::new(
            "warden_cache_hit_rate",
            "Fraction of coordinator reads served from cache or a shared pending read",
        )
        .map_err(|e| build_err("warden_cache_hit_rate", e))?;
        let load_time_ms = Gauge::new(
            "warden_load_time_ms",
            "Wall time of the most recent page load in milliseconds",
        )
        .map_err(|e| build_err("warden_load_time_ms", e))?;
        let samples_total = IntCounter::new(
            "warden_samples_total",
            "Performance samples recorded since start",
        )
        .map_err(|e| build_err("warden_samples_total", e))?;

        Ok(Self {
            request_count: registered(registry, request_count, "warden_request_count")?,
            memory_mb: registered(registry, memory_mb, "warden_memory_mb")?,
            cache_hit_rate: registered(registry, cache_hit_rate, "warden_cache_hit_rate")?,
            load_time_ms: registered(registry, load_time_ms, "warden_load_time_ms")?,
            samples_total: registered(registry, samples_total, "warden_samples_total")?,
        })
    }

    pub fn observe(&self, sample: &MetricsSample) {
        self.request_count.set(i64::from(sample.request_count));
        self.memory_mb.set(sample.memory_mb);
        self.cache_hit_rate.set(sample.cache_hit_rate);
        self.load_time_ms.set(sample.load_time_ms);
        self.samples_total.inc();
    }
}
