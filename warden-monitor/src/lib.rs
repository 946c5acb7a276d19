//! WARDEN Monitor - Performance Sampling
//!
//! [`PerformanceMonitor`] samples coordinator state through
//! [`warden_core::CoordinatorProbe`] and process memory through a
//! [`MemoryProbe`], and keeps per-unit render statistics. The sampler can
//! run as a background task and optionally feeds Prometheus gauges.

pub mod memory;
pub mod metrics;
pub mod monitor;
pub mod task;
pub mod telemetry;

pub use memory::{MemoryProbe, ProcessMemoryProbe};
pub use metrics::MonitorMetrics;
pub use monitor::{MaintenanceOutcome, PerformanceMonitor, PerformanceSummary};
pub use task::{performance_monitor_task, MonitorTaskMetrics, MonitorTaskSnapshot};
pub use telemetry::{init_tracing, LogFormat, TelemetryConfig, DEFAULT_LOG_FILTER};
