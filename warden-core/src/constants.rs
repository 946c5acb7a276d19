//! Constants for WARDEN
//!
//! Defaults for every configurable value, kept in one place so config
//! structs, tests and documentation agree.

// ============================================================================
// REQUEST COORDINATOR
// ============================================================================

/// Default time-to-live for cached reads in milliseconds (30 seconds)
pub const DEFAULT_CACHE_TTL_MS: u64 = 30_000;

/// Default maximum number of bulk reads per page load
pub const DEFAULT_MAX_REQUESTS_PER_PAGE: u32 = 10;

// ============================================================================
// ACCESS GUARD
// ============================================================================

/// Default address of the remote data service
pub const DEFAULT_SERVICE_URL: &str = "http://localhost:54321";

/// Origins allowed to reach the remote service directly
pub const DEFAULT_ALLOWED_ORIGINS: &[&str] = &[
    "RequestCoordinator",
    "hooks::",
    "utils::",
    "core/",
    "warden_coordinator::",
];

/// Default number of violations the guard keeps before dropping the oldest
pub const DEFAULT_MAX_VIOLATIONS: usize = 1000;

// ============================================================================
// PERFORMANCE MONITOR
// ============================================================================

/// Default sampling interval in seconds
pub const DEFAULT_SAMPLE_INTERVAL_SECS: u64 = 30;

/// Default sample retention window in seconds (5 minutes)
pub const DEFAULT_RETENTION_SECS: u64 = 300;

/// Default maximum number of retained samples
pub const DEFAULT_MAX_SAMPLES: usize = 10;

/// Samples returned by a performance summary
pub const SUMMARY_RECENT_SAMPLES: usize = 5;

/// Units returned by a performance summary
pub const SUMMARY_TOP_UNITS: usize = 5;

/// Idle time after the last sample before maintenance resets the budget
pub const MAINTENANCE_IDLE_RESET_SECS: u64 = 60;

// ============================================================================
// COMPLIANCE VALIDATOR
// ============================================================================

/// Default validation interval in seconds
pub const DEFAULT_VALIDATION_INTERVAL_SECS: u64 = 30;

/// Default memory limit in megabytes
pub const DEFAULT_MEMORY_LIMIT_MB: f64 = 100.0;

/// Default number of retained validation results
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// Average request usage (fraction of the budget) that triggers a warning
pub const DEFAULT_BUDGET_WARN_RATIO: f64 = 0.8;

/// Score deducted per request over budget
pub const BUDGET_PENALTY_PER_REQUEST: u32 = 10;

/// Score deducted per megabyte over the memory limit
pub const MEMORY_PENALTY_PER_MB: f64 = 2.0;

/// Score deducted per recorded violation
pub const VIOLATION_PENALTY: u32 = 20;
