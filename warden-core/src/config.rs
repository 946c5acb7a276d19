//! Configuration types
//!
//! Every section has defaults (see [`crate::constants`]), builder-style
//! setters, `from_env()` overrides and a `validate()` pass. A whole
//! [`WardenConfig`] can also be loaded from TOML.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use crate::constants::*;
use crate::{ConfigError, EnforcementMode, RenderAveraging};

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Durations are written as integer milliseconds in config files.
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// Durations are written as integer seconds in config files.
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

// ============================================================================
// REQUEST COORDINATOR
// ============================================================================

/// Configuration for the request coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// How long a successful read stays servable from cache
    #[serde(rename = "cache_ttl_ms", with = "duration_ms")]
    pub cache_ttl: Duration,
    /// Maximum bulk reads per page load
    pub max_requests_per_page: u32,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_millis(DEFAULT_CACHE_TTL_MS),
            max_requests_per_page: DEFAULT_MAX_REQUESTS_PER_PAGE,
        }
    }
}

impl CoordinatorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_max_requests(mut self, max: u32) -> Self {
        self.max_requests_per_page = max;
        self
    }

    /// Environment variables:
    /// - `WARDEN_CACHE_TTL_MS` (default: 30000)
    /// - `WARDEN_MAX_REQUESTS_PER_PAGE` (default: 10)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            cache_ttl: env_parse::<u64>("WARDEN_CACHE_TTL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.cache_ttl),
            max_requests_per_page: env_parse("WARDEN_MAX_REQUESTS_PER_PAGE")
                .unwrap_or(defaults.max_requests_per_page),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_ttl.is_zero() {
            return Err(invalid(
                "coordinator.cache_ttl",
                format!("{:?}", self.cache_ttl),
                "cache_ttl must be positive",
            ));
        }
        if self.max_requests_per_page == 0 {
            return Err(invalid(
                "coordinator.max_requests_per_page",
                self.max_requests_per_page,
                "max_requests_per_page must be greater than 0",
            ));
        }
        Ok(())
    }
}

// ============================================================================
// ACCESS GUARD
// ============================================================================

/// Configuration for the access guard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Address prefix identifying calls to the remote data service
    pub service_url: String,
    pub mode: EnforcementMode,
    /// Provenance substrings that mark a call as coordinated
    pub allowed_origins: Vec<String>,
    /// Also scan a captured backtrace when no origin frame matches.
    /// Expensive; meant for development builds with debug symbols.
    pub inspect_backtrace: bool,
    /// Violations kept in the ledger; the oldest are dropped past this
    pub max_violations: usize,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            service_url: DEFAULT_SERVICE_URL.to_string(),
            mode: EnforcementMode::default(),
            allowed_origins: DEFAULT_ALLOWED_ORIGINS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            inspect_backtrace: false,
            max_violations: DEFAULT_MAX_VIOLATIONS,
        }
    }
}

impl GuardConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_service_url(mut self, url: impl Into<String>) -> Self {
        self.service_url = url.into();
        self
    }

    pub fn with_mode(mut self, mode: EnforcementMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_allowed_origin(mut self, origin: impl Into<String>) -> Self {
        self.allowed_origins.push(origin.into());
        self
    }

    pub fn with_backtrace_inspection(mut self, enabled: bool) -> Self {
        self.inspect_backtrace = enabled;
        self
    }

    pub fn with_max_violations(mut self, max: usize) -> Self {
        self.max_violations = max;
        self
    }

    /// Strict enforcement against `service_url`, for development builds.
    pub fn development(service_url: impl Into<String>) -> Self {
        Self::default()
            .with_service_url(service_url)
            .with_mode(EnforcementMode::Strict)
    }

    /// Environment variables:
    /// - `WARDEN_SERVICE_URL` (default: http://localhost:54321)
    /// - `WARDEN_ENFORCEMENT_MODE`: `strict` or `advisory` (default: advisory)
    /// - `WARDEN_INSPECT_BACKTRACE`: `true` to enable (default: false)
    /// - `WARDEN_MAX_VIOLATIONS` (default: 1000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            service_url: std::env::var("WARDEN_SERVICE_URL").unwrap_or(defaults.service_url),
            mode: env_parse("WARDEN_ENFORCEMENT_MODE").unwrap_or(defaults.mode),
            allowed_origins: defaults.allowed_origins,
            inspect_backtrace: std::env::var("WARDEN_INSPECT_BACKTRACE")
                .map(|s| s == "true" || s == "1")
                .unwrap_or(defaults.inspect_backtrace),
            max_violations: env_parse("WARDEN_MAX_VIOLATIONS")
                .unwrap_or(defaults.max_violations),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_url.trim().is_empty() {
            return Err(invalid(
                "guard.service_url",
                &self.service_url,
                "service_url must not be empty",
            ));
        }
        if self.allowed_origins.iter().any(|o| o.trim().is_empty()) {
            return Err(invalid(
                "guard.allowed_origins",
                format!("{:?}", self.allowed_origins),
                "allowed origins must not be empty strings",
            ));
        }
        if self.max_violations == 0 {
            return Err(invalid(
                "guard.max_violations",
                self.max_violations,
                "max_violations must be greater than 0",
            ));
        }
        Ok(())
    }
}

// ============================================================================
// PERFORMANCE MONITOR
// ============================================================================

/// Configuration for the performance monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    #[serde(rename = "sample_interval_secs", with = "duration_secs")]
    pub sample_interval: Duration,
    /// Samples older than this are pruned
    #[serde(rename = "retention_secs", with = "duration_secs")]
    pub retention_window: Duration,
    /// Hard cap on retained samples
    pub max_samples: usize,
    pub averaging: RenderAveraging,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            sample_interval: Duration::from_secs(DEFAULT_SAMPLE_INTERVAL_SECS),
            retention_window: Duration::from_secs(DEFAULT_RETENTION_SECS),
            max_samples: DEFAULT_MAX_SAMPLES,
            averaging: RenderAveraging::default(),
        }
    }
}

impl MonitorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sample_interval(mut self, interval: Duration) -> Self {
        self.sample_interval = interval;
        self
    }

    pub fn with_retention(mut self, window: Duration) -> Self {
        self.retention_window = window;
        self
    }

    pub fn with_max_samples(mut self, max: usize) -> Self {
        self.max_samples = max;
        self
    }

    pub fn with_averaging(mut self, averaging: RenderAveraging) -> Self {
        self.averaging = averaging;
        self
    }

    /// Environment variables:
    /// - `WARDEN_SAMPLE_INTERVAL_SECS` (default: 30)
    /// - `WARDEN_RETENTION_SECS` (default: 300)
    /// - `WARDEN_MAX_SAMPLES` (default: 10)
    /// - `WARDEN_RENDER_AVERAGING`: `two_point` or `running_mean` (default: two_point)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            sample_interval: env_parse::<u64>("WARDEN_SAMPLE_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.sample_interval),
            retention_window: env_parse::<u64>("WARDEN_RETENTION_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.retention_window),
            max_samples: env_parse("WARDEN_MAX_SAMPLES").unwrap_or(defaults.max_samples),
            averaging: env_parse("WARDEN_RENDER_AVERAGING").unwrap_or(defaults.averaging),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_interval.is_zero() {
            return Err(invalid(
                "monitor.sample_interval",
                format!("{:?}", self.sample_interval),
                "sample_interval must be positive",
            ));
        }
        if self.retention_window.is_zero() {
            return Err(invalid(
                "monitor.retention_window",
                format!("{:?}", self.retention_window),
                "retention_window must be positive",
            ));
        }
        if self.max_samples == 0 {
            return Err(invalid(
                "monitor.max_samples",
                self.max_samples,
                "max_samples must be greater than 0",
            ));
        }
        Ok(())
    }
}

// ============================================================================
// COMPLIANCE VALIDATOR
// ============================================================================

/// Configuration for the compliance validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplianceConfig {
    #[serde(rename = "validation_interval_secs", with = "duration_secs")]
    pub validation_interval: Duration,
    pub memory_limit_mb: f64,
    /// Validation results retained in history
    pub history_limit: usize,
    /// Average budget utilization above which request usage is flagged
    pub budget_warn_ratio: f64,
}

impl Default for ComplianceConfig {
    fn default() -> Self {
        Self {
            validation_interval: Duration::from_secs(DEFAULT_VALIDATION_INTERVAL_SECS),
            memory_limit_mb: DEFAULT_MEMORY_LIMIT_MB,
            history_limit: DEFAULT_HISTORY_LIMIT,
            budget_warn_ratio: DEFAULT_BUDGET_WARN_RATIO,
        }
    }
}

impl ComplianceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_validation_interval(mut self, interval: Duration) -> Self {
        self.validation_interval = interval;
        self
    }

    pub fn with_memory_limit(mut self, limit_mb: f64) -> Self {
        self.memory_limit_mb = limit_mb;
        self
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn with_budget_warn_ratio(mut self, ratio: f64) -> Self {
        self.budget_warn_ratio = ratio;
        self
    }

    /// Environment variables:
    /// - `WARDEN_VALIDATION_INTERVAL_SECS` (default: 30)
    /// - `WARDEN_MEMORY_LIMIT_MB` (default: 100)
    /// - `WARDEN_HISTORY_LIMIT` (default: 10)
    /// - `WARDEN_BUDGET_WARN_RATIO` (default: 0.8)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            validation_interval: env_parse::<u64>("WARDEN_VALIDATION_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.validation_interval),
            memory_limit_mb: env_parse("WARDEN_MEMORY_LIMIT_MB")
                .unwrap_or(defaults.memory_limit_mb),
            history_limit: env_parse("WARDEN_HISTORY_LIMIT").unwrap_or(defaults.history_limit),
            budget_warn_ratio: env_parse("WARDEN_BUDGET_WARN_RATIO")
                .unwrap_or(defaults.budget_warn_ratio),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.validation_interval.is_zero() {
            return Err(invalid(
                "compliance.validation_interval",
                format!("{:?}", self.validation_interval),
                "validation_interval must be positive",
            ));
        }
        if self.memory_limit_mb.is_nan() || self.memory_limit_mb <= 0.0 {
            return Err(invalid(
                "compliance.memory_limit_mb",
                self.memory_limit_mb,
                "memory_limit_mb must be positive",
            ));
        }
        if self.history_limit == 0 {
            return Err(invalid(
                "compliance.history_limit",
                self.history_limit,
                "history_limit must be greater than 0",
            ));
        }
        if !(0.0..=1.0).contains(&self.budget_warn_ratio) {
            return Err(invalid(
                "compliance.budget_warn_ratio",
                self.budget_warn_ratio,
                "budget_warn_ratio must be between 0.0 and 1.0",
            ));
        }
        Ok(())
    }
}

// ============================================================================
// MASTER CONFIG
// ============================================================================

/// Master configuration for the governance layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    pub coordinator: CoordinatorConfig,
    pub guard: GuardConfig,
    pub monitor: MonitorConfig,
    pub compliance: ComplianceConfig,
}

impl WardenConfig {
    /// Build every section from `WARDEN_*` environment variables.
    pub fn from_env() -> Self {
        Self {
            coordinator: CoordinatorConfig::from_env(),
            guard: GuardConfig::from_env(),
            monitor: MonitorConfig::from_env(),
            compliance: ComplianceConfig::from_env(),
        }
    }

    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(input).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.coordinator.validate()?;
        self.guard.validate()?;
        self.monitor.validate()?;
        self.compliance.validate()?;
        Ok(())
    }
}
