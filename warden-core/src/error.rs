//! Error types for WARDEN operations

use thiserror::Error;

/// Error returned by a fetcher when the remote data service read fails.
///
/// Fetchers are supplied by the host application, so this carries only a
/// human-readable reason; the coordinator attaches the cache key.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{reason}")]
pub struct FetchError {
    pub reason: String,
}

impl FetchError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Request coordinator errors.
///
/// `Clone` because one settled read fans out to every caller that joined it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoordinatorError {
    #[error("Remote read failed for {key}: {reason}")]
    RemoteRead { key: String, reason: String },

    #[error("Request budget exceeded for {request}: {current}/{max} requests already issued")]
    BudgetExceeded {
        request: String,
        current: u32,
        max: u32,
    },
}

impl CoordinatorError {
    /// Returns true if this is a budget refusal.
    pub fn is_budget_exceeded(&self) -> bool {
        matches!(self, Self::BudgetExceeded { .. })
    }

    /// Returns true if the remote read itself failed.
    pub fn is_remote_read(&self) -> bool {
        matches!(self, Self::RemoteRead { .. })
    }
}

/// Access guard errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GuardError {
    #[error("Outbound transport has already been intercepted by this guard")]
    AlreadyIntercepted,

    #[error("Invalid scan pattern for {rule}: {reason}")]
    InvalidPattern { rule: String, reason: String },

    #[error("Static scan failed at {path}: {reason}")]
    Scan { path: String, reason: String },
}

/// Outbound transport errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Outbound call to {url} blocked: caller {caller} bypassed the request coordinator")]
    Blocked { url: String, caller: String },

    #[error("HTTP request to {url} failed: {reason}")]
    Http { url: String, reason: String },

    #[error("Invalid outbound request: {reason}")]
    InvalidRequest { reason: String },
}

/// Performance monitor errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MonitorError {
    #[error("Metrics registry error: {reason}")]
    Registry { reason: String },

    #[error("Telemetry initialisation failed: {reason}")]
    Telemetry { reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to parse configuration: {reason}")]
    Parse { reason: String },
}

// =============================================================================
// TESTS
// =============================================================================
