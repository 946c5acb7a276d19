//! Health reporting for governance components
//!
//! A monitoring dashboard polls these instead of parsing full reports.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::Timestamp;

/// Compliance score at or above which a component reports healthy.
pub const HEALTHY_SCORE: u8 = 90;

/// Compliance score at or above which a component reports degraded.
pub const DEGRADED_SCORE: u8 = 60;

/// Health status for a governance component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
    /// No validation pass has run yet
    Unknown,
}

impl HealthStatus {
    /// Map a 0-100 compliance score to a status.
    pub fn from_score(score: u8) -> Self {
        if score >= HEALTHY_SCORE {
            Self::Healthy
        } else if score >= DEGRADED_SCORE {
            Self::Degraded
        } else {
            Self::Unhealthy
        }
    }
}

/// Health check result for one component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub status: HealthStatus,
    pub component: String,
    pub message: Option<String>,
    /// Score the status was derived from, when there is one
    pub score: Option<u8>,
    pub checked_at: Option<Timestamp>,
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

impl HealthCheck {
    /// Build a check from a compliance score.
    pub fn from_score(component: impl Into<String>, score: u8, checked_at: Timestamp) -> Self {
        Self {
            status: HealthStatus::from_score(score),
            component: component.into(),
            message: None,
            score: Some(score),
            checked_at: Some(checked_at),
            metadata: None,
        }
    }

    /// Check for a component that has not produced data yet.
    pub fn unknown(component: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Unknown,
            component: component.into(),
            message: Some("no validation pass has completed".to_string()),
            score: None,
            checked_at: None,
            metadata: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value);
        self
    }
}
