//! Enum types for WARDEN

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ConfigError;

/// Kind of coordinator bypass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationType {
    /// A component imports the remote-service client.
    DirectImport,
    /// An outbound call reached the remote service from outside the allow-list.
    UnauthorizedCall,
    /// A component queries or fetches without going through the coordinator.
    BypassCoordinator,
}

impl ViolationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DirectImport => "DIRECT_IMPORT",
            Self::UnauthorizedCall => "UNAUTHORIZED_CALL",
            Self::BypassCoordinator => "BYPASS_COORDINATOR",
        }
    }
}

impl fmt::Display for ViolationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of a violation or scan diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => f.write_str("WARNING"),
            Self::Error => f.write_str("ERROR"),
        }
    }
}

/// What the runtime guard does after recording an unauthorized call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnforcementMode {
    /// Record, then fail the call. Intended for development builds.
    Strict,
    /// Record and let the call proceed.
    #[default]
    Advisory,
}

impl EnforcementMode {
    pub fn is_strict(&self) -> bool {
        matches!(self, Self::Strict)
    }
}

impl FromStr for EnforcementMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" | "development" | "dev" => Ok(Self::Strict),
            "advisory" | "production" | "prod" => Ok(Self::Advisory),
            other => Err(ConfigError::InvalidValue {
                field: "enforcement_mode".to_string(),
                value: other.to_string(),
                reason: "expected 'strict' or 'advisory'".to_string(),
            }),
        }
    }
}

/// How a unit's average render time absorbs a new sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderAveraging {
    /// `(old_average + sample) / 2`. Recent samples dominate.
    #[default]
    TwoPoint,
    /// `avg += (sample - avg) / count`. Exact arithmetic mean.
    RunningMean,
}

impl RenderAveraging {
    /// Fold `sample` into `average`, where `count` already includes the new sample.
    pub fn fold(&self, average: f64, sample: f64, count: u64) -> f64 {
        match self {
            Self::TwoPoint => (average + sample) / 2.0,
            Self::RunningMean => {
                if count == 0 {
                    sample
                } else {
                    average + (sample - average) / count as f64
                }
            }
        }
    }
}

impl FromStr for RenderAveraging {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "two_point" | "two-point" => Ok(Self::TwoPoint),
            "running_mean" | "running-mean" | "mean" => Ok(Self::RunningMean),
            other => Err(ConfigError::InvalidValue {
                field: "render_averaging".to_string(),
                value: other.to_string(),
                reason: "expected 'two_point' or 'running_mean'".to_string(),
            }),
        }
    }
}
