//! Entity types moved between WARDEN components

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::{Severity, Timestamp, ViolationType};

// ============================================================================
// REQUEST BUDGET
// ============================================================================

/// Per-page request budget.
///
/// `current` only grows between resets; a refused request sets `exceeded`
/// without incrementing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestBudget {
    pub max_per_page: u32,
    pub current: u32,
    pub exceeded: bool,
}

impl RequestBudget {
    pub fn new(max_per_page: u32) -> Self {
        Self {
            max_per_page,
            current: 0,
            exceeded: false,
        }
    }

    /// Requests still available before refusals start.
    pub fn remaining(&self) -> u32 {
        self.max_per_page.saturating_sub(self.current)
    }

    /// True once no further request may start.
    pub fn is_exhausted(&self) -> bool {
        self.current >= self.max_per_page
    }

    /// True while usage is within the limit.
    pub fn passed(&self) -> bool {
        self.current <= self.max_per_page
    }

    /// How many requests over the limit were counted.
    pub fn overage(&self) -> u32 {
        self.current.saturating_sub(self.max_per_page)
    }

    pub fn reset(&mut self) {
        self.current = 0;
        self.exceeded = false;
    }
}

// ============================================================================
// PAGE DATA
// ============================================================================

/// Interaction state for the authenticated user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserData {
    pub bookmarks: Vec<Value>,
    pub reactions: Vec<Value>,
    pub permissions: Map<String, Value>,
}

/// Primary content for the page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentData {
    pub items: Vec<Value>,
    pub featured_item: Option<Value>,
    pub metadata: Map<String, Value>,
}

/// Site configuration relevant to the page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigData {
    pub section_visibility: BTreeMap<String, bool>,
    pub settings: Map<String, Value>,
}

/// Consolidated bundle returned by one page load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageData {
    pub user_data: UserData,
    pub content_data: ContentData,
    pub config_data: ConfigData,
}

impl PageData {
    /// Empty but well-formed bundle.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

// ============================================================================
// VIOLATIONS
// ============================================================================

/// A detected bypass of the request coordinator.
///
/// `caller` is best-effort provenance, not an authenticated identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub violation_type: ViolationType,
    pub caller: String,
    pub location: String,
    pub severity: Severity,
    pub message: String,
    pub detected_at: Timestamp,
}

impl Violation {
    pub fn new(
        violation_type: ViolationType,
        caller: impl Into<String>,
        location: impl Into<String>,
        severity: Severity,
        message: impl Into<String>,
        detected_at: Timestamp,
    ) -> Self {
        Self {
            violation_type,
            caller: caller.into(),
            location: location.into(),
            severity,
            message: message.into(),
            detected_at,
        }
    }

    /// Unauthorized runtime call at error severity.
    pub fn unauthorized_call(
        caller: impl Into<String>,
        location: impl Into<String>,
        detected_at: Timestamp,
    ) -> Self {
        let caller = caller.into();
        let location = location.into();
        let message = format!(
            "{} reached the remote service at {} without going through the request coordinator",
            caller, location
        );
        Self::new(
            ViolationType::UnauthorizedCall,
            caller,
            location,
            Severity::Error,
            message,
            detected_at,
        )
    }
}

// ============================================================================
// PERFORMANCE SAMPLES
// ============================================================================

/// One periodic snapshot of system state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSample {
    pub timestamp: Timestamp,
    pub request_count: u32,
    pub memory_mb: f64,
    pub cache_hit_rate: f64,
    pub load_time_ms: f64,
}

/// Render statistics for one caller-identified unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitRenderStat {
    pub name: String,
    pub render_count: u64,
    pub average_render_time_ms: f64,
}

impl UnitRenderStat {
    pub fn first(name: impl Into<String>, duration_ms: f64) -> Self {
        Self {
            name: name.into(),
            render_count: 1,
            average_render_time_ms: duration_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_budget_accounting() {
        let mut budget = RequestBudget::new(10);
        assert_eq!(budget.remaining(), 10);
        assert!(!budget.is_exhausted());

        budget.current = 10;
        assert!(budget.is_exhausted());
        assert!(budget.passed());
        assert_eq!(budget.overage(), 0);

        budget.current = 12;
        assert!(!budget.passed());
        assert_eq!(budget.overage(), 2);

        budget.exceeded = true;
        budget.reset();
        assert_eq!(budget, RequestBudget::new(10));
    }

    #[test]
    fn test_zero_budget_is_exhausted() {
        let budget = RequestBudget::new(0);
        assert!(budget.is_exhausted());
        assert_eq!(budget.remaining(), 0);
    }

    #[test]
    fn test_empty_page_data_is_well_formed() {
        let page = PageData::empty();
        assert!(page.is_empty());
        assert!(page.content_data.items.is_empty());
        assert!(page.content_data.featured_item.is_none());
        assert!(page.user_data.bookmarks.is_empty());
        assert!(page.user_data.permissions.is_empty());

        let json = serde_json::to_value(&page).unwrap();
        assert!(json["content_data"]["items"].is_array());
        assert!(json["user_data"]["reactions"].is_array());
        assert!(json["config_data"]["section_visibility"].is_object());
    }

    #[test]
    fn test_unauthorized_call_violation() {
        let v = Violation::unauthorized_call("ArticleCard", "https://db.test/rest/v1/a", Utc::now());
        assert_eq!(v.violation_type, ViolationType::UnauthorizedCall);
        assert_eq!(v.severity, Severity::Error);
        assert!(v.message.contains("ArticleCard"));
        assert!(v.message.contains("request coordinator"));
    }
}
