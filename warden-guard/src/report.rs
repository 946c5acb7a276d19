//! Violation aggregation.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use warden_core::{Timestamp, Violation, ViolationType};

/// Violation list with grouped counts, shaped for a monitoring dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViolationReport {
    pub total: usize,
    pub violations: Vec<Violation>,
    pub by_type: BTreeMap<ViolationType, usize>,
    pub by_component: BTreeMap<String, usize>,
    /// Calls refused in strict mode, per caller
    pub blocked_calls: BTreeMap<String, u64>,
    pub generated_at: Timestamp,
}

impl ViolationReport {
    pub fn new(
        violations: Vec<Violation>,
        blocked_calls: &HashMap<String, u64>,
        generated_at: Timestamp,
    ) -> Self {
        let mut by_type = BTreeMap::new();
        let mut by_component = BTreeMap::new();
        for violation in &violations {
            *by_type.entry(violation.violation_type).or_insert(0) += 1;
            *by_component.entry(violation.caller.clone()).or_insert(0) += 1;
        }

        Self {
            total: violations.len(),
            violations,
            by_type,
            by_component,
            blocked_calls: blocked_calls
                .iter()
                .map(|(caller, count)| (caller.clone(), *count))
                .collect(),
            generated_at,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.total == 0
    }
}
