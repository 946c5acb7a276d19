//! Compliance scoring
//!
//! Each dimension scores 0-100: a passing dimension is 100, a failing one
//! loses a fixed penalty per unit of shortfall, floored at 0. The memory
//! score keeps its fraction; only the overall score, the unweighted mean of
//! the three, is rounded.

use serde::{Deserialize, Serialize};
use warden_core::constants::{BUDGET_PENALTY_PER_REQUEST, MEMORY_PENALTY_PER_MB, VIOLATION_PENALTY};
use warden_core::RequestBudget;

const FULL_SCORE: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetCompliance {
    pub passed: bool,
    pub score: u8,
    pub current: u32,
    pub max_per_page: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MemoryCompliance {
    pub passed: bool,
    pub score: f64,
    pub current_mb: f64,
    pub limit_mb: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchitecturalCompliance {
    pub passed: bool,
    pub score: u8,
    pub violation_count: usize,
}

fn penalised(units: u64, per_unit: u32) -> u8 {
    let penalty = units.saturating_mul(u64::from(per_unit));
    u64::from(FULL_SCORE).saturating_sub(penalty) as u8
}

/// Passes while `current <= max_per_page`.
pub fn score_budget(budget: &RequestBudget) -> BudgetCompliance {
    let passed = budget.passed();
    BudgetCompliance {
        passed,
        score: if passed {
            FULL_SCORE
        } else {
            penalised(u64::from(budget.overage()), BUDGET_PENALTY_PER_REQUEST)
        },
        current: budget.current,
        max_per_page: budget.max_per_page,
    }
}

/// Passes while usage is within the limit. An unreadable (NaN) estimate
/// fails with a score of 0.
pub fn score_memory(current_mb: f64, limit_mb: f64) -> MemoryCompliance {
    let passed = current_mb <= limit_mb;
    let score = if passed {
        f64::from(FULL_SCORE)
    } else if current_mb.is_nan() {
        0.0
    } else {
        (f64::from(FULL_SCORE) - MEMORY_PENALTY_PER_MB * (current_mb - limit_mb)).max(0.0)
    };
    MemoryCompliance {
        passed,
        score,
        current_mb,
        limit_mb,
    }
}

pub fn score_architecture(violation_count: usize) -> ArchitecturalCompliance {
    ArchitecturalCompliance {
        passed: violation_count == 0,
        score: penalised(violation_count as u64, VIOLATION_PENALTY),
        violation_count,
    }
}

pub fn overall_score(budget: f64, memory: f64, architecture: f64) -> u8 {
    ((budget + memory + architecture) / 3.0)
        .round()
        .clamp(0.0, f64::from(FULL_SCORE)) as u8
}

/// One line per failing dimension, or a single all-clear line.
pub fn recommendations(
    budget: &BudgetCompliance,
    memory: &MemoryCompliance,
    architecture: &ArchitecturalCompliance,
) -> Vec<String> {
    let mut lines = Vec::new();
    if !budget.passed {
        lines.push(format!(
            "Request budget exceeded by {} request(s) ({}/{}); consolidate component reads into load_page_data",
            budget.current.saturating_sub(budget.max_per_page),
            budget.current,
            budget.max_per_page
        ));
    }
    if memory.current_mb.is_nan() {
        lines.push(format!(
            "Memory usage could not be read against the {:.1} MB limit; check the memory reader",
            memory.limit_mb
        ));
    } else if !memory.passed {
        lines.push(format!(
            "Memory usage {:.1} MB is {:.1} MB over the {:.1} MB limit; shorten the cache TTL or drop unused payloads",
            memory.current_mb,
            memory.current_mb - memory.limit_mb,
            memory.limit_mb
        ));
    }
    if !architecture.passed {
        lines.push(format!(
            "{} coordinator bypass violation(s) recorded; route these reads through the request coordinator",
            architecture.violation_count
        ));
    }
    if lines.is_empty() {
        lines.push("All compliance checks passed; no action needed".to_string());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn budget(max: u32, current: u32) -> RequestBudget {
        let mut budget = RequestBudget::new(max);
        budget.current = current;
        budget
    }

    #[test]
    fn test_budget_at_limit_passes() {
        let result = score_budget(&budget(10, 10));
        assert!(result.passed);
        assert_eq!(result.score, 100);
    }

    #[test]
    fn test_budget_overage_costs_ten_per_request() {
        let result = score_budget(&budget(10, 12));
        assert!(!result.passed);
        assert_eq!(result.score, 80);
        assert_eq!(score_budget(&budget(10, 25)).score, 0);
    }

    #[test]
    fn test_scoring_example_overall() {
        let b = score_budget(&budget(10, 12));
        let m = score_memory(64.0, 100.0);
        let a = score_architecture(0);
        assert_eq!(m.score, 100.0);
        assert_eq!(a.score, 100);
        assert_eq!(
            overall_score(f64::from(b.score), m.score, f64::from(a.score)),
            93
        );
    }

    #[test]
    fn test_memory_penalty() {
        let m = score_memory(110.0, 100.0);
        assert!(!m.passed);
        assert_eq!(m.score, 80.0);
        assert_eq!(score_memory(100.25, 100.0).score, 99.5);
        assert_eq!(score_memory(400.0, 100.0).score, 0.0);
    }

    #[test]
    fn test_memory_fraction_rounds_only_overall() {
        let m = score_memory(100.7, 100.0);
        assert!(!m.passed);
        assert!((m.score - 98.6).abs() < 1e-9);
        // (100 + 98.6 + 100) / 3 = 99.53
        assert_eq!(overall_score(100.0, m.score, 100.0), 100);
        assert_eq!(overall_score(100.0, 98.0, 100.0), 99);
    }

    #[test]
    fn test_unreadable_memory_fails() {
        let m = score_memory(f64::NAN, 100.0);
        assert!(!m.passed);
        assert_eq!(m.score, 0.0);

        let lines = recommendations(
            &score_budget(&budget(10, 3)),
            &m,
            &score_architecture(0),
        );
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("Memory usage could not be read"));
    }

    #[test]
    fn test_architecture_penalty() {
        assert_eq!(score_architecture(2).score, 60);
        assert_eq!(score_architecture(5).score, 0);
        assert_eq!(score_architecture(9).score, 0);
        assert!(!score_architecture(1).passed);
    }

    #[test]
    fn test_recommendations() {
        let clean = recommendations(
            &score_budget(&budget(10, 3)),
            &score_memory(10.0, 100.0),
            &score_architecture(0),
        );
        assert_eq!(clean.len(), 1);
        assert!(clean[0].starts_with("All compliance checks passed"));

        let failing = recommendations(
            &score_budget(&budget(10, 12)),
            &score_memory(110.0, 100.0),
            &score_architecture(3),
        );
        assert_eq!(failing.len(), 3);
        assert!(failing[0].contains("exceeded by 2 request(s) (12/10)"));
        assert!(failing[1].contains("10.0 MB over"));
        assert!(failing[2].starts_with("3 coordinator bypass"));
    }
}
