//! WARDEN Compliance - Scoring and Continuous Validation
//!
//! Combines the request coordinator's budget, the performance monitor's
//! memory estimate and the access guard's violations into one 0-100 score
//! per validation pass, with recommendations and a bounded history.

pub mod scoring;
pub mod task;
pub mod validator;

pub use scoring::{
    overall_score, recommendations, score_architecture, score_budget, score_memory,
    ArchitecturalCompliance, BudgetCompliance, MemoryCompliance,
};
pub use task::{compliance_validation_task, ValidationTaskMetrics, ValidationTaskSnapshot};
pub use validator::{
    BudgetOptimization, ComplianceValidator, CoordinatorHandle, MigrationFlag, MigrationSignal,
    ValidationResult, COMPLIANCE_COMPONENT,
};
