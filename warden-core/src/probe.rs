//! Read-only view of coordinator state for components that must not depend
//! on the coordinator crate.

use std::time::Duration;

use crate::RequestBudget;

/// What the performance monitor needs from the request coordinator.
pub trait CoordinatorProbe: Send + Sync {
    /// Snapshot of the current page budget.
    fn budget(&self) -> RequestBudget;

    /// Cache hit rate since the coordinator was created (0.0 to 1.0).
    fn cache_hit_rate(&self) -> f64;

    /// Wall time of the most recent completed page load.
    fn last_load_duration(&self) -> Option<Duration>;

    /// Zero the page budget outside of a page load.
    fn reset_budget(&self);
}
