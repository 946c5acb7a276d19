//! Per-page request budget.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::warn;
use warden_core::{CoordinatorError, RequestBudget};

/// Shared budget counter.
///
/// The check and the increment happen under one lock, so concurrent callers
/// always receive distinct counts and `current` never passes `max_per_page`.
#[derive(Debug)]
pub struct BudgetTracker {
    inner: Mutex<RequestBudget>,
}

impl BudgetTracker {
    pub fn new(max_per_page: u32) -> Self {
        Self {
            inner: Mutex::new(RequestBudget::new(max_per_page)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RequestBudget> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim one request slot for `request`.
    ///
    /// Returns the new count on success. A refusal marks the budget as
    /// exceeded without touching the count.
    pub fn reserve(&self, request: &str) -> Result<u32, CoordinatorError> {
        let mut budget = self.lock();
        if budget.is_exhausted() {
            budget.exceeded = true;
            warn!(
                request = %request,
                current = budget.current,
                max = budget.max_per_page,
                "Request budget exhausted, refusing read"
            );
            return Err(CoordinatorError::BudgetExceeded {
                request: request.to_string(),
                current: budget.current,
                max: budget.max_per_page,
            });
        }
        budget.current += 1;
        Ok(budget.current)
    }

    pub fn snapshot(&self) -> RequestBudget {
        *self.lock()
    }

    pub fn reset(&self) {
        self.lock().reset();
    }
}
