//! The request coordinator.
//!
//! Every read from the remote data service is meant to pass through here.
//! Reads for the same key collapse into one network call while in flight,
//! successful results are cached for a fixed TTL, and page loads are capped
//! by a per-page request budget.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use futures_util::future::{join_all, FutureExt};
use serde_json::Value;
use tracing::{debug, info, warn};
use warden_core::{
    in_origin, Clock, CoordinatorConfig, CoordinatorError, CoordinatorProbe, FetchError,
    PageData, RequestBudget, SystemClock,
};

use crate::budget::BudgetTracker;
use crate::cache::{CacheState, CacheStats, Lookup, SharedRead};
use crate::routes::RoutePlan;
use crate::source::{BulkRead, RemoteSource};

/// Origin frame pushed around every read the coordinator dispatches.
pub const COORDINATOR_ORIGIN: &str = "RequestCoordinator";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Deduplicating, caching, budgeted gateway to the remote data service.
///
/// Construct one per process and share it behind an `Arc`.
///
/// # Example
///
/// ```ignore
/// let coordinator = RequestCoordinator::new(CoordinatorConfig::from_env(), source);
/// let page = coordinator.load_page_data("/issues", Some("user-42")).await?;
/// ```
pub struct RequestCoordinator {
    config: CoordinatorConfig,
    source: Arc<dyn RemoteSource>,
    clock: Arc<dyn Clock>,
    state: Arc<Mutex<CacheState>>,
    budget: BudgetTracker,
    last_load: Mutex<Option<Duration>>,
}

impl RequestCoordinator {
    /// Create a coordinator on the wall clock.
    pub fn new(config: CoordinatorConfig, source: Arc<dyn RemoteSource>) -> Self {
        Self::with_clock(config, source, Arc::new(SystemClock))
    }

    /// Create a coordinator with an explicit time source.
    pub fn with_clock(
        config: CoordinatorConfig,
        source: Arc<dyn RemoteSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let budget = BudgetTracker::new(config.max_requests_per_page);
        Self {
            config,
            source,
            clock,
            state: Arc::new(Mutex::new(CacheState::default())),
            budget,
            last_load: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Return the value for `key`, reading through `fetcher` at most once.
    ///
    /// A fresh cache entry is returned without calling `fetcher`. If a read
    /// for `key` is already in flight the caller joins it. Otherwise
    /// `fetcher` is started on its own task, so it completes and populates
    /// the cache even if every caller stops waiting. All joiners observe the
    /// same value or the same error. Failures are never cached.
    pub async fn deduplicate_request<F, Fut>(
        &self,
        key: &str,
        fetcher: F,
    ) -> Result<Value, CoordinatorError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, FetchError>> + Send + 'static,
    {
        let read = {
            let mut state = lock(&self.state);
            match state.lookup(key, self.clock.now(), self.config.cache_ttl) {
                Lookup::Hit(value) => {
                    debug!(key = %key, "Cache hit");
                    return Ok(value);
                }
                Lookup::Join(read) => {
                    debug!(key = %key, "Joining in-flight read");
                    read
                }
                Lookup::Miss => {
                    debug!(key = %key, "Cache miss, dispatching read");
                    // Registered under the same lock as the lookup; the read
                    // cannot settle before its entry exists.
                    let read = self.dispatch(key, fetcher());
                    state.register(key.to_string(), read.clone());
                    read
                }
            }
        };
        read.await
    }

    fn dispatch<Fut>(&self, key: &str, fetch: Fut) -> SharedRead
    where
        Fut: Future<Output = Result<Value, FetchError>> + Send + 'static,
    {
        let state = Arc::clone(&self.state);
        let clock = Arc::clone(&self.clock);
        let task_key = key.to_string();

        let handle = tokio::spawn(in_origin(COORDINATOR_ORIGIN, async move {
            let result = fetch.await.map_err(|e| CoordinatorError::RemoteRead {
                key: task_key.clone(),
                reason: e.reason,
            });
            if let Err(err) = &result {
                warn!(key = %task_key, error = %err, "Remote read failed");
            }
            lock(&state).settle(&task_key, &result, clock.now());
            result
        }));

        let state = Arc::clone(&self.state);
        let key = key.to_string();
        async move {
            match handle.await {
                Ok(result) => result,
                Err(join_err) => {
                    // The fetch panicked or was aborted before it could settle.
                    lock(&state).abandon(&key);
                    Err(CoordinatorError::RemoteRead {
                        key,
                        reason: join_err.to_string(),
                    })
                }
            }
        }
        .boxed()
        .shared()
    }

    /// Claim one budget slot for `request`, then run `fetcher`.
    ///
    /// The slot is claimed before `fetcher` is invoked; an exhausted budget
    /// fails with [`CoordinatorError::BudgetExceeded`] and `fetcher` never
    /// runs.
    pub async fn track_request<F, Fut, T>(
        &self,
        request: &str,
        fetcher: F,
    ) -> Result<T, CoordinatorError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, CoordinatorError>>,
    {
        self.budget.reserve(request)?;
        fetcher().await
    }

    /// Claim one budget slot without running anything.
    pub fn reserve(&self, request: &str) -> Result<u32, CoordinatorError> {
        self.budget.reserve(request)
    }

    /// Load the consolidated data bundle for a page.
    ///
    /// Resets the budget, claims one slot per bulk read in the route's plan
    /// and fails before any read starts if the plan does not fit. Reads run
    /// concurrently through [`Self::deduplicate_request`]; if any fails the
    /// whole load fails and partial results are dropped. Unknown routes
    /// return an empty page without touching the network.
    pub async fn load_page_data(
        &self,
        route: &str,
        user_id: Option<&str>,
    ) -> Result<PageData, CoordinatorError> {
        let started = Instant::now();
        self.budget.reset();

        let plan = RoutePlan::resolve(route, user_id);
        if plan.is_empty() {
            debug!(route = %route, "No reads planned for route");
            self.record_load(started.elapsed());
            return Ok(PageData::empty());
        }

        for read in &plan.reads {
            self.budget.reserve(&read.cache_key())?;
        }

        let results = join_all(plan.reads.iter().map(|read| self.bulk_read(read))).await;

        let mut settled = Vec::with_capacity(results.len());
        for (read, result) in plan.reads.iter().zip(results) {
            settled.push((read.clone(), result?));
        }

        let page = plan.assemble(&settled);
        let elapsed = started.elapsed();
        self.record_load(elapsed);

        let budget = self.budget.snapshot();
        info!(
            route = %route,
            reads = plan.reads.len(),
            requests = budget.current,
            remaining = budget.remaining(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Page data loaded"
        );
        Ok(page)
    }

    async fn bulk_read(&self, read: &BulkRead) -> Result<Value, CoordinatorError> {
        let source = Arc::clone(&self.source);
        let owned = read.clone();
        self.deduplicate_request(&read.cache_key(), move || async move {
            source.fetch(&owned).await
        })
        .await
    }

    fn record_load(&self, elapsed: Duration) {
        *lock(&self.last_load) = Some(elapsed);
    }

    /// Drop cached entries whose key contains `pattern`, or all entries.
    ///
    /// Reads already in flight are unaffected and will still populate the
    /// cache when they settle. Returns the number of entries removed.
    pub fn invalidate_cache(&self, pattern: Option<&str>) -> usize {
        let removed = lock(&self.state).invalidate(pattern);
        info!(pattern = ?pattern, removed, "Cache invalidated");
        removed
    }

    pub fn cache_stats(&self) -> CacheStats {
        lock(&self.state).stats()
    }

    pub fn budget(&self) -> RequestBudget {
        self.budget.snapshot()
    }

    pub fn reset_budget(&self) {
        self.budget.reset();
    }

    /// Wall time of the most recent completed page load.
    pub fn last_load_duration(&self) -> Option<Duration> {
        *lock(&self.last_load)
    }
}

impl CoordinatorProbe for RequestCoordinator {
    fn budget(&self) -> RequestBudget {
        RequestCoordinator::budget(self)
    }

    fn cache_hit_rate(&self) -> f64 {
        self.cache_stats().hit_rate()
    }

    fn last_load_duration(&self) -> Option<Duration> {
        RequestCoordinator::last_load_duration(self)
    }

    fn reset_budget(&self) {
        RequestCoordinator::reset_budget(self)
    }
}
