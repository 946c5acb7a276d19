//! WARDEN Test Utilities
//!
//! Centralized test infrastructure for the WARDEN workspace:
//! - Mock remote source, transport, memory and coordinator probes
//! - Proptest generators for the shared data types
//! - Payload fixtures shaped like the remote data service's responses
//! - Custom assertions for coordinator errors

pub use warden_core::{
    CoordinatorError, CoordinatorProbe, FetchError, ManualClock, MetricsSample, PageData,
    RequestBudget, Severity, Timestamp, TransportError, Violation, ViolationType,
};

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use warden_coordinator::{BulkRead, RemoteSource};
use warden_guard::{OutboundRequest, OutboundResponse, Transport};
use warden_monitor::MemoryProbe;

// ============================================================================
// MOCK PROVIDERS
// ============================================================================

// Mocks stay usable after a test panics while holding a lock.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Remote source that answers from a script keyed by cache key.
///
/// Unscripted reads succeed with an empty object. Every call is counted
/// per key so tests can assert on deduplication.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    responses: Mutex<HashMap<String, Result<Value, FetchError>>>,
    calls: Mutex<HashMap<String, usize>>,
    delay: Option<Duration>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every fetch.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn respond(self, key: impl Into<String>, value: Value) -> Self {
        self.set_response(key, value);
        self
    }

    pub fn fail(self, key: impl Into<String>, reason: impl Into<String>) -> Self {
        self.set_failure(key, reason);
        self
    }

    pub fn set_response(&self, key: impl Into<String>, value: Value) {
        lock(&self.responses).insert(key.into(), Ok(value));
    }

    pub fn set_failure(&self, key: impl Into<String>, reason: impl Into<String>) {
        lock(&self.responses).insert(key.into(), Err(FetchError::new(reason)));
    }

    /// Fetches issued for `key` so far.
    pub fn calls(&self, key: &str) -> usize {
        lock(&self.calls).get(key).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        lock(&self.calls).values().sum()
    }
}

#[async_trait]
impl RemoteSource for ScriptedSource {
    async fn fetch(&self, read: &BulkRead) -> Result<Value, FetchError> {
        let key = read.cache_key();
        *lock(&self.calls).entry(key.clone()).or_insert(0) += 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        lock(&self.responses)
            .get(&key)
            .cloned()
            .unwrap_or_else(|| Ok(json!({})))
    }
}

/// Transport that records every request and answers with a fixed status.
#[derive(Debug)]
pub struct RecordingTransport {
    requests: Mutex<Vec<OutboundRequest>>,
    status: u16,
    body: Value,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::with_response(200, json!([]))
    }

    pub fn with_response(status: u16, body: Value) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            status,
            body,
        }
    }

    pub fn requests(&self) -> Vec<OutboundRequest> {
        lock(&self.requests).clone()
    }

    pub fn sent(&self) -> usize {
        lock(&self.requests).len()
    }
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, request: OutboundRequest) -> Result<OutboundResponse, TransportError> {
        lock(&self.requests).push(request);
        Ok(OutboundResponse {
            status: self.status,
            body: self.body.clone(),
        })
    }
}

/// Memory probe reporting a settable value.
#[derive(Debug)]
pub struct FixedMemoryProbe {
    bits: AtomicU64,
}

impl FixedMemoryProbe {
    pub fn new(memory_mb: f64) -> Self {
        Self {
            bits: AtomicU64::new(memory_mb.to_bits()),
        }
    }

    pub fn set(&self, memory_mb: f64) {
        self.bits.store(memory_mb.to_bits(), Ordering::SeqCst);
    }
}

impl MemoryProbe for FixedMemoryProbe {
    fn memory_mb(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::SeqCst))
    }
}

/// Coordinator probe with a settable budget.
///
/// Unlike the real coordinator it lets `current` exceed `max_per_page`,
/// which scoring tests need.
#[derive(Debug)]
pub struct StaticProbe {
    budget: Mutex<RequestBudget>,
    hit_rate: f64,
    last_load: Option<Duration>,
    resets: AtomicUsize,
}

impl StaticProbe {
    pub fn new(max_per_page: u32, current: u32) -> Self {
        let mut budget = RequestBudget::new(max_per_page);
        budget.current = current;
        Self {
            budget: Mutex::new(budget),
            hit_rate: 0.0,
            last_load: None,
            resets: AtomicUsize::new(0),
        }
    }

    pub fn with_hit_rate(mut self, hit_rate: f64) -> Self {
        self.hit_rate = hit_rate;
        self
    }

    pub fn with_last_load(mut self, duration: Duration) -> Self {
        self.last_load = Some(duration);
        self
    }

    pub fn set_current(&self, current: u32) {
        lock(&self.budget).current = current;
    }

    pub fn resets(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }
}

impl CoordinatorProbe for StaticProbe {
    fn budget(&self) -> RequestBudget {
        *lock(&self.budget)
    }

    fn cache_hit_rate(&self) -> f64 {
        self.hit_rate
    }

    fn last_load_duration(&self) -> Option<Duration> {
        self.last_load
    }

    fn reset_budget(&self) {
        lock(&self.budget).reset();
        self.resets.fetch_add(1, Ordering::SeqCst);
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for generating WARDEN data types.

    use super::*;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    /// Generate a timestamp within a few years of 2024.
    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        (1_700_000_000i64..1_800_000_000i64).prop_map(|secs| {
            Utc.timestamp_opt(secs, 0)
                .single()
                .unwrap_or_else(Utc::now)
        })
    }

    pub fn arb_violation_type() -> impl Strategy<Value = ViolationType> {
        prop_oneof![
            Just(ViolationType::DirectImport),
            Just(ViolationType::UnauthorizedCall),
            Just(ViolationType::BypassCoordinator),
        ]
    }

    pub fn arb_severity() -> impl Strategy<Value = Severity> {
        prop_oneof![Just(Severity::Warning), Just(Severity::Error)]
    }

    /// Caller names drawn from a small pool so grouping has collisions.
    pub fn arb_caller() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("ArticleCard".to_string()),
            Just("IssueList".to_string()),
            Just("Feed".to_string()),
            Just("unknown".to_string()),
        ]
    }

    pub fn arb_violation() -> impl Strategy<Value = Violation> {
        (
            arb_violation_type(),
            arb_caller(),
            "/rest/v1/[a-z]{1,8}",
            arb_severity(),
            arb_timestamp(),
        )
            .prop_map(|(violation_type, caller, path, severity, at)| {
                Violation::new(
                    violation_type,
                    caller.clone(),
                    format!("http://localhost:54321{}", path),
                    severity,
                    format!("{} bypassed the coordinator", caller),
                    at,
                )
            })
    }

    /// Budget with `current` anywhere from idle to well over the limit.
    pub fn arb_budget() -> impl Strategy<Value = RequestBudget> {
        (1u32..50).prop_flat_map(|max| {
            (Just(max), 0..max * 3).prop_map(|(max, current)| {
                let mut budget = RequestBudget::new(max);
                budget.current = current;
                budget.exceeded = current > max;
                budget
            })
        })
    }

    pub fn arb_metrics_sample() -> impl Strategy<Value = MetricsSample> {
        (arb_timestamp(), 0u32..20, 0.0f64..512.0, 0.0f64..=1.0, 0.0f64..5000.0).prop_map(
            |(timestamp, request_count, memory_mb, cache_hit_rate, load_time_ms)| MetricsSample {
                timestamp,
                request_count,
                memory_mb,
                cache_hit_rate,
                load_time_ms,
            },
        )
    }

    pub fn arb_bulk_read() -> impl Strategy<Value = BulkRead> {
        prop_oneof![
            Just(BulkRead::HomeContent),
            Just(BulkRead::IssuesContent),
            Just(BulkRead::SiteConfig),
            "[a-z0-9]{1,8}".prop_map(|issue_id| BulkRead::IssueDetail { issue_id }),
            "[a-z0-9]{1,8}".prop_map(|user_id| BulkRead::UserInteractions { user_id }),
        ]
    }

    /// Routes the coordinator knows, plus arbitrary unknown ones.
    pub fn arb_route() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("/".to_string()),
            Just("/issues".to_string()),
            "[a-z0-9]{1,8}".prop_map(|id| format!("/issues/{}", id)),
            "/[a-z]{1,10}/[a-z]{1,10}",
        ]
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Payloads shaped like the remote data service's bulk responses.

    use super::*;

    /// Base address used for the remote service in tests.
    pub const SERVICE_URL: &str = "http://localhost:54321";

    /// User id scripted by [`page_source`].
    pub const READER_ID: &str = "reader-1";

    pub fn home_payload() -> Value {
        json!({
            "items": [
                { "id": "a1", "title": "Spring issue preview" },
                { "id": "a2", "title": "Interview with the editors" }
            ],
            "featured": null,
            "metadata": { "total": 2 }
        })
    }

    pub fn issues_payload() -> Value {
        json!({
            "items": [
                { "id": "i7", "number": 7 },
                { "id": "i6", "number": 6 }
            ],
            "metadata": { "total": 2 }
        })
    }

    pub fn issue_detail_payload(issue_id: &str) -> Value {
        json!({
            "issue": { "id": issue_id, "number": 7, "title": "Issue seven" },
            "articles": [
                { "id": "a1", "issue_id": issue_id },
                { "id": "a3", "issue_id": issue_id }
            ],
            "metadata": { "pages": 48 }
        })
    }

    pub fn site_config_payload() -> Value {
        json!({
            "section_visibility": { "hero": true, "newsletter": false, "archive": "yes" },
            "settings": { "theme": "light" }
        })
    }

    pub fn user_payload() -> Value {
        json!({
            "bookmarks": [ { "article_id": "a1" } ],
            "reactions": [ { "article_id": "a2", "kind": "like" } ],
            "permissions": { "can_comment": true }
        })
    }

    /// Source scripted with every fixture payload.
    pub fn page_source() -> ScriptedSource {
        ScriptedSource::new()
            .respond(BulkRead::HomeContent.cache_key(), home_payload())
            .respond(BulkRead::IssuesContent.cache_key(), issues_payload())
            .respond(
                BulkRead::IssueDetail {
                    issue_id: "i7".to_string(),
                }
                .cache_key(),
                issue_detail_payload("i7"),
            )
            .respond(BulkRead::SiteConfig.cache_key(), site_config_payload())
            .respond(
                BulkRead::UserInteractions {
                    user_id: READER_ID.to_string(),
                }
                .cache_key(),
                user_payload(),
            )
    }

    pub fn unauthorized(caller: &str) -> Violation {
        Violation::unauthorized_call(
            caller,
            format!("{}/rest/v1/articles", SERVICE_URL),
            chrono::Utc::now(),
        )
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertion helpers for coordinator results.

    use super::*;

    /// Assert that a result is a `BudgetExceeded` refusal.
    #[track_caller]
    pub fn assert_budget_exceeded<T: std::fmt::Debug>(result: &Result<T, CoordinatorError>) {
        match result {
            Err(CoordinatorError::BudgetExceeded { .. }) => {}
            other => panic!("Expected BudgetExceeded, got: {:?}", other),
        }
    }

    /// Assert that a result is a `RemoteRead` failure for `key`.
    #[track_caller]
    pub fn assert_remote_read<T: std::fmt::Debug>(
        result: &Result<T, CoordinatorError>,
        key: &str,
    ) {
        match result {
            Err(CoordinatorError::RemoteRead { key: k, .. }) => {
                assert_eq!(k, key, "Wrong key in RemoteRead error");
            }
            other => panic!("Expected RemoteRead for {}, got: {:?}", key, other),
        }
    }
}
