//! Runtime access guard.
//!
//! [`AccessGuard`] owns the violation ledger. [`AccessGuard::intercept`]
//! wraps the outbound transport once; every call to the remote service is
//! then attributed and checked against the allow-list of origins.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::{debug, info, warn};
use warden_core::{
    Clock, GuardConfig, GuardError, SystemClock, TransportError, Violation,
};

use crate::callsite::CallSite;
use crate::report::ViolationReport;
use crate::scanner::ScanReport;
use crate::transport::{OutboundRequest, OutboundResponse, Transport};

/// Newest violations up to `max`, plus a count of those dropped to stay
/// under it. Both reset together.
#[derive(Debug)]
struct Ledger {
    violations: VecDeque<Violation>,
    dropped: usize,
    max: usize,
    blocked: HashMap<String, u64>,
}

impl Ledger {
    fn new(max: usize) -> Self {
        Self {
            violations: VecDeque::new(),
            dropped: 0,
            max,
            blocked: HashMap::new(),
        }
    }

    fn push(&mut self, violation: Violation) {
        self.violations.push_back(violation);
        while self.violations.len() > self.max {
            self.violations.pop_front();
            self.dropped += 1;
        }
    }

    fn total(&self) -> usize {
        self.violations.len() + self.dropped
    }
}

/// Detects and records reads that bypass the request coordinator.
pub struct AccessGuard {
    config: GuardConfig,
    clock: Arc<dyn Clock>,
    ledger: Mutex<Ledger>,
    intercepted: AtomicBool,
}

impl AccessGuard {
    pub fn new(config: GuardConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: GuardConfig, clock: Arc<dyn Clock>) -> Self {
        let ledger = Mutex::new(Ledger::new(config.max_violations));
        Self {
            config,
            clock,
            ledger,
            intercepted: AtomicBool::new(false),
        }
    }

    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// Wrap `inner` so every call to the remote service is checked.
    ///
    /// A guard intercepts exactly once; a second call fails with
    /// [`GuardError::AlreadyIntercepted`].
    pub fn intercept(
        self: &Arc<Self>,
        inner: Arc<dyn Transport>,
    ) -> Result<GuardedTransport, GuardError> {
        if self.intercepted.swap(true, Ordering::SeqCst) {
            return Err(GuardError::AlreadyIntercepted);
        }
        info!(
            service_url = %self.config.service_url,
            mode = ?self.config.mode,
            "Outbound transport intercepted"
        );
        Ok(GuardedTransport {
            guard: Arc::clone(self),
            inner,
        })
    }

    pub fn is_intercepting(&self) -> bool {
        self.intercepted.load(Ordering::SeqCst)
    }

    /// True when `url` addresses the remote data service.
    pub fn targets_service(&self, url: &str) -> bool {
        let base = self.config.service_url.trim_end_matches('/');
        match url.strip_prefix(base) {
            Some(rest) => rest.is_empty() || rest.starts_with(['/', '?', '#']),
            None => false,
        }
    }

    /// Check one call to the remote service.
    ///
    /// Calls from an allowed origin pass. Anything else is recorded as an
    /// `UNAUTHORIZED_CALL`; strict mode additionally refuses it.
    pub fn check_call(&self, url: &str, site: &CallSite) -> Result<(), TransportError> {
        if site.matches_any(&self.config.allowed_origins) {
            debug!(url = %url, origins = ?site.origins, "Coordinated call allowed");
            return Ok(());
        }

        let caller = site.caller();
        let violation = Violation::unauthorized_call(caller.clone(), url, self.clock.now());
        warn!(
            caller = %caller,
            url = %url,
            strict = self.config.mode.is_strict(),
            "Unauthorized call to remote service"
        );

        let mut ledger = self.ledger();
        ledger.push(violation);
        if self.config.mode.is_strict() {
            *ledger.blocked.entry(caller.clone()).or_insert(0) += 1;
            return Err(TransportError::Blocked {
                url: url.to_string(),
                caller,
            });
        }
        Ok(())
    }

    /// Record a violation reported by the host.
    pub fn record_violation(&self, violation: Violation) {
        warn!(
            violation_type = %violation.violation_type,
            caller = %violation.caller,
            location = %violation.location,
            "Violation recorded"
        );
        self.ledger().push(violation);
    }

    /// Record every diagnostic from a static scan. Returns how many were added.
    pub fn record_scan(&self, report: &ScanReport) -> usize {
        let violations = report.to_violations(self.clock.now());
        let added = violations.len();
        let mut ledger = self.ledger();
        for violation in violations {
            ledger.push(violation);
        }
        added
    }

    /// Retained violations, oldest first.
    pub fn violations(&self) -> Vec<Violation> {
        self.ledger().violations.iter().cloned().collect()
    }

    /// Violations recorded since the last reset, including any dropped
    /// from the ledger once it reached `max_violations`.
    pub fn violation_count(&self) -> usize {
        self.ledger().total()
    }

    pub fn blocked_calls(&self) -> HashMap<String, u64> {
        self.ledger().blocked.clone()
    }

    pub fn report(&self) -> ViolationReport {
        let ledger = self.ledger();
        ViolationReport::new(
            ledger.violations.iter().cloned().collect(),
            &ledger.blocked,
            self.clock.now(),
        )
    }

    /// Clear the violation list, the dropped count and blocked-call counts.
    pub fn reset_violations(&self) {
        let mut ledger = self.ledger();
        let cleared = ledger.total();
        ledger.violations.clear();
        ledger.dropped = 0;
        ledger.blocked.clear();
        info!(cleared, "Violations reset");
    }
}

/// Transport wrapper installed by [`AccessGuard::intercept`].
pub struct GuardedTransport {
    guard: Arc<AccessGuard>,
    inner: Arc<dyn Transport>,
}

impl GuardedTransport {
    pub fn guard(&self) -> &Arc<AccessGuard> {
        &self.guard
    }
}

#[async_trait]
impl Transport for GuardedTransport {
    async fn send(&self, request: OutboundRequest) -> Result<OutboundResponse, TransportError> {
        if self.guard.targets_service(&request.url) {
            let site = CallSite::capture(self.guard.config.inspect_backtrace);
            self.guard.check_call(&request.url, &site)?;
        }
        self.inner.send(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use warden_core::{in_origin, EnforcementMode, ViolationType};

    #[derive(Default)]
    struct CountingTransport {
        sent: AtomicUsize,
    }

    #[async_trait]
    impl Transport for CountingTransport {
        async fn send(
            &self,
            _request: OutboundRequest,
        ) -> Result<OutboundResponse, TransportError> {
            self.sent.fetch_add(1, Ordering::SeqCst);
            Ok(OutboundResponse {
                status: 200,
                body: json!([]),
            })
        }
    }

    const SERVICE: &str = "https://db.example.test";

    fn guarded(mode: EnforcementMode) -> (GuardedTransport, Arc<CountingTransport>) {
        let guard = Arc::new(AccessGuard::new(
            GuardConfig::default().with_service_url(SERVICE).with_mode(mode),
        ));
        let inner = Arc::new(CountingTransport::default());
        let transport = guard.intercept(inner.clone()).unwrap();
        (transport, inner)
    }

    fn service_get(path: &str) -> OutboundRequest {
        OutboundRequest::get(format!("{}{}", SERVICE, path))
    }

    #[test]
    fn test_targets_service() {
        let guard = AccessGuard::new(GuardConfig::default().with_service_url("https://db.example.test/"));
        assert!(guard.targets_service("https://db.example.test/rest/v1/items"));
        assert!(guard.targets_service("https://db.example.test"));
        assert!(guard.targets_service("https://db.example.test?x=1"));
        assert!(!guard.targets_service("https://db.example.test.evil/rest"));
        assert!(!guard.targets_service("https://cdn.example.test/img.png"));
    }

    #[test]
    fn test_intercept_twice_fails() {
        let guard = Arc::new(AccessGuard::new(GuardConfig::default()));
        let inner: Arc<dyn Transport> = Arc::new(CountingTransport::default());
        assert!(guard.intercept(Arc::clone(&inner)).is_ok());
        assert!(guard.is_intercepting());
        assert!(matches!(
            guard.intercept(inner),
            Err(GuardError::AlreadyIntercepted)
        ));
    }

    #[tokio::test]
    async fn test_coordinated_call_passes_without_violation() {
        let (transport, inner) = guarded(EnforcementMode::Strict);
        let response = in_origin("RequestCoordinator", transport.send(service_get("/rest/v1/a")))
            .await
            .unwrap();
        assert!(response.is_success());
        assert_eq!(inner.sent.load(Ordering::SeqCst), 1);
        assert_eq!(transport.guard().violation_count(), 0);
    }

    #[tokio::test]
    async fn test_strict_mode_blocks_and_records() {
        let (transport, inner) = guarded(EnforcementMode::Strict);
        let err = in_origin("ArticleCard", transport.send(service_get("/rest/v1/a")))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            TransportError::Blocked {
                url: format!("{}/rest/v1/a", SERVICE),
                caller: "ArticleCard".to_string(),
            }
        );
        assert_eq!(inner.sent.load(Ordering::SeqCst), 0);

        let guard = transport.guard();
        let violations = guard.violations();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].violation_type, ViolationType::UnauthorizedCall);
        assert_eq!(violations[0].caller, "ArticleCard");
        assert_eq!(guard.blocked_calls().get("ArticleCard"), Some(&1));
    }

    #[tokio::test]
    async fn test_advisory_mode_records_and_proceeds() {
        let (transport, inner) = guarded(EnforcementMode::Advisory);
        transport.send(service_get("/rest/v1/a")).await.unwrap();

        assert_eq!(inner.sent.load(Ordering::SeqCst), 1);
        let violations = transport.guard().violations();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].caller, "unknown");
        assert!(transport.guard().blocked_calls().is_empty());
    }

    #[tokio::test]
    async fn test_other_hosts_are_not_checked() {
        let (transport, inner) = guarded(EnforcementMode::Strict);
        transport
            .send(OutboundRequest::get("https://cdn.example.test/a.png"))
            .await
            .unwrap();
        assert_eq!(inner.sent.load(Ordering::SeqCst), 1);
        assert_eq!(transport.guard().violation_count(), 0);
    }

    #[tokio::test]
    async fn test_reset_clears_violations_and_blocks() {
        let (transport, _) = guarded(EnforcementMode::Strict);
        let _ = in_origin("Feed", transport.send(service_get("/rest/v1/a"))).await;
        let guard = transport.guard();
        assert_eq!(guard.violation_count(), 1);

        guard.reset_violations();
        assert_eq!(guard.violation_count(), 0);
        assert!(guard.blocked_calls().is_empty());
        assert!(guard.report().is_clean());
    }

    #[test]
    fn test_report_aggregates_by_type_and_component() {
        let guard = AccessGuard::new(GuardConfig::default());
        let now = chrono::Utc::now();
        guard.record_violation(Violation::unauthorized_call("X", "a", now));
        guard.record_violation(Violation::unauthorized_call("X", "b", now));
        guard.record_violation(Violation::unauthorized_call("Y", "c", now));

        let report = guard.report();
        assert_eq!(report.by_type.get(&ViolationType::UnauthorizedCall), Some(&3));
        assert_eq!(report.by_component.get("X"), Some(&2));
        assert_eq!(report.by_component.get("Y"), Some(&1));
    }

    #[test]
    fn test_ledger_keeps_newest_violations() {
        let guard = AccessGuard::new(GuardConfig::default().with_max_violations(3));
        let now = chrono::Utc::now();
        for url in ["a", "b", "c", "d", "e"] {
            guard.record_violation(Violation::unauthorized_call("X", url, now));
        }

        let kept: Vec<String> = guard.violations().into_iter().map(|v| v.location).collect();
        assert_eq!(kept, vec!["c", "d", "e"]);
        assert_eq!(guard.violation_count(), 5);
        assert_eq!(guard.report().total, 3);

        guard.reset_violations();
        assert_eq!(guard.violation_count(), 0);
        assert!(guard.violations().is_empty());
    }
}
