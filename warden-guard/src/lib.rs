//! WARDEN Guard
//!
//! Detects callers that read the remote data service without going through
//! the request coordinator. Two layers:
//!
//! - a static scanner over host source files ([`StaticScanner`]), meant for
//!   build tooling
//! - a runtime wrapper around the outbound transport ([`AccessGuard`],
//!   [`GuardedTransport`]) that attributes each call and records violations

pub mod callsite;
pub mod guard;
pub mod report;
pub mod rules;
pub mod scanner;
pub mod transport;

pub use callsite::CallSite;
pub use guard::{AccessGuard, GuardedTransport};
pub use report::ViolationReport;
pub use rules::{PathClass, RulePatterns, ScanRules};
pub use scanner::{Diagnostic, ScanReport, StaticScanner};
pub use transport::{HttpTransport, OutboundRequest, OutboundResponse, Transport};
