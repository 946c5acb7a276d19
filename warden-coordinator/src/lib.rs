//! WARDEN Coordinator
//!
//! Single sanctioned gateway between page-rendering code and the remote
//! data service: in-flight deduplication, TTL caching, a per-page request
//! budget and route-specific page assembly.

mod budget;
mod cache;
pub mod coordinator;
pub mod routes;
pub mod source;

pub use budget::BudgetTracker;
pub use cache::CacheStats;
pub use coordinator::{RequestCoordinator, COORDINATOR_ORIGIN};
pub use routes::{PageRoute, RoutePlan};
pub use source::{BulkRead, RemoteSource};
