//! Remote data source abstraction.
//!
//! The coordinator never talks to the network itself. Page loads go through
//! a [`RemoteSource`], one call per [`BulkRead`]; ad-hoc reads go through
//! caller-supplied fetch closures.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use warden_core::FetchError;

/// One network operation that may batch several logical queries.
///
/// Each variant counts once against the page budget.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BulkRead {
    /// Home feed items, featured item and feed metadata
    HomeContent,
    /// Issue archive listing
    IssuesContent,
    /// A single issue with its articles
    IssueDetail { issue_id: String },
    /// Section visibility and site settings
    SiteConfig,
    /// Bookmarks, reactions and permissions for one user
    UserInteractions { user_id: String },
}

impl BulkRead {
    /// Stable cache key for this read.
    ///
    /// Keys share prefixes by area so substring invalidation can target a
    /// whole area (`"issues"` covers the archive and every detail page).
    pub fn cache_key(&self) -> String {
        match self {
            Self::HomeContent => "home-content".to_string(),
            Self::IssuesContent => "issues-content".to_string(),
            Self::IssueDetail { issue_id } => format!("issues-detail:{}", issue_id),
            Self::SiteConfig => "site-config".to_string(),
            Self::UserInteractions { user_id } => format!("user-interactions:{}", user_id),
        }
    }
}

impl fmt::Display for BulkRead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cache_key())
    }
}

/// Backend that performs bulk reads against the remote data service.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Execute one bulk read and return its raw payload.
    async fn fetch(&self, read: &BulkRead) -> Result<Value, FetchError>;
}
