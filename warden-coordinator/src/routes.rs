//! Route plans and page assembly.
//!
//! A route resolves to a small fixed set of bulk reads. Once every read has
//! settled, their payloads are folded into one [`PageData`] in plan order.
//! Missing or mistyped payload fields fall back to empty defaults so a page
//! is always well-formed.

use serde_json::{Map, Value};
use warden_core::{ConfigData, ContentData, PageData, UserData};

use crate::source::BulkRead;

/// Page routes the coordinator knows how to load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageRoute {
    Home,
    Issues,
    IssueDetail(String),
    Unknown,
}

impl PageRoute {
    /// Parse a request path. Query strings, fragments and trailing slashes
    /// are ignored.
    pub fn parse(route: &str) -> Self {
        let path = route
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .trim()
            .trim_end_matches('/');

        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        match segments.as_slice() {
            [] => Self::Home,
            ["issues"] => Self::Issues,
            ["issues", id] => Self::IssueDetail((*id).to_string()),
            _ => Self::Unknown,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

/// The bulk reads one page load will issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePlan {
    pub route: PageRoute,
    pub reads: Vec<BulkRead>,
}

impl RoutePlan {
    /// Choose reads for `route`. A user id adds the interaction read on
    /// known routes; unknown routes read nothing.
    pub fn resolve(route: &str, user_id: Option<&str>) -> Self {
        let route = PageRoute::parse(route);
        let mut reads = match &route {
            PageRoute::Home => vec![BulkRead::HomeContent, BulkRead::SiteConfig],
            PageRoute::Issues => vec![BulkRead::IssuesContent, BulkRead::SiteConfig],
            PageRoute::IssueDetail(id) => vec![BulkRead::IssueDetail {
                issue_id: id.clone(),
            }],
            PageRoute::Unknown => Vec::new(),
        };

        if route.is_known() {
            if let Some(user_id) = user_id.map(str::trim).filter(|u| !u.is_empty()) {
                reads.push(BulkRead::UserInteractions {
                    user_id: user_id.to_string(),
                });
            }
        }

        Self { route, reads }
    }

    pub fn is_empty(&self) -> bool {
        self.reads.is_empty()
    }

    /// Fold settled payloads into a page bundle.
    pub fn assemble(&self, results: &[(BulkRead, Value)]) -> PageData {
        let mut page = PageData::empty();
        for (read, payload) in results {
            match read {
                BulkRead::HomeContent => {
                    page.content_data = content_from(payload);
                    // The home feed promotes its newest item when nothing is pinned.
                    if page.content_data.featured_item.is_none() {
                        page.content_data.featured_item = page.content_data.items.first().cloned();
                    }
                }
                BulkRead::IssuesContent => {
                    page.content_data = content_from(payload);
                }
                BulkRead::IssueDetail { issue_id } => {
                    page.content_data = issue_detail_from(payload, issue_id);
                }
                BulkRead::SiteConfig => {
                    page.config_data = config_from(payload);
                }
                BulkRead::UserInteractions { .. } => {
                    page.user_data = user_from(payload);
                }
            }
        }
        page
    }
}

fn array_field(payload: &Value, field: &str) -> Vec<Value> {
    payload
        .get(field)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

fn object_field(payload: &Value, field: &str) -> Map<String, Value> {
    payload
        .get(field)
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

fn present(payload: &Value, field: &str) -> Option<Value> {
    payload.get(field).filter(|v| !v.is_null()).cloned()
}

fn content_from(payload: &Value) -> ContentData {
    ContentData {
        items: array_field(payload, "items"),
        featured_item: present(payload, "featured"),
        metadata: object_field(payload, "metadata"),
    }
}

fn issue_detail_from(payload: &Value, issue_id: &str) -> ContentData {
    let issue = present(payload, "issue").filter(Value::is_object);
    let mut metadata = object_field(payload, "metadata");
    metadata
        .entry("issue_id".to_string())
        .or_insert_with(|| Value::String(issue_id.to_string()));

    ContentData {
        items: array_field(payload, "articles"),
        featured_item: issue,
        metadata,
    }
}

fn config_from(payload: &Value) -> ConfigData {
    let section_visibility = object_field(payload, "section_visibility")
        .into_iter()
        .filter_map(|(section, visible)| visible.as_bool().map(|v| (section, v)))
        .collect();

    ConfigData {
        section_visibility,
        settings: object_field(payload, "settings"),
    }
}

fn user_from(payload: &Value) -> UserData {
    UserData {
        bookmarks: array_field(payload, "bookmarks"),
        reactions: array_field(payload, "reactions"),
        permissions: object_field(payload, "permissions"),
    }
}
