//! Static scan rules and path classification.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use warden_core::{GuardError, Severity, ViolationType};

/// Default rule set, compiled once. Holds the compile result so a bad
/// built-in pattern surfaces as an error instead of a panic.
pub static DEFAULT_RULES: Lazy<Result<ScanRules, GuardError>> =
    Lazy::new(|| ScanRules::compile(&RulePatterns::default()));

/// How a source file is treated by the static scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathClass {
    /// Rendering code; must not reach the remote service directly
    Component,
    /// Core, hook or utility code; allowed to talk to the remote service
    Allowed,
    /// Neither; not scanned
    Ignored,
}

/// Raw rule configuration, as it would appear in a config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulePatterns {
    /// Import of the remote-service client
    pub client_import: String,
    /// Direct use of the client's query surface
    pub direct_query: String,
    /// Any data-fetching call
    pub data_fetch: String,
    /// Marker that exempts a data-fetching call on the same line
    pub coordination_marker: String,
    /// Directories marking allowed files
    pub allowed_dirs: Vec<String>,
    /// Directories marking component files
    pub component_dirs: Vec<String>,
    /// File extensions scanned by `scan_tree`
    pub extensions: Vec<String>,
    /// Directory names never descended into
    pub skip_dirs: Vec<String>,
}

impl Default for RulePatterns {
    /// Patterns for a TypeScript/React host talking to a Supabase-style client.
    fn default() -> Self {
        Self {
            client_import: r#"(\bfrom\s+['"][^'"]*supabase[^'"]*['"]|\brequire\(\s*['"][^'"]*supabase[^'"]*['"]\s*\))"#
                .to_string(),
            direct_query: r"\bsupabase\s*\.\s*(from|rpc|storage|channel)\s*\(".to_string(),
            data_fetch: r"(\buseQuery\s*\(|\bfetch\s*\()".to_string(),
            coordination_marker: r"(?i)(coordinated|useCoordinatedData|RequestCoordinator)"
                .to_string(),
            allowed_dirs: ["core/", "hooks/", "utils/", "lib/", "integrations/"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            component_dirs: ["components/", "pages/", "app/"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            extensions: ["ts", "tsx", "js", "jsx"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            skip_dirs: ["node_modules", ".git", "dist", "build", "target"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// One compiled line rule.
#[derive(Debug, Clone)]
pub struct LineRule {
    pub name: &'static str,
    pub pattern: Regex,
    pub violation_type: ViolationType,
    pub severity: Severity,
    pub message: &'static str,
    /// Lines matching this are exempt from the rule.
    pub exempt: Option<Regex>,
}

impl LineRule {
    /// Byte column of the first match on `line`, unless the line is exempt.
    pub fn find(&self, line: &str) -> Option<usize> {
        let m = self.pattern.find(line)?;
        if self.exempt.as_ref().is_some_and(|re| re.is_match(line)) {
            return None;
        }
        Some(m.start())
    }
}

/// Compiled rules used by the scanner.
#[derive(Debug, Clone)]
pub struct ScanRules {
    pub rules: Vec<LineRule>,
    pub allowed_dirs: Vec<String>,
    pub component_dirs: Vec<String>,
    pub extensions: Vec<String>,
    pub skip_dirs: Vec<String>,
}

/// True when `segments` ends with the segments of `dir` (`"src/app/"` spans two).
fn ends_with_dir(segments: &[&str], dir: &str) -> bool {
    let dir: Vec<&str> = dir.split('/').filter(|s| !s.is_empty()).collect();
    !dir.is_empty() && segments.ends_with(&dir)
}

fn compile_one(rule: &str, pattern: &str) -> Result<Regex, GuardError> {
    Regex::new(pattern).map_err(|e| GuardError::InvalidPattern {
        rule: rule.to_string(),
        reason: e.to_string(),
    })
}

impl ScanRules {
    pub fn compile(patterns: &RulePatterns) -> Result<Self, GuardError> {
        let marker = compile_one("coordination_marker", &patterns.coordination_marker)?;
        let rules = vec![
            LineRule {
                name: "client_import",
                pattern: compile_one("client_import", &patterns.client_import)?,
                violation_type: ViolationType::DirectImport,
                severity: Severity::Error,
                message: "Component imports the remote-service client directly",
                exempt: None,
            },
            LineRule {
                name: "direct_query",
                pattern: compile_one("direct_query", &patterns.direct_query)?,
                violation_type: ViolationType::BypassCoordinator,
                severity: Severity::Error,
                message: "Component queries the remote service directly",
                exempt: None,
            },
            LineRule {
                name: "data_fetch",
                pattern: compile_one("data_fetch", &patterns.data_fetch)?,
                violation_type: ViolationType::BypassCoordinator,
                severity: Severity::Warning,
                message: "Component fetches data without a coordination marker",
                exempt: Some(marker),
            },
        ];

        Ok(Self {
            rules,
            allowed_dirs: patterns.allowed_dirs.clone(),
            component_dirs: patterns.component_dirs.clone(),
            extensions: patterns
                .extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            skip_dirs: patterns.skip_dirs.clone(),
        })
    }

    /// Clone of the built-in rule set.
    pub fn defaults() -> Result<Self, GuardError> {
        (*DEFAULT_RULES).clone()
    }

    /// Classify a path by the configured directory nearest the file, so
    /// `components/hooks/useX.ts` is allowed and `lib/app/components/A.tsx`
    /// is a component. Directories above the project, as in an absolute
    /// path, only count when nothing nearer matches.
    pub fn classify(&self, path: &str) -> PathClass {
        let normalized = path.replace('\\', "/");
        let mut segments: Vec<&str> = normalized.split('/').filter(|s| !s.is_empty()).collect();
        // The file name is not a directory.
        segments.pop();

        for end in (1..=segments.len()).rev() {
            let prefix = &segments[..end];
            if self.allowed_dirs.iter().any(|dir| ends_with_dir(prefix, dir)) {
                return PathClass::Allowed;
            }
            if self.component_dirs.iter().any(|dir| ends_with_dir(prefix, dir)) {
                return PathClass::Component;
            }
        }
        PathClass::Ignored
    }

    pub fn wants_extension(&self, extension: &str) -> bool {
        let extension = extension.to_ascii_lowercase();
        self.extensions.iter().any(|e| *e == extension)
    }

    pub fn skips_dir(&self, name: &str) -> bool {
        self.skip_dirs.iter().any(|d| d == name)
    }
}
