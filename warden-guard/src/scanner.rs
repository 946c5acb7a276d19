//! Static source scanner.
//!
//! Advisory build tooling: flags component files that import the remote
//! service client, query it directly, or fetch without a coordination
//! marker. Findings are returned as data and never halt anything.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use walkdir::WalkDir;
use warden_core::{GuardError, Severity, Timestamp, Violation, ViolationType};

use crate::rules::{PathClass, ScanRules};

/// Suggested fix attached to every diagnostic.
pub const REMEDIATION: &str =
    "Use the coordinated data-access entry point (RequestCoordinator::load_page_data) instead";

/// One finding from the static scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub file: String,
    /// 1-based line number
    pub line: usize,
    /// 1-based byte column of the match
    pub column: usize,
    pub rule: String,
    pub violation_type: ViolationType,
    pub severity: Severity,
    pub message: String,
    pub remediation: String,
    pub snippet: String,
}

impl Diagnostic {
    /// Turn the finding into a ledger entry. The file stands in for the caller.
    pub fn to_violation(&self, detected_at: Timestamp) -> Violation {
        Violation::new(
            self.violation_type,
            self.file.clone(),
            format!("{}:{}:{}", self.file, self.line, self.column),
            self.severity,
            format!("{}. {}", self.message, self.remediation),
            detected_at,
        )
    }
}

/// Result of scanning one or more files.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    pub files_scanned: usize,
    pub diagnostics: Vec<Diagnostic>,
    pub by_type: BTreeMap<ViolationType, usize>,
}

impl ScanReport {
    fn push(&mut self, diagnostic: Diagnostic) {
        *self.by_type.entry(diagnostic.violation_type).or_insert(0) += 1;
        self.diagnostics.push(diagnostic);
    }

    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.diagnostics.len() - self.error_count()
    }

    pub fn to_violations(&self, detected_at: Timestamp) -> Vec<Violation> {
        self.diagnostics
            .iter()
            .map(|d| d.to_violation(detected_at))
            .collect()
    }
}

/// Line-oriented scanner over host source text.
#[derive(Debug, Clone)]
pub struct StaticScanner {
    rules: ScanRules,
}

impl StaticScanner {
    pub fn new(rules: ScanRules) -> Self {
        Self { rules }
    }

    /// Scanner over the built-in TypeScript rule set.
    pub fn with_default_rules() -> Result<Self, GuardError> {
        Ok(Self::new(ScanRules::defaults()?))
    }

    pub fn rules(&self) -> &ScanRules {
        &self.rules
    }

    /// Scan source text whose classification is already known. Only
    /// component files produce diagnostics.
    pub fn scan_source(&self, file: &str, source: &str, class: PathClass) -> Vec<Diagnostic> {
        if class != PathClass::Component {
            return Vec::new();
        }

        let mut diagnostics = Vec::new();
        for (index, line) in source.lines().enumerate() {
            for rule in &self.rules.rules {
                if let Some(column) = rule.find(line) {
                    diagnostics.push(Diagnostic {
                        file: file.to_string(),
                        line: index + 1,
                        column: column + 1,
                        rule: rule.name.to_string(),
                        violation_type: rule.violation_type,
                        severity: rule.severity,
                        message: rule.message.to_string(),
                        remediation: REMEDIATION.to_string(),
                        snippet: line.trim().to_string(),
                    });
                }
            }
        }
        diagnostics
    }

    /// Classify `file` by path, then scan it.
    pub fn scan_file(&self, file: &str, source: &str) -> Vec<Diagnostic> {
        self.scan_source(file, source, self.rules.classify(file))
    }

    /// Walk `root` and scan every file with a configured extension.
    ///
    /// Paths in the report are relative to `root` with `/` separators.
    /// Files that are not valid UTF-8 are skipped.
    pub fn scan_tree(&self, root: impl AsRef<Path>) -> Result<ScanReport, GuardError> {
        let root = root.as_ref();
        let mut report = ScanReport::default();

        let walker = WalkDir::new(root).follow_links(false).into_iter();
        let entries = walker.filter_entry(|entry| {
            entry.depth() == 0
                || !entry.file_type().is_dir()
                || !self
                    .rules
                    .skips_dir(&entry.file_name().to_string_lossy())
        });

        for entry in entries {
            let entry = entry.map_err(|e| GuardError::Scan {
                path: e
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| root.display().to_string()),
                reason: e.to_string(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let wanted = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| self.rules.wants_extension(ext));
            if !wanted {
                continue;
            }

            let relative = path
                .strip_prefix(root)
                .unwrap_or(path)
                .to_string_lossy()
                .replace('\\', "/");

            let source = match std::fs::read_to_string(path) {
                Ok(source) => source,
                Err(e) if e.kind() == ErrorKind::InvalidData => {
                    debug!(file = %relative, "Skipping non-UTF-8 file");
                    continue;
                }
                Err(e) => {
                    return Err(GuardError::Scan {
                        path: path.display().to_string(),
                        reason: e.to_string(),
                    })
                }
            };

            report.files_scanned += 1;
            for diagnostic in self.scan_file(&relative, &source) {
                report.push(diagnostic);
            }
        }

        report
            .diagnostics
            .sort_by(|a, b| (&a.file, a.line, a.column).cmp(&(&b.file, b.line, b.column)));

        info!(
            root = %root.display(),
            files = report.files_scanned,
            errors = report.error_count(),
            warnings = report.warning_count(),
            "Static scan complete"
        );
        Ok(report)
    }
}
