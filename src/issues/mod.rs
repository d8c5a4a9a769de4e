// Issues module - non-fatal observations about a run

pub mod detectors;

pub use detectors::{
    ChildIssueDetector, IssueDetector, PatternDetector, PatternRule, PrintUsageDetector,
    RunTrace, Stream, default_detectors,
};

use serde::{Deserialize, Serialize};

/// Issue code for output written to the terminal instead of a file
pub const PRINT_USAGE: &str = "print_usage";
/// Issue code for warnings emitted on stderr
pub const STDERR_WARNING: &str = "stderr_warning";
/// Issue code for a tagged value formatted as plain text
pub const TAGGED_VALUE_FORMATTED: &str = "tagged_value_formatted";

/// Issue severity; issues never fail a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Soft,
}

/// A discouraged but non-fatal pattern observed during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    #[serde(default)]
    pub severity: Severity,
    pub code: String,
    pub explanation: String,
}

impl Issue {
    pub fn soft(code: impl Into<String>, explanation: impl Into<String>) -> Self {
        Self {
            severity: Severity::Soft,
            code: code.into(),
            explanation: explanation.into(),
        }
    }
}

impl std::fmt::Display for Issue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.explanation)
    }
}

/// Ordered, append-only log of issues for one run
#[derive(Debug, Clone, Default)]
pub struct IssueCollector {
    issues: Vec<Issue>,
}

impl IssueCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, issue: Issue) {
        self.issues.push(issue);
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.issues.iter().any(|i| i.code == code)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter()
    }

    pub fn into_issues(self) -> Vec<Issue> {
        self.issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collector_keeps_order() {
        let mut c = IssueCollector::new();
        c.push(Issue::soft(PRINT_USAGE, "first"));
        c.push(Issue::soft(STDERR_WARNING, "second"));
        assert!(c.has_code(PRINT_USAGE));
        assert!(!c.has_code("other"));
        let codes: Vec<_> = c.into_issues().into_iter().map(|i| i.code).collect();
        assert_eq!(codes, vec![PRINT_USAGE, STDERR_WARNING]);
    }

    #[test]
    fn test_display() {
        let issue = Issue::soft(PRINT_USAGE, "printed to the console");
        assert_eq!(issue.to_string(), "[print_usage] printed to the console");
    }
}
