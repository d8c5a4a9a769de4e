// Issue detectors - predicates over a finished run that append soft issues

use super::{Issue, IssueCollector, PRINT_USAGE, STDERR_WARNING};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// What a detector gets to look at once the child has exited
#[derive(Debug, Clone, Copy)]
pub struct RunTrace<'a> {
    pub stdout: &'a str,
    pub stderr: &'a str,
    /// Issues the child reported itself over the event channel
    pub reported: &'a [Issue],
}

/// Captured stream a pattern applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stream {
    Stdout,
    Stderr,
}

/// Detector trait; the issue taxonomy grows by adding implementations
pub trait IssueDetector: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Inspect the trace and append any issues found
    fn inspect(&self, trace: &RunTrace<'_>, issues: &mut IssueCollector);
}

/// Flags any output written to the terminal instead of a file
pub struct PrintUsageDetector;

impl IssueDetector for PrintUsageDetector {
    fn name(&self) -> &str {
        PRINT_USAGE
    }

    fn inspect(&self, trace: &RunTrace<'_>, issues: &mut IssueCollector) {
        if trace.stdout.trim().is_empty() {
            return;
        }
        issues.push(Issue::soft(
            PRINT_USAGE,
            "Your code uses the `print` function (or writes to standard output). \
             Do not print to the console; write all results to the requested output files.",
        ));
    }
}

/// Forwards issues the child reported through the interception layer
pub struct ChildIssueDetector;

impl IssueDetector for ChildIssueDetector {
    fn name(&self) -> &str {
        "child_reported"
    }

    fn inspect(&self, trace: &RunTrace<'_>, issues: &mut IssueCollector) {
        let mut seen = HashSet::new();
        for issue in trace.reported {
            if seen.insert((&issue.code, &issue.explanation)) {
                issues.push(issue.clone());
            }
        }
    }
}

/// A configurable regex rule, loadable from the policy file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternRule {
    pub code: String,
    pub stream: Stream,
    pub pattern: String,
    pub explanation: String,
}

/// Raises one issue when `pattern` matches a line of the chosen stream
pub struct PatternDetector {
    rule: PatternRule,
    regex: Regex,
}

impl PatternDetector {
    pub fn new(rule: PatternRule) -> Result<Self, regex::Error> {
        let regex = Regex::new(&rule.pattern)?;
        Ok(Self { rule, regex })
    }

    /// Warnings printed on stderr by the interpreter or libraries
    pub fn stderr_warnings() -> Self {
        Self::new(PatternRule {
            code: STDERR_WARNING.to_string(),
            stream: Stream::Stderr,
            pattern: r"\b[A-Za-z]*Warning\b".to_string(),
            explanation: "Your code produced warnings".to_string(),
        })
        .expect("Invalid built-in warning pattern")
    }
}

impl IssueDetector for PatternDetector {
    fn name(&self) -> &str {
        &self.rule.code
    }

    fn inspect(&self, trace: &RunTrace<'_>, issues: &mut IssueCollector) {
        let text = match self.rule.stream {
            Stream::Stdout => trace.stdout,
            Stream::Stderr => trace.stderr,
        };

        if let Some(line) = text.lines().find(|l| self.regex.is_match(l)) {
            issues.push(Issue::soft(
                self.rule.code.clone(),
                format!("{}:\n{}", self.rule.explanation, line.trim()),
            ));
        }
    }
}

/// Detectors every sandbox runs unless configured otherwise
pub fn default_detectors() -> Vec<Box<dyn IssueDetector>> {
    vec![
        Box::new(PrintUsageDetector),
        Box::new(ChildIssueDetector),
        Box::new(PatternDetector::stderr_warnings()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issues::TAGGED_VALUE_FORMATTED;

    fn run_all(trace: RunTrace<'_>) -> IssueCollector {
        let mut issues = IssueCollector::new();
        for d in default_detectors() {
            d.inspect(&trace, &mut issues);
        }
        issues
    }

    #[test]
    fn test_quiet_run_has_no_issues() {
        let issues = run_all(RunTrace {
            stdout: "",
            stderr: "",
            reported: &[],
        });
        assert!(issues.is_empty());
    }

    #[test]
    fn test_stdout_is_print_usage() {
        let issues = run_all(RunTrace {
            stdout: "hello\n",
            stderr: "",
            reported: &[],
        });
        assert!(issues.has_code(PRINT_USAGE));
        assert_eq!(issues.len(), 1);
    }

    #[test]
    fn test_stderr_warning_quotes_line() {
        let issues = run_all(RunTrace {
            stdout: "",
            stderr: "x.py:3: RuntimeWarning: divide by zero\n",
            reported: &[],
        });
        let issue = issues.iter().next().unwrap();
        assert_eq!(issue.code, STDERR_WARNING);
        assert!(issue.explanation.contains("divide by zero"));
    }

    #[test]
    fn test_reported_issues_are_deduplicated() {
        let reported = vec![
            Issue::soft(TAGGED_VALUE_FORMATTED, "pvalue formatted"),
            Issue::soft(TAGGED_VALUE_FORMATTED, "pvalue formatted"),
        ];
        let issues = run_all(RunTrace {
            stdout: "",
            stderr: "",
            reported: &reported,
        });
        assert_eq!(issues.len(), 1);
    }

    #[test]
    fn test_custom_pattern_rule() {
        let detector = PatternDetector::new(PatternRule {
            code: "absolute_path".into(),
            stream: Stream::Stdout,
            pattern: r"/home/\w+".into(),
            explanation: "Avoid absolute paths".into(),
        })
        .unwrap();
        let mut issues = IssueCollector::new();
        detector.inspect(
            &RunTrace {
                stdout: "saved to /home/alice/x\n",
                stderr: "",
                reported: &[],
            },
            &mut issues,
        );
        assert!(issues.has_code("absolute_path"));
    }
}
