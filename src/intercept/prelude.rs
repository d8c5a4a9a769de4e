// Prelude rendering - per-dialect files that put the policy into effect inside the child

use super::error::{InterceptError, Result};
use super::policy::{InterceptPolicy, TaggedCallable};
use super::{FAULT_EXIT_CODE, FORBIDDEN_EXIT_CODE};
use crate::sandbox::Dialect;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::warn;

/// Python launcher script, written next to the code unit
pub const LAUNCHER_FILE: &str = "launcher.py";
/// Resolved policy read by the launcher
pub const POLICY_FILE: &str = "policy.json";
/// Shell functions sourced before the code unit
pub const SHELL_PRELUDE_FILE: &str = "prelude.sh";
/// Environment variable naming the event file
pub const EVENTS_ENV: &str = "SANDBOX_EVENTS";

const LAUNCHER: &str = include_str!("launcher.py");

/// Files to install plus the text placed ahead of the code unit
#[derive(Debug, Clone)]
pub struct Prelude {
    pub files: Vec<(&'static str, String)>,
    /// Prepended to the code file; its line count offsets reported line numbers
    pub launch_header: String,
}

#[derive(Serialize)]
struct LauncherPolicy<'a> {
    forbidden: &'a BTreeSet<String>,
    tagged: &'a [TaggedCallable],
    forbidden_exit: i32,
    fault_exit: i32,
}

pub fn render(dialect: &Dialect, policy: &InterceptPolicy, control_dir: &Path) -> Result<Prelude> {
    for symbol in &policy.forbidden {
        if !is_valid_symbol(dialect, symbol) {
            return Err(InterceptError::InvalidSymbol {
                symbol: symbol.clone(),
                dialect: dialect.name().to_string(),
            });
        }
    }

    match dialect {
        Dialect::Python { .. } => {
            for tagged in &policy.tagged {
                if !is_valid_symbol(dialect, &tagged.path) {
                    return Err(InterceptError::InvalidSymbol {
                        symbol: tagged.path.clone(),
                        dialect: dialect.name().to_string(),
                    });
                }
            }

            let json = serde_json::to_string_pretty(&LauncherPolicy {
                forbidden: &policy.forbidden,
                tagged: &policy.tagged,
                forbidden_exit: FORBIDDEN_EXIT_CODE,
                fault_exit: FAULT_EXIT_CODE,
            })?;

            Ok(Prelude {
                files: vec![(LAUNCHER_FILE, LAUNCHER.to_string()), (POLICY_FILE, json)],
                launch_header: String::new(),
            })
        }
        Dialect::Shell { .. } => {
            if !policy.tagged.is_empty() {
                warn!(
                    count = policy.tagged.len(),
                    "shell dialect cannot tag return values, ignoring tag rules"
                );
            }

            let prelude_path = control_dir.join(SHELL_PRELUDE_FILE);
            Ok(Prelude {
                files: vec![(SHELL_PRELUDE_FILE, shell_prelude(&policy.forbidden))],
                launch_header: format!(". {}\n", shell_quote(&prelude_path.to_string_lossy())),
            })
        }
    }
}

fn shell_prelude(forbidden: &BTreeSet<String>) -> String {
    let mut out = String::from(
        "__sandloop_emit() {\n    printf '%s\\n' \"$1\" >> \"$SANDBOX_EVENTS\"\n}\n",
    );
    for symbol in forbidden {
        out.push_str(&format!(
            "{symbol}() {{\n    __sandloop_emit '{{\"event\":\"forbidden\",\"symbol\":\"{symbol}\"}}'\n    exit {FORBIDDEN_EXIT_CODE}\n}}\n"
        ));
    }
    out
}

fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_valid_symbol(dialect: &Dialect, symbol: &str) -> bool {
    match dialect {
        Dialect::Python { .. } => symbol.split('.').all(is_identifier),
        Dialect::Shell { .. } => is_identifier(symbol),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_prelude_defines_forbidden_functions() {
        let policy = InterceptPolicy::new().forbid("read");
        let prelude = render(&Dialect::shell(), &policy, Path::new("/tmp/run/control")).unwrap();
        assert_eq!(prelude.launch_header, ". '/tmp/run/control/prelude.sh'\n");
        let (name, text) = &prelude.files[0];
        assert_eq!(*name, SHELL_PRELUDE_FILE);
        assert!(text.starts_with("__sandloop_emit() {"));
        assert!(!text.contains("set -e"));
        assert!(text.contains("read() {"));
        assert!(text.contains(r#"{"event":"forbidden","symbol":"read"}"#));
        assert!(text.contains("exit 86"));
    }

    #[test]
    fn test_python_prelude_writes_policy_json() {
        let policy = InterceptPolicy::new().forbid("os.system").tag(TaggedCallable {
            path: "scipy.stats.ttest_ind".into(),
            fields: vec!["pvalue".into()],
            tag: "PValue".into(),
        });
        let prelude = render(&Dialect::python(), &policy, Path::new("/tmp/c")).unwrap();
        assert!(prelude.launch_header.is_empty());
        let (_, json) = prelude
            .files
            .iter()
            .find(|(name, _)| *name == POLICY_FILE)
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(json).unwrap();
        assert_eq!(value["forbidden"][0], "os.system");
        assert_eq!(value["tagged"][0]["tag"], "PValue");
        assert_eq!(value["forbidden_exit"], FORBIDDEN_EXIT_CODE);
    }

    #[test]
    fn test_rejects_invalid_symbols() {
        let policy = InterceptPolicy::new().forbid("rm -rf");
        assert!(matches!(
            render(&Dialect::shell(), &policy, Path::new("/tmp")),
            Err(InterceptError::InvalidSymbol { .. })
        ));
        let dotted = InterceptPolicy::new().forbid("os.system");
        assert!(render(&Dialect::shell(), &dotted, Path::new("/tmp")).is_err());
        assert!(render(&Dialect::python(), &dotted, Path::new("/tmp")).is_ok());
    }
}
