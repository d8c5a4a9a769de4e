// Call surface - enumerates callables and their documentation for rule resolution

use super::error::{InterceptError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Name and documentation of one callable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallableMeta {
    /// Dotted path, `module.name`
    pub path: String,
    #[serde(default)]
    pub doc: String,
}

impl CallableMeta {
    pub fn new(path: impl Into<String>, doc: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            doc: doc.into(),
        }
    }

    /// Last path segment
    pub fn name(&self) -> &str {
        self.path.rsplit('.').next().unwrap_or(&self.path)
    }
}

/// Source of callable metadata
#[async_trait]
pub trait CallSurface: Send + Sync {
    /// Public callables defined in any of `modules`
    async fn callables(&self, modules: &[String]) -> Result<Vec<CallableMeta>>;
}

/// Fixed list of callables
#[derive(Debug, Clone, Default)]
pub struct StaticSurface {
    callables: Vec<CallableMeta>,
}

impl StaticSurface {
    pub fn new(callables: Vec<CallableMeta>) -> Self {
        Self { callables }
    }
}

#[async_trait]
impl CallSurface for StaticSurface {
    async fn callables(&self, modules: &[String]) -> Result<Vec<CallableMeta>> {
        Ok(self
            .callables
            .iter()
            .filter(|c| {
                modules.iter().any(|m| {
                    c.path
                        .strip_prefix(m.as_str())
                        .is_some_and(|rest| rest.starts_with('.'))
                })
            })
            .cloned()
            .collect())
    }
}

const PROBE_SCRIPT: &str = r#"
import importlib, inspect, json, sys
out = []
for name in json.loads(sys.argv[1]):
    try:
        module = importlib.import_module(name)
    except Exception:
        continue
    for attr in sorted(dir(module)):
        if attr.startswith("_"):
            continue
        try:
            obj = getattr(module, attr)
        except Exception:
            continue
        if callable(obj):
            out.append({"path": name + "." + attr, "doc": inspect.getdoc(obj) or ""})
json.dump(out, sys.stdout)
"#;

/// Asks a Python interpreter for the callables of the named modules
///
/// Modules that fail to import contribute nothing.
#[derive(Debug, Clone)]
pub struct PythonSurface {
    interpreter: String,
    timeout: Duration,
}

impl PythonSurface {
    pub fn new(interpreter: impl Into<String>) -> Self {
        Self {
            interpreter: interpreter.into(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl CallSurface for PythonSurface {
    async fn callables(&self, modules: &[String]) -> Result<Vec<CallableMeta>> {
        if modules.is_empty() {
            return Ok(Vec::new());
        }

        let child = Command::new(&self.interpreter)
            .arg("-c")
            .arg(PROBE_SCRIPT)
            .arg(serde_json::to_string(modules)?)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| InterceptError::Probe(format!("{}: {}", self.interpreter, e)))?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                InterceptError::Probe(format!("timed out after {}s", self.timeout.as_secs()))
            })??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(status = ?output.status.code(), stderr = %stderr.trim(), "surface probe failed");
            return Err(InterceptError::Probe(stderr.trim().to_string()));
        }

        let callables: Vec<CallableMeta> = serde_json::from_slice(&output.stdout)?;
        debug!(modules = ?modules, count = callables.len(), "probed call surface");
        Ok(callables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_surface_filters_by_module() {
        let surface = StaticSurface::new(vec![
            CallableMeta::new("stats.ttest", ""),
            CallableMeta::new("statsmodels.ols", ""),
        ]);
        let found = surface.callables(&["stats".to_string()]).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name(), "ttest");
    }
}
