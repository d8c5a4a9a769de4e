// Sandbox configuration

use super::dialect::Dialect;
use crate::config::parse_env_var;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Limits applied to a single run
#[derive(Debug, Clone)]
pub struct ExecutionConstraints {
    /// Wall-clock limit in seconds
    pub timeout_secs: u64,
    /// Cap on captured stdout and stderr, each
    pub max_output_bytes: usize,
}

impl Default for ExecutionConstraints {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            max_output_bytes: 1048576, // 1MB
        }
    }
}

impl ExecutionConstraints {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Sandbox configuration
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    pub dialect: Dialect,
    pub constraints: ExecutionConstraints,
    /// Path to policy.toml
    pub policy_path: PathBuf,
    /// Parent of all run directories
    pub runs_root: PathBuf,
    /// Keep run directories after the run for inspection
    pub keep_workspaces: bool,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::default(),
            constraints: ExecutionConstraints::default(),
            policy_path: PathBuf::from("policy.toml"),
            runs_root: std::env::temp_dir().join("sandloop-runs"),
            keep_workspaces: false,
        }
    }
}

impl SandboxConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let mut config = SandboxConfig::default();

        if let Ok(name) = std::env::var("SANDBOX_DIALECT") {
            let program = std::env::var("SANDBOX_INTERPRETER").ok();
            match Dialect::from_name(&name, program) {
                Some(dialect) => config.dialect = dialect,
                None => warn!(value = %name, "Unknown SANDBOX_DIALECT, using default"),
            }
        } else if let Ok(program) = std::env::var("SANDBOX_INTERPRETER") {
            config.dialect = Dialect::Python {
                interpreter: program,
            };
        }

        config.constraints.timeout_secs =
            parse_env_var("SANDBOX_TIMEOUT_SECS", config.constraints.timeout_secs);
        config.constraints.max_output_bytes =
            parse_env_var("SANDBOX_MAX_OUTPUT_BYTES", config.constraints.max_output_bytes);
        config.policy_path = parse_env_var("SANDBOX_POLICY_PATH", config.policy_path);
        config.runs_root = parse_env_var("SANDBOX_RUNS_ROOT", config.runs_root);
        config.keep_workspaces = parse_env_var("SANDBOX_KEEP_WORKSPACES", config.keep_workspaces);

        config
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.constraints.timeout_secs = secs;
        self
    }

    pub fn with_runs_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.runs_root = root.into();
        self
    }
}
