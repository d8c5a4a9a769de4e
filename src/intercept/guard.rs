// CallInterceptor - installs the policy for exactly one run at a time

use super::error::Result;
use super::policy::InterceptPolicy;
use super::prelude;
use crate::sandbox::Dialect;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

/// Serializes installations across the process
static EXECUTION_LOCK: Mutex<()> = Mutex::const_new(());

/// Holds a resolved policy and installs it around a run
#[derive(Debug, Clone)]
pub struct CallInterceptor {
    policy: Arc<InterceptPolicy>,
    dialect: Dialect,
}

impl CallInterceptor {
    pub fn new(policy: InterceptPolicy, dialect: Dialect) -> Self {
        Self {
            policy: Arc::new(policy),
            dialect,
        }
    }

    pub fn policy(&self) -> &InterceptPolicy {
        &self.policy
    }

    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    /// Install into `control_dir`, waiting for any other installation to be dropped first
    pub async fn install(&self, control_dir: &Path) -> Result<InstalledInterceptor> {
        let lock = EXECUTION_LOCK.lock().await;
        let rendered = prelude::render(&self.dialect, &self.policy, control_dir)?;

        let mut installed = InstalledInterceptor {
            written: Vec::with_capacity(rendered.files.len()),
            launch_header: rendered.launch_header,
            _lock: lock,
        };

        for (name, contents) in rendered.files {
            let path = control_dir.join(name);
            tokio::fs::write(&path, contents).await?;
            installed.written.push(path);
        }

        debug!(
            dialect = self.dialect.name(),
            forbidden = self.policy.forbidden.len(),
            tagged = self.policy.tagged.len(),
            "interceptor installed"
        );
        Ok(installed)
    }
}

/// Active installation; dropping it removes the prelude and releases the lock
#[derive(Debug)]
pub struct InstalledInterceptor {
    written: Vec<PathBuf>,
    launch_header: String,
    _lock: MutexGuard<'static, ()>,
}

impl InstalledInterceptor {
    pub fn launch_header(&self) -> &str {
        &self.launch_header
    }

    /// Lines the header adds before the code unit
    pub fn line_offset(&self) -> u32 {
        self.launch_header.lines().count() as u32
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.written
    }
}

impl Drop for InstalledInterceptor {
    fn drop(&mut self) {
        for path in &self.written {
            if let Err(e) = std::fs::remove_file(path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "failed to remove prelude file");
                }
            }
        }
        debug!("interceptor uninstalled");
    }
}
