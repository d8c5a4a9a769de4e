// Dialect - which interpreter runs the generated code and how it is launched

use crate::intercept::prelude::{LAUNCHER_FILE, POLICY_FILE};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Interpreter family for generated code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "dialect", rename_all = "lowercase")]
pub enum Dialect {
    Python { interpreter: String },
    Shell { shell: String },
}

impl Default for Dialect {
    fn default() -> Self {
        Self::python()
    }
}

impl Dialect {
    pub fn python() -> Self {
        Self::Python {
            interpreter: "python3".to_string(),
        }
    }

    pub fn shell() -> Self {
        Self::Shell {
            shell: "/bin/sh".to_string(),
        }
    }

    /// Build from a dialect name and an optional program override
    pub fn from_name(name: &str, program: Option<String>) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "python" | "py" | "python3" => Some(Self::Python {
                interpreter: program.unwrap_or_else(|| "python3".to_string()),
            }),
            "shell" | "sh" | "bash" => Some(Self::Shell {
                shell: program.unwrap_or_else(|| "/bin/sh".to_string()),
            }),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Python { .. } => "python",
            Self::Shell { .. } => "shell",
        }
    }

    pub fn program(&self) -> &str {
        match self {
            Self::Python { interpreter } => interpreter,
            Self::Shell { shell } => shell,
        }
    }

    /// File name the code unit is written to inside the control directory
    pub fn code_file(&self) -> &'static str {
        match self {
            Self::Python { .. } => "code.py",
            Self::Shell { .. } => "code.sh",
        }
    }

    /// Fence info strings this dialect will run
    pub fn languages(&self) -> &'static [&'static str] {
        match self {
            Self::Python { .. } => &["python", "py", "python3"],
            Self::Shell { .. } => &["sh", "shell", "bash"],
        }
    }

    /// An untagged block is assumed to be in the configured dialect
    pub fn accepts_language(&self, language: Option<&str>) -> bool {
        match language {
            None => true,
            Some(lang) => self.languages().contains(&lang),
        }
    }

    /// Command that runs `code_path` with the installed interception layer
    pub(crate) fn command(&self, control_dir: &Path, code_path: &Path) -> Command {
        let mut cmd = Command::new(self.program());
        match self {
            Self::Python { .. } => {
                cmd.arg("-u")
                    .arg(control_dir.join(LAUNCHER_FILE))
                    .arg(code_path)
                    .arg(control_dir.join(POLICY_FILE));
            }
            Self::Shell { .. } => {
                cmd.arg(code_path);
            }
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group, so a timeout can take down everything the unit started.
        #[cfg(unix)]
        cmd.process_group(0);
        cmd
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name(), self.program())
    }
}
