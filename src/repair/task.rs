// Task declaration - what to ask for and which files must come back

use super::error::TaskError;
use crate::contract::{OutputContract, OutputFileRequirement};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Deserialize)]
struct TaskFile {
    id: String,
    instructions: String,
    #[serde(default)]
    system: Option<String>,
    #[serde(default)]
    input_files: Vec<PathBuf>,
    #[serde(default)]
    outputs: Vec<OutputFileRequirement>,
}

/// One logical task handed to the repair loop
#[derive(Debug, Clone)]
pub struct Task {
    pub id: String,
    pub instructions: String,
    pub system: Option<String>,
    /// Copied into every run's working directory
    pub input_files: Vec<PathBuf>,
    pub contract: OutputContract,
}

impl Task {
    pub fn new(
        id: impl Into<String>,
        instructions: impl Into<String>,
        contract: OutputContract,
    ) -> Self {
        Self {
            id: id.into(),
            instructions: instructions.into(),
            system: None,
            input_files: Vec::new(),
            contract,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_input_files(mut self, files: Vec<PathBuf>) -> Self {
        self.input_files = files;
        self
    }

    /// Load a task file; relative input paths resolve against the file's directory
    pub fn load(path: &Path) -> Result<Self, TaskError> {
        let content = std::fs::read_to_string(path)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::parse(&content, base)
    }

    pub fn parse(content: &str, base_dir: &Path) -> Result<Self, TaskError> {
        let file: TaskFile = toml::from_str(content)?;

        let mut input_files = Vec::with_capacity(file.input_files.len());
        for input in file.input_files {
            let resolved = if input.is_absolute() {
                input
            } else {
                base_dir.join(input)
            };
            if !resolved.is_file() {
                return Err(TaskError::MissingInput(resolved.display().to_string()));
            }
            input_files.push(resolved);
        }

        let contract = OutputContract::new(file.outputs)?;
        debug!(
            task = %file.id,
            inputs = input_files.len(),
            outputs = contract.names().count(),
            "task loaded"
        );

        Ok(Self {
            id: file.id,
            instructions: file.instructions,
            system: file.system,
            input_files,
            contract,
        })
    }

    /// File names of the inputs as the code sees them
    pub fn input_names(&self) -> Vec<String> {
        self.input_files
            .iter()
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect()
    }
}
