// Error types for Repair module

use crate::brain::BrainError;
use crate::contract::ContractError;
use crate::extract::ExtractionFault;
use crate::sandbox::SandboxError;
use thiserror::Error;

/// Session-level failures; faults of the generated code are retried, not raised
#[derive(Debug, Error)]
pub enum RepairError {
    #[error("Response has no runnable code: {0}")]
    Extraction(#[from] ExtractionFault),

    #[error("Generator error: {0}")]
    Generator(#[from] BrainError),

    #[error("Sandbox error: {0}")]
    Sandbox(#[from] SandboxError),
}

/// Task declaration errors
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Invalid output declaration: {0}")]
    Contract(#[from] ContractError),

    #[error("Input file not found: {0}")]
    MissingInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, RepairError>;
