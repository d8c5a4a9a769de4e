// Error types for Sandbox module

use super::types::RunState;
use crate::intercept::InterceptError;
use thiserror::Error;

/// Infrastructure failures; faults of the generated code are outcomes, not errors
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("Failed to spawn '{0}': {1}")]
    SpawnFailed(String, String),

    #[error("Failed to capture output: {0}")]
    OutputCaptureFailed(String),

    #[error("Illegal run state transition {from:?} -> {to:?}")]
    IllegalTransition { from: RunState, to: RunState },

    #[error("Input file '{0}' cannot be staged: {1}")]
    InputFile(String, String),

    #[error("Interception error: {0}")]
    Intercept(#[from] InterceptError),

    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SandboxError>;
