// Error types for Contract module

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A produced file set that does not satisfy the contract
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "fault", rename_all = "snake_case")]
pub enum ContractFault {
    #[error("required output file '{name}' was not created")]
    MissingOutput { name: String },

    #[error("undeclared output file '{name}' was created")]
    UnexpectedOutput { name: String },

    #[error("output file '{name}' is malformed: {reason}")]
    MalformedOutput { name: String, reason: String },
}

impl ContractFault {
    pub fn file_name(&self) -> &str {
        match self {
            ContractFault::MissingOutput { name }
            | ContractFault::UnexpectedOutput { name }
            | ContractFault::MalformedOutput { name, .. } => name,
        }
    }
}

/// Contract declaration errors
#[derive(Debug, Error)]
pub enum ContractError {
    #[error("output file '{0}' is declared more than once")]
    DuplicateOutput(String),

    #[error("output file name '{0}' must be a relative path inside the work directory")]
    InvalidName(String),
}
