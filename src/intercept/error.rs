// Error types for Intercept module

use thiserror::Error;

/// Interception errors
#[derive(Debug, Error)]
pub enum InterceptError {
    #[error("Invalid symbol '{symbol}' for the {dialect} dialect")]
    InvalidSymbol { symbol: String, dialect: String },

    #[error("Call surface probe failed: {0}")]
    Probe(String),

    #[error("Invalid issue rule '{0}': {1}")]
    InvalidIssueRule(String, String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, InterceptError>;
