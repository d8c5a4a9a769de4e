// Brain module - code generator client
// The repair loop only sees the Generator trait; Brain is the HTTP-backed implementation.

pub mod client;
pub mod conversation;
pub mod error;
pub mod generator;
mod wire;

pub use client::Brain;
pub use conversation::{Conversation, Role, Turn};
pub use error::{BrainError, BrainInitError};
pub use generator::Generator;

use crate::config::{optional_env_var, parse_env_var};

/// Brain configuration
#[derive(Debug, Clone)]
pub struct BrainConfig {
    /// Inference backend URL
    pub endpoint: String,
    /// API key for authentication
    pub api_key: String,
    /// Default model identifier
    pub default_model: String,
    /// Maximum retry attempts
    pub max_retries: u32,
    /// Base retry delay in milliseconds
    pub base_retry_delay_ms: u64,
    /// Request timeout in seconds
    pub request_timeout_secs: u64,
    /// Maximum output tokens
    pub max_output_tokens: u32,
    /// Temperature (0.0-2.0, None = use model default)
    pub temperature: Option<f32>,
    /// Top-P nucleus sampling (0.0-1.0, None = use model default)
    pub top_p: Option<f32>,
    /// Top-K sampling (None = use model default)
    pub top_k: Option<u32>,
}

impl BrainConfig {
    /// Load from `INFERENCE_*` environment variables; endpoint, key and model are required
    pub fn from_env() -> Result<Self, BrainInitError> {
        dotenvy::dotenv().ok();

        Ok(Self {
            endpoint: required_env_var("INFERENCE_ENDPOINT")?,
            api_key: required_env_var("INFERENCE_API_KEY")?,
            default_model: required_env_var("INFERENCE_MODEL")?,
            max_retries: parse_env_var("INFERENCE_MAX_RETRIES", 3),
            base_retry_delay_ms: parse_env_var("INFERENCE_RETRY_DELAY_MS", 1000),
            request_timeout_secs: parse_env_var("INFERENCE_TIMEOUT_SECS", 120),
            max_output_tokens: parse_env_var("INFERENCE_MAX_TOKENS", 4096),
            temperature: optional_env_var("INFERENCE_TEMPERATURE"),
            top_p: optional_env_var("INFERENCE_TOP_P"),
            top_k: optional_env_var("INFERENCE_TOP_K"),
        })
    }
}

fn required_env_var(name: &str) -> Result<String, BrainInitError> {
    std::env::var(name).map_err(|_| BrainInitError::ConfigMissing(name.to_string()))
}
