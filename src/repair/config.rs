// Repair loop configuration

use crate::config::parse_env_var;

/// Budgets of the nested repair loops
#[derive(Debug, Clone)]
pub struct RepairConfig {
    /// Attempts per session (A)
    pub max_attempts: u32,
    /// Debug iterations per attempt (D)
    pub max_debug_iterations: u32,
    /// Regenerations of an ambiguous accept/revise answer (R)
    pub max_decision_retries: u32,
    /// Sessions per task, counting the first (V)
    pub max_revisions: u32,
    /// Ask for an explanation of the accepted code
    pub request_explanation: bool,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            max_debug_iterations: 12,
            max_decision_retries: 3,
            max_revisions: 3,
            request_explanation: true,
        }
    }
}

impl RepairConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let mut config = RepairConfig::default();

        config.max_attempts = parse_env_var("REPAIR_MAX_ATTEMPTS", config.max_attempts).max(1);
        config.max_debug_iterations =
            parse_env_var("REPAIR_MAX_DEBUG_ITERATIONS", config.max_debug_iterations).max(1);
        config.max_decision_retries =
            parse_env_var("REPAIR_MAX_DECISION_RETRIES", config.max_decision_retries);
        config.max_revisions = parse_env_var("REPAIR_MAX_REVISIONS", config.max_revisions).max(1);
        config.request_explanation =
            parse_env_var("REPAIR_REQUEST_EXPLANATION", config.request_explanation);

        config
    }
}
