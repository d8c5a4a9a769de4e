// Data types for Sandbox module

use super::error::{Result, SandboxError};
use crate::contract::{Artifacts, ContractFault};
use crate::issues::Issue;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle of one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Faulted,
    TimedOut,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Faulted | Self::TimedOut)
    }

    /// Move to `next`; only Idle -> Running -> terminal is allowed
    pub fn advance(self, next: RunState) -> Result<RunState> {
        match (self, next) {
            (Self::Idle, Self::Running)
            | (Self::Running, Self::Completed | Self::Faulted | Self::TimedOut) => Ok(next),
            (from, to) => Err(SandboxError::IllegalTransition { from, to }),
        }
    }
}

/// Captured streams of a finished child
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Why a run failed
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunFault {
    /// The code called something the policy forbids
    #[error("forbidden call to `{symbol}`")]
    ForbiddenCall { symbol: String },

    /// Uncaught error or non-zero exit
    #[error("{type_name}: {message}")]
    Runtime {
        type_name: String,
        message: String,
        /// 1-based line of the code unit, when known
        line: Option<u32>,
    },

    #[error(transparent)]
    Contract(ContractFault),
}

impl From<ContractFault> for RunFault {
    fn from(fault: ContractFault) -> Self {
        Self::Contract(fault)
    }
}

/// Coarse fault family, used in logs and iteration records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultClass {
    Policy,
    Runtime,
    Timeout,
    Contract,
}

/// Result of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    Success {
        artifacts: Artifacts,
        captured: CapturedOutput,
    },
    Fault {
        fault: RunFault,
    },
    Timeout {
        limit_secs: u64,
    },
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn fault_class(&self) -> Option<FaultClass> {
        match self {
            Self::Success { .. } => None,
            Self::Timeout { .. } => Some(FaultClass::Timeout),
            Self::Fault { fault } => Some(match fault {
                RunFault::ForbiddenCall { .. } => FaultClass::Policy,
                RunFault::Runtime { .. } => FaultClass::Runtime,
                RunFault::Contract(_) => FaultClass::Contract,
            }),
        }
    }

    pub fn artifacts(&self) -> Option<&Artifacts> {
        match self {
            Self::Success { artifacts, .. } => Some(artifacts),
            _ => None,
        }
    }

    /// Terminal run state this outcome corresponds to
    pub fn terminal_state(&self) -> RunState {
        match self {
            Self::Success { .. } => RunState::Completed,
            Self::Fault { .. } => RunState::Faulted,
            Self::Timeout { .. } => RunState::TimedOut,
        }
    }
}

/// Outcome plus everything observed along the way
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub outcome: ExecutionOutcome,
    pub issues: Vec<Issue>,
    pub stdout: String,
    pub stderr: String,
    pub state: RunState,
    pub duration_ms: u64,
}
