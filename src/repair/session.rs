// Session records - attempts, iterations and the accepted result

use super::config::RepairConfig;
use super::prompts;
use crate::brain::Conversation;
use crate::contract::{Artifacts, OutputContract};
use crate::extract::CodeUnit;
use crate::issues::Issue;
use crate::sandbox::{FaultClass, RunReport};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tag of the turn that asks for code; attempts restart right after it
pub const REQUEST_CODE_TAG: &str = "request_code";
/// Tag of a fix request inside an attempt
pub const DEBUG_TAG: &str = "debug";
/// Tag of the surrogate answer left by a collapsed attempt
pub const SURROGATE_TAG: &str = "surrogate_code";
/// Tag of the accept/revise question
pub const DECISION_TAG: &str = "output_file_content";
/// Tag of a revision request
pub const CODE_REVISION_TAG: &str = "code_revision";
/// Tag of the explanation request
pub const EXPLANATION_TAG: &str = "explanation";

/// Accepted code with its validated outputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeAndOutput {
    pub source: String,
    pub language: Option<String>,
    pub artifacts: Artifacts,
    pub issues: Vec<Issue>,
    pub explanation: Option<String>,
}

/// What happened in one debug iteration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationRecord {
    pub iteration: u32,
    pub fault: Option<FaultClass>,
    pub issues: Vec<Issue>,
    pub duration_ms: u64,
    pub finished_at: DateTime<Utc>,
}

/// One attempt: a thread started from the checkpoint plus its iteration trail
#[derive(Debug, Clone)]
pub struct Attempt {
    pub number: u32,
    pub started_at: DateTime<Utc>,
    pub thread: Conversation,
    pub iterations: Vec<IterationRecord>,
}

impl Attempt {
    pub fn new(number: u32, checkpoint: &Conversation) -> Self {
        Self {
            number,
            started_at: Utc::now(),
            thread: checkpoint.clone(),
            iterations: Vec::new(),
        }
    }

    pub fn record(&mut self, report: &RunReport) {
        self.iterations.push(IterationRecord {
            iteration: self.iterations.len() as u32 + 1,
            fault: report.outcome.fault_class(),
            issues: report.issues.clone(),
            duration_ms: report.duration_ms,
            finished_at: Utc::now(),
        });
    }

    pub fn succeeded(&self) -> bool {
        self.iterations
            .last()
            .is_some_and(|record| record.fault.is_none())
    }
}

/// All attempts made for one task, with the budget counters
#[derive(Debug, Clone)]
pub struct RepairSession {
    pub id: Uuid,
    pub task_id: String,
    pub started_at: DateTime<Utc>,
    pub max_attempts: u32,
    pub max_debug_iterations: u32,
    pub attempts: Vec<Attempt>,
    /// Generator calls made so far
    pub generations: u32,
}

impl RepairSession {
    pub fn new(task_id: impl Into<String>, config: &RepairConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id: task_id.into(),
            started_at: Utc::now(),
            max_attempts: config.max_attempts,
            max_debug_iterations: config.max_debug_iterations,
            attempts: Vec::new(),
            generations: 0,
        }
    }

    /// Run directory of one iteration, relative to the runs root
    pub fn run_dir(&self, attempt: u32, iteration: u32) -> String {
        format!("{}/attempt-{attempt}/iter-{iteration}", self.id)
    }
}

/// How a session ended
#[derive(Debug, Clone)]
pub enum SessionOutcome {
    Accepted {
        code_and_output: CodeAndOutput,
        /// Checkpoint followed by the working code as the only answer
        transcript: Conversation,
        session: RepairSession,
    },
    Exhausted {
        session: RepairSession,
    },
}

impl SessionOutcome {
    pub fn session(&self) -> &RepairSession {
        match self {
            Self::Accepted { session, .. } | Self::Exhausted { session } => session,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

/// Fresh transcript: the checkpoint, then the final code as if it were the first answer
pub fn collapse_attempt(
    checkpoint: &Conversation,
    final_code: &CodeUnit,
    contract: &OutputContract,
) -> Conversation {
    let mut transcript = checkpoint.clone();
    transcript.push_assistant(
        prompts::surrogate_answer(final_code, contract),
        Some(SURROGATE_TAG),
    );
    transcript
}
