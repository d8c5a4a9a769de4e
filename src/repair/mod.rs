// Repair module - request, run, diagnose and retry until the contract holds
//
// Budgets nest: a task gets up to V sessions, a session up to A attempts, an
// attempt up to D debug iterations. Every attempt restarts from the same
// checkpoint; an accepted attempt collapses to checkpoint + final code.

pub mod config;
pub mod controller;
pub mod decision;
pub mod error;
pub mod prompts;
pub mod session;
pub mod task;

pub use config::RepairConfig;
pub use controller::RepairController;
pub use decision::{AmbiguousDecision, Decision, parse_decision};
pub use error::{RepairError, Result, TaskError};
pub use session::{
    Attempt, CodeAndOutput, IterationRecord, RepairSession, SessionOutcome, collapse_attempt,
};
pub use task::Task;
