// Sandbox module - isolated execution of one code unit
//
// Each run gets a fresh workspace, runs under the installed interceptor with a
// wall-clock limit, and ends in exactly one outcome: success, fault or timeout.

pub mod config;
pub mod dialect;
pub mod error;
pub mod events;
mod process;
pub mod runner;
pub mod types;
pub mod workspace;

pub use config::{ExecutionConstraints, SandboxConfig};
pub use dialect::Dialect;
pub use error::{Result, SandboxError};
pub use runner::{EXIT_STATUS_FAULT, Sandbox};
pub use types::{CapturedOutput, ExecutionOutcome, FaultClass, RunFault, RunReport, RunState};
pub use workspace::{Snapshot, Workspace};
