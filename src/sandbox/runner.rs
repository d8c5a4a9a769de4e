// Sandbox runner - executes one code unit under the interceptor and classifies the result

use super::config::SandboxConfig;
use super::dialect::Dialect;
use super::error::{Result, SandboxError};
use super::events::{ChildEvent, EVENTS_FILE, first_forbidden, read_events, reported_issues};
use super::process;
use super::types::{CapturedOutput, ExecutionOutcome, RunFault, RunReport, RunState};
use super::workspace::{Snapshot, Workspace};
use crate::contract::OutputContract;
use crate::extract::CodeUnit;
use crate::intercept::{
    CallInterceptor, EVENTS_ENV, InterceptError, InterceptPolicy, PolicySpec, PythonSurface,
    StaticSurface,
};
use crate::issues::{IssueCollector, IssueDetector, PatternDetector, RunTrace, default_detectors};
use regex::Regex;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Type name reported for a non-zero exit without a structured fault
pub const EXIT_STATUS_FAULT: &str = "ExitStatus";

const STDERR_TAIL_LINES: usize = 20;

/// Runs code units in isolated workspaces
pub struct Sandbox {
    config: SandboxConfig,
    interceptor: CallInterceptor,
    detectors: Vec<Box<dyn IssueDetector>>,
}

impl Sandbox {
    pub fn new(config: SandboxConfig, policy: InterceptPolicy) -> Result<Self> {
        let mut detectors = default_detectors();
        for rule in &policy.issue_rules {
            let detector = PatternDetector::new(rule.clone())
                .map_err(|e| InterceptError::InvalidIssueRule(rule.code.clone(), e.to_string()))?;
            detectors.push(Box::new(detector));
        }

        let interceptor = CallInterceptor::new(policy, config.dialect.clone());
        Ok(Self {
            config,
            interceptor,
            detectors,
        })
    }

    /// Load the policy file and resolve it against the configured interpreter
    pub async fn from_config(config: SandboxConfig) -> Result<Self> {
        let spec = PolicySpec::load(&config.policy_path, &config.dialect)?;

        let policy = match &config.dialect {
            Dialect::Python { interpreter } => {
                match spec.resolve(&PythonSurface::new(interpreter.clone())).await {
                    Ok(policy) => policy,
                    Err(e) => {
                        warn!(error = %e, "call surface unavailable, surface rules not expanded");
                        spec.resolve(&StaticSurface::default()).await?
                    }
                }
            }
            Dialect::Shell { .. } => spec.resolve(&StaticSurface::default()).await?,
        };

        Self::new(config, policy)
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    pub fn interceptor(&self) -> &CallInterceptor {
        &self.interceptor
    }

    /// Fresh workspace at `runs_root/<relative>`
    pub fn workspace(&self, relative: impl Into<PathBuf>) -> Result<Workspace> {
        Workspace::create(
            self.config.runs_root.join(relative.into()),
            self.config.keep_workspaces,
        )
    }

    /// Run once in a throwaway workspace seeded with `inputs`
    pub async fn run_once(
        &self,
        unit: &CodeUnit,
        contract: &OutputContract,
        inputs: &[PathBuf],
    ) -> Result<RunReport> {
        let workspace = self.workspace(uuid::Uuid::new_v4().to_string())?;
        workspace.seed(inputs)?;
        self.run(unit, contract, &workspace).await
    }

    /// Execute `unit` in `workspace` and classify the result
    pub async fn run(
        &self,
        unit: &CodeUnit,
        contract: &OutputContract,
        workspace: &Workspace,
    ) -> Result<RunReport> {
        let start = Instant::now();
        let dialect = self.interceptor.dialect();

        if !dialect.accepts_language(unit.language.as_deref()) {
            warn!(
                language = ?unit.language,
                dialect = dialect.name(),
                "code block language does not match the sandbox dialect"
            );
        }

        let before = workspace.snapshot()?;
        let events_path = workspace.control().join(EVENTS_FILE);
        let code_path = workspace.control().join(dialect.code_file());

        let installed = self.interceptor.install(workspace.control()).await?;
        let state = RunState::Idle.advance(RunState::Running)?;
        let line_offset = installed.line_offset();

        let mut script = String::from(installed.launch_header());
        script.push_str(unit.runnable());
        tokio::fs::write(&code_path, &script).await?;

        let mut cmd = dialect.command(workspace.control(), &code_path);
        cmd.current_dir(workspace.work()).env(EVENTS_ENV, &events_path);

        debug!(
            dialect = dialect.name(),
            workspace = %workspace.root().display(),
            "spawning code unit"
        );
        let mut child = cmd
            .spawn()
            .map_err(|e| SandboxError::SpawnFailed(dialect.program().to_string(), e.to_string()))?;
        let pgid = child.id();
        let stdout = process::drain(child.stdout.take());
        let stderr = process::drain(child.stderr.take());

        let limit_secs = self.config.constraints.timeout_secs;
        let waited = tokio::time::timeout(self.config.constraints.timeout(), child.wait()).await;

        // Background jobs of the unit share its group and die with it, on exit as on timeout.
        if let Some(pgid) = pgid {
            process::kill_group(pgid);
        }
        if waited.is_err() {
            if let Err(e) = child.kill().await {
                debug!(error = %e, "child already gone after group kill");
            }
        }

        let max = self.config.constraints.max_output_bytes;
        let lossy =
            |bytes: Vec<u8>| truncate_output(String::from_utf8_lossy(&bytes).into_owned(), max);
        let captured = CapturedOutput {
            stdout: lossy(process::collect(stdout).await),
            stderr: lossy(process::collect(stderr).await),
        };

        // Nothing of the run is left; revert the installation.
        drop(installed);

        let events = read_events(&events_path).await;
        let reported = reported_issues(&events);

        let outcome = match waited {
            Err(_) => {
                warn!(limit_secs = limit_secs, "code unit timed out, process group killed");
                ExecutionOutcome::Timeout { limit_secs }
            }
            Ok(Err(e)) => return Err(SandboxError::OutputCaptureFailed(e.to_string())),
            Ok(Ok(status)) => self.classify(
                &events,
                status,
                &captured,
                line_offset,
                contract,
                workspace,
                &before,
            )?,
        };

        let trace = RunTrace {
            stdout: &captured.stdout,
            stderr: &captured.stderr,
            reported: &reported,
        };
        let mut issues = IssueCollector::new();
        for detector in &self.detectors {
            detector.inspect(&trace, &mut issues);
        }

        let state = state.advance(outcome.terminal_state())?;
        let duration_ms = start.elapsed().as_millis() as u64;

        info!(
            dialect = dialect.name(),
            state = ?state,
            fault = ?outcome.fault_class(),
            issues = issues.len(),
            duration_ms = duration_ms,
            "code unit executed"
        );

        Ok(RunReport {
            outcome,
            issues: issues.into_issues(),
            stdout: captured.stdout,
            stderr: captured.stderr,
            state,
            duration_ms,
        })
    }

    /// Forbidden call first, then raised error, then exit status, then the contract
    #[allow(clippy::too_many_arguments)]
    fn classify(
        &self,
        events: &[ChildEvent],
        status: ExitStatus,
        captured: &CapturedOutput,
        line_offset: u32,
        contract: &OutputContract,
        workspace: &Workspace,
        before: &Snapshot,
    ) -> Result<ExecutionOutcome> {
        if let Some(symbol) = first_forbidden(events) {
            return Ok(fault(RunFault::ForbiddenCall {
                symbol: symbol.to_string(),
            }));
        }

        let raised = events.iter().find_map(|e| match e {
            ChildEvent::Fault {
                type_name,
                message,
                line,
            } => Some(RunFault::Runtime {
                type_name: type_name.clone(),
                message: message.clone(),
                line: *line,
            }),
            _ => None,
        });
        if let Some(raised) = raised {
            return Ok(fault(raised));
        }

        if !status.success() {
            let code_file = self.interceptor.dialect().code_file();
            let message = match status.code() {
                Some(code) => format!("exited with status {code}"),
                None => "terminated by a signal".to_string(),
            };
            let tail = stderr_tail(&captured.stderr, STDERR_TAIL_LINES);
            return Ok(fault(RunFault::Runtime {
                type_name: EXIT_STATUS_FAULT.to_string(),
                message: if tail.is_empty() {
                    message
                } else {
                    format!("{message}:\n{tail}")
                },
                line: error_line(&captured.stderr, code_file, line_offset),
            }));
        }

        let produced = workspace.snapshot()?.produced_since(before);
        Ok(match contract.validate(workspace.work(), &produced) {
            Ok(artifacts) => ExecutionOutcome::Success {
                artifacts,
                captured: captured.clone(),
            },
            Err(contract_fault) => fault(contract_fault.into()),
        })
    }
}

fn fault(fault: RunFault) -> ExecutionOutcome {
    ExecutionOutcome::Fault { fault }
}

/// Line of the code unit an interpreter diagnostic points at
///
/// Matches `code.sh: 3: ...` and `code.sh: line 3: ...`, minus the header lines.
fn error_line(stderr: &str, code_file: &str, line_offset: u32) -> Option<u32> {
    let pattern = format!(r"{}: (?:line )?(\d+): ", regex::escape(code_file));
    let re = Regex::new(&pattern).ok()?;
    let lineno: u32 = re.captures(stderr)?.get(1)?.as_str().parse().ok()?;
    lineno.checked_sub(line_offset).filter(|n| *n > 0)
}

fn stderr_tail(stderr: &str, lines: usize) -> String {
    let all: Vec<&str> = stderr.trim_end().lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}

fn truncate_output(mut s: String, max: usize) -> String {
    if s.len() > max {
        let mut cut = max;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        s.truncate(cut);
        s.push_str("\n[output truncated]");
    }
    s
}
