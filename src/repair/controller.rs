// RepairController - nested generate/run/fix loops around one task

use super::config::RepairConfig;
use super::decision::{Decision, parse_decision};
use super::error::Result;
use super::prompts;
use super::session::{
    Attempt, CODE_REVISION_TAG, CodeAndOutput, DEBUG_TAG, DECISION_TAG, EXPLANATION_TAG,
    REQUEST_CODE_TAG, RepairSession, SessionOutcome, collapse_attempt,
};
use super::task::Task;
use crate::brain::{Conversation, Generator};
use crate::extract::{contains_code_block, extract_code};
use crate::sandbox::{ExecutionOutcome, Sandbox};
use tracing::{debug, error, info, warn};

/// Drives a generator through the sandbox until the task's contract is met
pub struct RepairController<G: Generator> {
    generator: G,
    sandbox: Sandbox,
    config: RepairConfig,
}

impl<G: Generator> RepairController<G> {
    pub fn new(generator: G, sandbox: Sandbox, config: RepairConfig) -> Self {
        Self {
            generator,
            sandbox,
            config,
        }
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    pub fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }

    pub fn config(&self) -> &RepairConfig {
        &self.config
    }

    /// System prompt plus the tagged request for code
    pub fn initial_conversation(&self, task: &Task) -> Conversation {
        let mut conversation = match &task.system {
            Some(system) => Conversation::with_system(system.clone()),
            None => Conversation::new(),
        };
        conversation.push_user(
            prompts::request_code(task, self.sandbox.interceptor().dialect()),
            Some(REQUEST_CODE_TAG),
        );
        conversation
    }

    /// Up to A attempts of up to D debug iterations, each attempt restarting from `checkpoint`
    pub async fn run_session(&self, task: &Task, checkpoint: &Conversation) -> Result<SessionOutcome> {
        let mut session = RepairSession::new(&task.id, &self.config);
        info!(
            session_id = %session.id,
            task = %task.id,
            max_attempts = self.config.max_attempts,
            max_debug_iterations = self.config.max_debug_iterations,
            "repair session started"
        );

        for a in 1..=self.config.max_attempts {
            let mut attempt = Attempt::new(a, checkpoint);

            for d in 1..=self.config.max_debug_iterations {
                let response = self.generator.generate(&attempt.thread).await?;
                session.generations += 1;
                attempt.thread.push_assistant(response.as_str(), None);

                let unit = match extract_code(&response) {
                    Ok(unit) => unit,
                    Err(fault) => {
                        error!(
                            session_id = %session.id,
                            attempt = a,
                            iteration = d,
                            error = %fault,
                            "response has no runnable code, aborting session"
                        );
                        return Err(fault.into());
                    }
                };

                let workspace = self.sandbox.workspace(session.run_dir(a, d))?;
                workspace.seed(&task.input_files)?;
                let report = self.sandbox.run(&unit, &task.contract, &workspace).await?;
                attempt.record(&report);

                match report.outcome {
                    ExecutionOutcome::Success { artifacts, .. } => {
                        info!(
                            session_id = %session.id,
                            attempt = a,
                            iteration = d,
                            generations = session.generations,
                            issues = report.issues.len(),
                            "attempt succeeded, collapsing history"
                        );
                        let transcript = collapse_attempt(checkpoint, &unit, &task.contract);
                        let code_and_output = CodeAndOutput {
                            source: unit.runnable().to_string(),
                            language: unit.language.clone(),
                            artifacts,
                            issues: report.issues,
                            explanation: None,
                        };
                        session.attempts.push(attempt);
                        return Ok(SessionOutcome::Accepted {
                            code_and_output,
                            transcript,
                            session,
                        });
                    }
                    outcome => {
                        debug!(
                            attempt = a,
                            iteration = d,
                            fault = ?outcome.fault_class(),
                            "run failed, requesting a fix"
                        );
                        let prompt =
                            prompts::debug_prompt(&unit, &outcome, &report.issues, &task.contract);
                        attempt.thread.push_user(prompt, Some(DEBUG_TAG));
                    }
                }
            }

            warn!(
                session_id = %session.id,
                attempt = a,
                max_attempts = self.config.max_attempts,
                "attempt exhausted its debug iterations"
            );
            session.attempts.push(attempt);
        }

        warn!(
            session_id = %session.id,
            generations = session.generations,
            "repair session exhausted"
        );
        Ok(SessionOutcome::Exhausted { session })
    }

    /// Ask the closed accept/revise question, regenerating ambiguous answers up to R times
    pub async fn decide(
        &self,
        transcript: &mut Conversation,
        code_and_output: &CodeAndOutput,
    ) -> Result<Decision> {
        transcript.push_user(
            prompts::decision_question(&code_and_output.artifacts),
            Some(DECISION_TAG),
        );

        let mut response = self.generator.generate(transcript).await?;
        transcript.push_assistant(response.as_str(), None);

        for retry in 0..=self.config.max_decision_retries {
            match parse_decision(&response) {
                Ok(decision) => {
                    if decision == Decision::Revise && contains_code_block(&response) {
                        debug!("code sent instead of a choice, reading it as revise");
                        transcript.replace_last("b");
                    }
                    info!(decision = ?decision, "decision received");
                    return Ok(decision);
                }
                Err(ambiguous) if retry < self.config.max_decision_retries => {
                    warn!(
                        retry = retry + 1,
                        max_retries = self.config.max_decision_retries,
                        answer = %ambiguous.0.chars().take(80).collect::<String>(),
                        "ambiguous decision, regenerating"
                    );
                    transcript.pop();
                    response = self.generator.generate(transcript).await?;
                    transcript.push_assistant(response.as_str(), None);
                }
                Err(_) => break,
            }
        }

        warn!("decision still ambiguous, assuming revise");
        transcript.replace_last("b");
        Ok(Decision::Revise)
    }

    /// Ask for a high-level explanation of the accepted code
    pub async fn explain(&self, transcript: &mut Conversation, task: &Task) -> Result<String> {
        transcript.push_user(
            prompts::explanation_request(&task.contract),
            Some(EXPLANATION_TAG),
        );
        let explanation = self.generator.generate(transcript).await?;
        transcript.push_assistant(explanation.as_str(), None);
        Ok(explanation)
    }

    /// Full flow: sessions, decision and revisions; `None` when nothing was accepted
    pub async fn get_code_and_output(&self, task: &Task) -> Result<Option<CodeAndOutput>> {
        let mut conversation = self.initial_conversation(task);

        for revision in 1..=self.config.max_revisions {
            let (mut code_and_output, mut transcript) =
                match self.run_session(task, &conversation).await? {
                    SessionOutcome::Accepted {
                        code_and_output,
                        transcript,
                        ..
                    } => (code_and_output, transcript),
                    SessionOutcome::Exhausted { session } => {
                        warn!(
                            task = %task.id,
                            generations = session.generations,
                            "no working code produced"
                        );
                        return Ok(None);
                    }
                };

            match self.decide(&mut transcript, &code_and_output).await? {
                Decision::Accept => {
                    if self.config.request_explanation {
                        code_and_output.explanation =
                            Some(self.explain(&mut transcript, task).await?);
                    }
                    info!(task = %task.id, revision = revision, "code accepted");
                    return Ok(Some(code_and_output));
                }
                Decision::Revise => {
                    info!(
                        task = %task.id,
                        revision = revision,
                        max_revisions = self.config.max_revisions,
                        "revision requested"
                    );
                    transcript.push_user(prompts::revision_request(), Some(CODE_REVISION_TAG));
                    conversation = transcript;
                }
            }
        }

        warn!(task = %task.id, "revisions exhausted without acceptance");
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brain::{BrainError, Role};
    use crate::contract::OutputContract;
    use crate::extract::ExtractionFault;
    use crate::intercept::InterceptPolicy;
    use crate::repair::RepairError;
    use crate::sandbox::{Dialect, SandboxConfig};
    use std::sync::RwLock;
    use std::sync::atomic::{AtomicU32, Ordering};

    const WRONG: &str = "```sh\nprintf hello > wrong.txt\n```";
    const RIGHT: &str = "```sh\nprintf hello > out.txt\n```";

    /// Mock generator answering from a script, then from a fallback
    struct MockGenerator {
        responses: RwLock<Vec<String>>,
        fallback: Option<String>,
        calls: AtomicU32,
        seen: RwLock<Vec<Conversation>>,
    }

    impl MockGenerator {
        fn new(responses: &[&str]) -> Self {
            Self {
                responses: RwLock::new(responses.iter().rev().map(|s| s.to_string()).collect()),
                fallback: None,
                calls: AtomicU32::new(0),
                seen: RwLock::new(Vec::new()),
            }
        }

        fn with_fallback(mut self, response: &str) -> Self {
            self.fallback = Some(response.to_string());
            self
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl Generator for MockGenerator {
        async fn generate(&self, conversation: &Conversation) -> std::result::Result<String, BrainError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.write().unwrap().push(conversation.clone());
            let next = self.responses.write().unwrap().pop();
            next.or_else(|| self.fallback.clone())
                .ok_or(BrainError::EmptyResponse)
        }
    }

    fn controller(
        generator: MockGenerator,
        config: RepairConfig,
        runs_root: &std::path::Path,
    ) -> RepairController<MockGenerator> {
        let sandbox_config = SandboxConfig::default()
            .with_dialect(Dialect::shell())
            .with_timeout_secs(10)
            .with_runs_root(runs_root);
        let sandbox = Sandbox::new(sandbox_config, InterceptPolicy::new().forbid("read")).unwrap();
        RepairController::new(generator, sandbox, config)
    }

    fn budget(attempts: u32, iterations: u32) -> RepairConfig {
        RepairConfig {
            max_attempts: attempts,
            max_debug_iterations: iterations,
            ..RepairConfig::default()
        }
    }

    fn task() -> Task {
        Task::new("hello", "Write hello to out.txt", OutputContract::single_text("out.txt"))
    }

    #[tokio::test]
    async fn test_exhaustion_makes_exactly_a_times_d_calls() {
        let dir = tempfile::tempdir().unwrap();
        let ctl = controller(MockGenerator::new(&[]).with_fallback(WRONG), budget(2, 3), dir.path());
        let task = task();

        let outcome = ctl
            .run_session(&task, &ctl.initial_conversation(&task))
            .await
            .unwrap();

        let SessionOutcome::Exhausted { session } = outcome else {
            panic!("expected exhaustion");
        };
        assert_eq!(session.generations, 6);
        assert_eq!(session.attempts.len(), 2);
        assert!(session.attempts.iter().all(|a| a.iterations.len() == 3 && !a.succeeded()));
        assert_eq!(ctl.generator().calls(), 6);
    }

    #[tokio::test]
    async fn test_success_on_attempt_two_iteration_three_collapses_history() {
        let dir = tempfile::tempdir().unwrap();
        let generator = MockGenerator::new(&[WRONG, WRONG, WRONG, WRONG, WRONG, RIGHT]);
        let ctl = controller(generator, budget(3, 3), dir.path());
        let task = task();
        let checkpoint = ctl.initial_conversation(&task);

        let outcome = ctl.run_session(&task, &checkpoint).await.unwrap();
        let SessionOutcome::Accepted {
            code_and_output,
            transcript,
            session,
        } = outcome
        else {
            panic!("expected acceptance");
        };

        assert_eq!(session.generations, 6);
        assert_eq!(session.attempts.len(), 2);
        assert_eq!(session.attempts[1].iterations.len(), 3);
        assert!(session.attempts[1].succeeded());

        // Only the request and the final code remain.
        assert_eq!(transcript.len(), checkpoint.len() + 1);
        assert_eq!(transcript.turns()[..checkpoint.len()], checkpoint.turns()[..]);
        let last = transcript.last().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert!(last.text.contains("out.txt"));
        assert!(!transcript.turns().iter().any(|t| t.text.contains("wrong.txt")));

        // Attempt two restarted from the clean checkpoint.
        let seen = ctl.generator().seen.read().unwrap();
        assert_eq!(seen[3], checkpoint);
        assert_eq!(code_and_output.artifacts["out.txt"].as_str(), "hello");
    }

    #[tokio::test]
    async fn test_missing_output_then_fix() {
        let dir = tempfile::tempdir().unwrap();
        let ctl = controller(MockGenerator::new(&[WRONG, RIGHT]), budget(1, 3), dir.path());
        let task = task();

        let outcome = ctl
            .run_session(&task, &ctl.initial_conversation(&task))
            .await
            .unwrap();
        assert!(outcome.is_accepted());
        assert_eq!(outcome.session().generations, 2);

        let seen = ctl.generator().seen.read().unwrap();
        let debug_turn = seen[1].last().unwrap();
        assert_eq!(debug_turn.tag.as_deref(), Some(DEBUG_TAG));
        assert!(debug_turn.text.contains("\"out.txt\""));
    }

    #[tokio::test]
    async fn test_extraction_fault_aborts_session() {
        let dir = tempfile::tempdir().unwrap();
        let ctl = controller(
            MockGenerator::new(&["I cannot write code today."]).with_fallback(RIGHT),
            budget(3, 3),
            dir.path(),
        );
        let task = task();

        let err = ctl
            .run_session(&task, &ctl.initial_conversation(&task))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RepairError::Extraction(ExtractionFault::NoBlockFound)
        ));
        assert_eq!(ctl.generator().calls(), 1);
    }

    #[tokio::test]
    async fn test_ambiguous_decision_is_regenerated() {
        let dir = tempfile::tempdir().unwrap();
        let generator = MockGenerator::new(&[
            RIGHT,
            "The output looks plausible to me.",
            "a",
            "It writes hello into out.txt.",
        ]);
        let ctl = controller(generator, budget(1, 1), dir.path());

        let result = ctl.get_code_and_output(&task()).await.unwrap().unwrap();
        assert_eq!(result.artifacts["out.txt"].as_str(), "hello");
        assert_eq!(
            result.explanation.as_deref(),
            Some("It writes hello into out.txt.")
        );
        assert_eq!(ctl.generator().calls(), 4);

        // The ambiguous answer was dropped before regenerating.
        let seen = ctl.generator().seen.read().unwrap();
        assert_eq!(seen[2].last().unwrap().tag.as_deref(), Some(DECISION_TAG));
    }

    #[tokio::test]
    async fn test_code_as_decision_revises() {
        let dir = tempfile::tempdir().unwrap();
        let generator = MockGenerator::new(&[RIGHT, RIGHT, RIGHT, "a"]);
        let config = RepairConfig {
            request_explanation: false,
            ..budget(1, 1)
        };
        let ctl = controller(generator, config, dir.path());

        let result = ctl.get_code_and_output(&task()).await.unwrap();
        assert!(result.is_some());
        assert_eq!(ctl.generator().calls(), 4);

        // The second session starts from the coerced "b" and a revision request.
        let seen = ctl.generator().seen.read().unwrap();
        let turns = seen[2].turns();
        assert_eq!(turns[turns.len() - 2].text, "b");
        assert_eq!(
            turns[turns.len() - 1].tag.as_deref(),
            Some(CODE_REVISION_TAG)
        );
    }

    #[tokio::test]
    async fn test_revisions_exhausted_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        let generator = MockGenerator::new(&[]).with_fallback(RIGHT);
        let config = RepairConfig {
            max_revisions: 2,
            max_decision_retries: 0,
            ..budget(1, 1)
        };
        let ctl = controller(generator, config, dir.path());

        // Every decision answer is code, read as revise.
        assert!(ctl.get_code_and_output(&task()).await.unwrap().is_none());
        assert_eq!(ctl.generator().calls(), 4);
    }

    #[tokio::test]
    async fn test_exhausted_session_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        let ctl = controller(MockGenerator::new(&[]).with_fallback(WRONG), budget(1, 2), dir.path());
        assert!(ctl.get_code_and_output(&task()).await.unwrap().is_none());
        assert_eq!(ctl.generator().calls(), 2);
    }
}
