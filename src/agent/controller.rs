//! Repair loop - the top-level state machine
//!
//! ```text
//! Generate ─→ Install ─→ Execute ─┬─ clean / skipped ────→ Evaluate ─┬─ yes → Done
//!    ↑                      ↑     └─ failed → ErrorOffer ─┬─ no ──↗   └─ no ─→ Revise
//!    │                      │                             └─ yes → Regenerate  │
//!    │                      │                                  │               │
//!    │                      └────────── Install ←──────────────┘               │
//!    │                      └──────────────────────────────────────────────────┘
//!    └─ (no code: bounded retry, then ask the operator)
//! ```
//!
//! Two repair paths are kept apart on purpose. `Revise` sends the current code,
//! the last error and the operator's feedback and asks for an updated program.
//! `Regenerate` is taken when a run fails and the operator opts in: it sends a
//! one-shot diagnostic request and also re-runs the whole plan/install/code
//! pipeline.

use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use super::operator::Operator;
use super::pipeline::{Pipeline, PipelineConfig};
use super::prompts::{
    diagnostic_request, revision_request, DIAGNOSTIC_SYSTEM_PROMPT, REVISION_SYSTEM_PROMPT,
};
use crate::extract::{extract, ExtractionMode, InstallSet};
use crate::llm::{ChatMessage, CompletionClient, CompletionService};
use crate::metrics::REPAIR_ROUNDS;
use crate::sandbox::{ExecutionResult, InstallRunner, PtyExecutor, Verdict};

const RULE: &str = "==================================================";

/// Configuration for the repair loop
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Prompt preamble and token budget, shared by every request the loop makes
    pub pipeline: PipelineConfig,
    /// Attempts at one revision request before reporting back to the operator
    pub max_revision_attempts: usize,
    /// Pipeline runs without usable code before asking the operator
    pub max_generation_attempts: usize,
    /// Ask before each installation command
    pub confirm_installs: bool,
    /// Ask before each run of generated code
    pub confirm_execution: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            max_revision_attempts: 3,
            max_generation_attempts: 3,
            confirm_installs: true,
            confirm_execution: true,
        }
    }
}

/// States of the repair loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LoopState {
    Generate,
    Install,
    Execute,
    /// A run failed; offer to send it off for a fix
    ErrorOffer,
    Evaluate,
    /// Operator rejected the output; ask for a targeted revision
    Revise { feedback: String },
    /// Operator accepted the fix offer; diagnose and regenerate
    Regenerate,
    Done,
}

/// How a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The operator accepted the output
    Accepted,
    /// The operator stopped after generation kept failing
    Abandoned,
}

/// Summary of a finished session
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub outcome: Outcome,
    /// Completion calls made during the session
    pub completion_calls: u64,
    /// Times the artifact was executed
    pub executions: usize,
    /// Last code that was executed or accepted
    pub final_code: Option<String>,
    /// Output of the last execution
    pub last_result: Option<ExecutionResult>,
    pub trace_id: String,
}

/// Error type for the repair loop
#[derive(Debug)]
pub enum LoopError {
    /// The operator's input went away mid-session
    Operator(std::io::Error),
}

impl std::fmt::Display for LoopError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoopError::Operator(e) => write!(f, "Operator input failed: {}", e),
        }
    }
}

impl std::error::Error for LoopError {}

impl From<std::io::Error> for LoopError {
    fn from(e: std::io::Error) -> Self {
        LoopError::Operator(e)
    }
}

/// Per-session state threaded through the transitions
#[derive(Debug, Default)]
struct Context {
    code: Option<String>,
    installs: Vec<String>,
    last_result: Option<ExecutionResult>,
    failed_generations: usize,
    executions: usize,
    outcome: Option<Outcome>,
}

impl Context {
    fn code(&self) -> &str {
        self.code.as_deref().unwrap_or_default()
    }
}

/// Drives generate → install → execute → evaluate → repair
pub struct RepairLoop<S, O> {
    client: CompletionClient<S>,
    pipeline: Pipeline,
    executor: PtyExecutor,
    installer: InstallRunner,
    operator: O,
    config: LoopConfig,
}

impl<S: CompletionService, O: Operator> RepairLoop<S, O> {
    /// Create a new repair loop
    ///
    /// # Arguments
    /// * `client` - Counting completion client; its count is the session's count
    /// * `executor` - Sandboxed executor for the artifact
    /// * `operator` - Where every question goes
    /// * `config` - Loop configuration
    pub fn new(
        client: CompletionClient<S>,
        executor: PtyExecutor,
        operator: O,
        config: LoopConfig,
    ) -> Self {
        Self {
            client,
            pipeline: Pipeline::new(config.pipeline.clone()),
            executor,
            installer: InstallRunner::new(config.confirm_installs),
            operator,
            config,
        }
    }

    pub fn client(&self) -> &CompletionClient<S> {
        &self.client
    }

    pub fn operator(&self) -> &O {
        &self.operator
    }

    /// Run one session for `request` until the operator accepts or gives up.
    pub async fn run(&mut self, request: &str) -> Result<SessionReport, LoopError> {
        let trace_id = Uuid::now_v7().to_string();
        let span = info_span!("session", trace_id = %trace_id, otel.name = "session");

        async {
            info!(trace_id = %trace_id, request = %request, "Starting session");
            let mut ctx = Context::default();
            let mut state = LoopState::Generate;

            while state != LoopState::Done {
                info!(state = ?state, "Entering state");
                state = match state {
                    LoopState::Generate => self.generate(&mut ctx, request).await?,
                    LoopState::Install => self.install(&mut ctx).await?,
                    LoopState::Execute => self.execute(&mut ctx).await?,
                    LoopState::ErrorOffer => self.offer_fix(&ctx)?,
                    LoopState::Evaluate => self.evaluate(&mut ctx)?,
                    LoopState::Revise { feedback } => self.revise(&mut ctx, &feedback).await,
                    LoopState::Regenerate => self.regenerate(&mut ctx, request).await,
                    LoopState::Done => LoopState::Done,
                };
            }

            let calls = self.client.calls();
            self.operator.show(&format!(
                "Total requests made to the completion service: {}",
                calls
            ));
            let outcome = ctx.outcome.unwrap_or(Outcome::Abandoned);
            info!(trace_id = %trace_id, outcome = ?outcome, calls, executions = ctx.executions, "Session finished");

            Ok(SessionReport {
                outcome,
                completion_calls: calls,
                executions: ctx.executions,
                final_code: ctx.code,
                last_result: ctx.last_result,
                trace_id: trace_id.clone(),
            })
        }
        .instrument(span)
        .await
    }

    async fn generate(&mut self, ctx: &mut Context, request: &str) -> Result<LoopState, LoopError> {
        let generation = self.pipeline.generate(&mut self.client, request).await;

        let Some(code) = generation.code else {
            ctx.failed_generations += 1;
            warn!(attempt = ctx.failed_generations, "Generation produced no code");
            self.operator.show(&format!(
                "The code stage returned no usable code ({}/{}).",
                ctx.failed_generations, self.config.max_generation_attempts
            ));
            if ctx.failed_generations < self.config.max_generation_attempts {
                return Ok(LoopState::Generate);
            }
            ctx.failed_generations = 0;
            if self
                .operator
                .confirm("Code generation keeps failing. Start generation over?")?
            {
                return Ok(LoopState::Generate);
            }
            ctx.outcome = Some(Outcome::Abandoned);
            return Ok(LoopState::Done);
        };

        ctx.failed_generations = 0;
        ctx.installs = generation.installs;
        ctx.code = Some(code);
        Ok(LoopState::Install)
    }

    async fn install(&mut self, ctx: &mut Context) -> Result<LoopState, LoopError> {
        let set: InstallSet = ctx.installs.drain(..).collect();
        if !set.is_empty() {
            let listing: Vec<&str> = set.iter().collect();
            self.operator
                .show(&format!("\nTo Install:\n\n{}", listing.join("\n")));
            let report = self.installer.run(&set, &mut self.operator).await?;
            info!(
                ran = report.outcomes.len(),
                failed = report.failures().count(),
                aborted = report.aborted,
                "Install batch finished"
            );
        }
        Ok(LoopState::Execute)
    }

    async fn execute(&mut self, ctx: &mut Context) -> Result<LoopState, LoopError> {
        self.operator
            .show(&format!("\nTo Execute:\n{}\n{}\n{}", RULE, ctx.code(), RULE));

        if self.config.confirm_execution && !self.operator.confirm("Execute the code now?")? {
            info!("Operator skipped execution");
            self.operator.show("Skipping execution.");
            return Ok(LoopState::Evaluate);
        }

        let result = self.executor.execute(ctx.code()).await;
        ctx.executions += 1;

        if !result.output.is_empty() {
            self.operator.show(&format!(
                "Output From Code Execution:\n{}\n{}\n{}",
                RULE, result.output, RULE
            ));
        }
        if let Some(error) = &result.error {
            self.operator.show(&format!("Execution could not run: {}", error));
        }
        if result.exited_nonzero() {
            info!(exit_code = ?result.exit_code, "Process exited non-zero");
        }

        let next = if result.verdict().is_failure() {
            LoopState::ErrorOffer
        } else {
            LoopState::Evaluate
        };
        ctx.last_result = Some(result);
        Ok(next)
    }

    fn offer_fix(&mut self, ctx: &Context) -> Result<LoopState, LoopError> {
        let verdict = ctx
            .last_result
            .as_ref()
            .map(ExecutionResult::verdict)
            .unwrap_or(Verdict::Failed);
        let message = match verdict {
            Verdict::TimedOut => "The code did not finish before the execution deadline.",
            Verdict::Failed => "The code could not be executed.",
            _ => "It seems the code encountered an error when trying to execute.",
        };
        self.operator.show(message);

        if self
            .operator
            .confirm("Do you want to send the traceback and the code to find a fix?")?
        {
            Ok(LoopState::Regenerate)
        } else {
            Ok(LoopState::Evaluate)
        }
    }

    fn evaluate(&mut self, ctx: &mut Context) -> Result<LoopState, LoopError> {
        if self.operator.confirm("Are you happy with the code output?")? {
            self.operator.show(&format!(
                "Output can be reproduced by running the {} file anytime.",
                self.executor.artifact_path().display()
            ));
            ctx.outcome = Some(Outcome::Accepted);
            return Ok(LoopState::Done);
        }

        let feedback = self
            .operator
            .ask("Please provide your feedback on what to change: ")?;
        Ok(LoopState::Revise { feedback })
    }

    async fn revise(&mut self, ctx: &mut Context, feedback: &str) -> LoopState {
        REPAIR_ROUNDS.with_label_values(&["revision"]).inc();
        let error = ctx.last_result.as_ref().and_then(ExecutionResult::error_text);
        let messages = [
            ChatMessage::system(REVISION_SYSTEM_PROMPT),
            ChatMessage::user(revision_request(ctx.code(), error.as_deref(), feedback)),
        ];
        let max_attempts = self.config.max_revision_attempts.max(1);

        for attempt in 1..=max_attempts {
            let response = self
                .client
                .complete(&messages, self.config.pipeline.max_tokens)
                .await;

            let problem = if response.is_empty() {
                "Failed to get a response from the completion service."
            } else if let Some(code) = extract(&response, ExtractionMode::Code).into_iter().next() {
                info!(attempt, code_len = code.len(), "Revision received");
                self.operator
                    .show(&format!("\nUpdated Code:\n{}\n{}\n{}", RULE, code, RULE));
                ctx.code = Some(code);
                return LoopState::Execute;
            } else {
                "The response did not contain valid code."
            };

            warn!(attempt, max_attempts, problem, "Revision attempt failed");
            if attempt < max_attempts {
                self.operator.show(&format!("{} Retrying...", problem));
            }
        }

        self.operator.show(&format!(
            "Giving up on this revision after {} attempts. The previous code is unchanged.",
            max_attempts
        ));
        LoopState::Evaluate
    }

    async fn regenerate(&mut self, ctx: &mut Context, request: &str) -> LoopState {
        REPAIR_ROUNDS.with_label_values(&["regeneration"]).inc();
        let output = ctx
            .last_result
            .as_ref()
            .and_then(ExecutionResult::error_text)
            .unwrap_or_default();

        let diagnosis = self
            .client
            .complete(
                &[
                    ChatMessage::system(DIAGNOSTIC_SYSTEM_PROMPT),
                    ChatMessage::user(diagnostic_request(ctx.code(), &output)),
                ],
                self.config.pipeline.max_tokens,
            )
            .await;
        let fixed = extract(&diagnosis, ExtractionMode::Code).into_iter().next();
        let mut installs = extract(&diagnosis, ExtractionMode::Install);

        let generation = self.pipeline.generate(&mut self.client, request).await;
        installs.extend(generation.installs);

        // Prefer the targeted fix over the fresh program
        match fixed.or(generation.code) {
            Some(code) => {
                info!(code_len = code.len(), "Regenerated code after failure");
                ctx.code = Some(code);
                ctx.installs = installs;
                LoopState::Install
            }
            None => {
                warn!("Neither the diagnosis nor the regeneration produced code");
                self.operator
                    .show("No replacement code was received. Keeping the current code.");
                LoopState::Evaluate
            }
        }
    }
}
