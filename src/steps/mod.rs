//! Step execution framework for the paperflow pipeline.
//!
//! A [`Step`] is a named unit of work: a pure function from run state to run
//! state, plus calls to the collaborators it was constructed with. Steps
//! advance the run's [`Phase`](crate::types::Phase) themselves; the
//! [`StepExecutor`] wraps every invocation so that a failing step becomes a
//! `failed` copy of the input state instead of an error crossing the
//! pipeline boundary. This is the single place collaborator failures are
//! normalized, which keeps the engine's control flow free of per-step error
//! branching.

pub mod archive;
pub mod deep_read;
pub mod extract;
pub mod ingest;
pub mod triage;

use async_trait::async_trait;
use miette::Diagnostic;
use thiserror::Error;

use crate::collaborators::{ArchiveError, ExtractionError, LlmError};
use crate::state::RunState;
use crate::types::RunId;

pub use archive::{ArchiveBaseStep, UpdateArchiveStep};
pub use deep_read::DeepReadStep;
pub use extract::ExtractStep;
pub use ingest::IngestStep;
pub use triage::TriageStep;

/// Execution context passed to steps, used for tracing and idempotency keys.
#[derive(Clone, Debug)]
pub struct StepContext {
    pub run_id: RunId,
}

impl StepContext {
    #[must_use]
    pub fn new(run_id: RunId) -> Self {
        Self { run_id }
    }
}

/// Errors a step may raise. All variants are normalized by the executor;
/// none of them reach the engine.
#[derive(Debug, Error, Diagnostic)]
pub enum StepError {
    /// Expected payload field is missing from the incoming state.
    #[error("missing expected field: {what}")]
    #[diagnostic(
        code(paperflow::step::missing_field),
        help("Check that the previous step produced the required data.")
    )]
    MissingField { what: &'static str },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Archive(#[from] ArchiveError),

    /// A step's narrow schema did not match the collaborator's output.
    #[error("step output validation failed: {0}")]
    #[diagnostic(code(paperflow::step::schema))]
    Schema(#[from] serde_json::Error),
}

/// A named unit of work in the pipeline.
#[async_trait]
pub trait Step: Send + Sync {
    /// Stable name used in traces and failure summaries.
    fn name(&self) -> &'static str;

    /// Execute against a working copy of the state, returning the updated
    /// copy with `phase` advanced as far as this step takes it.
    async fn run(&self, state: RunState, ctx: &StepContext) -> Result<RunState, StepError>;
}

/// Wraps step invocation with failure normalization and the monotonic-phase
/// invariant.
#[derive(Clone, Copy, Debug, Default)]
pub struct StepExecutor;

impl StepExecutor {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Run one step. On success the step's returned state is handed back;
    /// on any error a copy of the *input* state enters `failed` with a
    /// summarized cause. A step that tries to move the phase backwards is
    /// treated the same as a failing step.
    pub async fn execute(
        &self,
        step: &dyn Step,
        state: RunState,
        ctx: &StepContext,
    ) -> RunState {
        let entry_phase = state.phase;
        tracing::debug!(run = %ctx.run_id, step = step.name(), phase = %entry_phase, "step starting");

        match step.run(state.clone(), ctx).await {
            Ok(next) => {
                if next.phase.rank() < entry_phase.rank() {
                    tracing::error!(
                        run = %ctx.run_id,
                        step = step.name(),
                        from = %entry_phase,
                        to = %next.phase,
                        "step attempted phase regression"
                    );
                    return state.into_failed(format!(
                        "step {} attempted phase regression ({} -> {})",
                        step.name(),
                        entry_phase,
                        next.phase
                    ));
                }
                tracing::debug!(run = %ctx.run_id, step = step.name(), phase = %next.phase, "step completed");
                next
            }
            Err(err) => {
                tracing::warn!(run = %ctx.run_id, step = step.name(), error = %err, "step failed");
                state.into_failed(format!("{}: {err}", step.name()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::keys;
    use crate::types::Phase;
    use serde_json::json;

    struct AdvanceStep;

    #[async_trait]
    impl Step for AdvanceStep {
        fn name(&self) -> &'static str {
            "advance"
        }

        async fn run(&self, mut state: RunState, _ctx: &StepContext) -> Result<RunState, StepError> {
            state.phase = Phase::Extracting;
            state.set(keys::TITLE, json!("t"));
            Ok(state)
        }
    }

    struct FailingStep;

    #[async_trait]
    impl Step for FailingStep {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn run(&self, _state: RunState, _ctx: &StepContext) -> Result<RunState, StepError> {
            Err(StepError::MissingField { what: "title" })
        }
    }

    struct RegressingStep;

    #[async_trait]
    impl Step for RegressingStep {
        fn name(&self) -> &'static str {
            "regressing"
        }

        async fn run(&self, mut state: RunState, _ctx: &StepContext) -> Result<RunState, StepError> {
            state.phase = Phase::Ingesting;
            Ok(state)
        }
    }

    fn fixture() -> (RunState, StepContext) {
        let run_id = RunId::derive("paper-A");
        (
            RunState::new(run_id.clone(), "paper-A"),
            StepContext::new(run_id),
        )
    }

    #[tokio::test]
    async fn success_hands_back_step_output() {
        let (state, ctx) = fixture();
        let next = StepExecutor::new().execute(&AdvanceStep, state, &ctx).await;
        assert_eq!(next.phase, Phase::Extracting);
        assert_eq!(next.get_str(keys::TITLE), Some("t"));
    }

    #[tokio::test]
    async fn failure_becomes_failed_state_with_cause() {
        let (state, ctx) = fixture();
        let next = StepExecutor::new().execute(&FailingStep, state, &ctx).await;
        assert_eq!(next.phase, Phase::Failed);
        let error = next.error.expect("error recorded");
        assert!(error.contains("failing"));
        assert!(error.contains("title"));
    }

    #[tokio::test]
    async fn phase_regression_is_a_failure() {
        let (mut state, ctx) = fixture();
        state.phase = Phase::Triaging;
        let next = StepExecutor::new().execute(&RegressingStep, state, &ctx).await;
        assert_eq!(next.phase, Phase::Failed);
        assert!(next.error.expect("error").contains("regression"));
    }
}
