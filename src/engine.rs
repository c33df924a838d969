//! The workflow engine: start, suspend, resume, status.
//!
//! [`WorkflowEngine`] is the public entry point of the crate. `start` drives
//! a fresh run from `ingesting` through the suspend point, persisting at
//! every step boundary so a crash mid-pipeline resumes from the last
//! completed step rather than from scratch (steps are at-least-once and the
//! base archive write is an upsert for exactly this reason). The suspend
//! point holds no task, thread, or timer: the run is persisted at
//! `waiting_decision` and control returns. `resume` is a fresh invocation -
//! it reloads the persisted state by run id and drives the selected branch
//! to a terminal phase, however much real time has passed.
//!
//! Collaborator failures never cross the step boundary (they become a
//! `failed` run); only storage failures abort an operation, because without
//! durable persistence the run's true status is unknown.

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::instrument;

use crate::guard::{ConcurrencyGuard, ConcurrencyRefused, TriggerDedup};
use crate::pipeline::{Collaborators, Pipeline};
use crate::state::{keys, DecisionPayload, RunState};
use crate::steps::{StepContext, StepExecutor};
use crate::store::{StateStore, StoreError};
use crate::types::{Decision, Phase, RunId};
use std::sync::Arc;

/// Outcome of [`WorkflowEngine::start`].
#[derive(Clone, Debug)]
pub struct StartReport {
    pub run_id: RunId,
    /// `WaitingDecision` on the happy path, `Failed` when a step failed.
    pub phase: Phase,
    /// Present when the run suspended; what the decision card rendered.
    pub decision_payload: Option<DecisionPayload>,
    pub error: Option<String>,
}

/// External decision input for [`WorkflowEngine::resume`].
///
/// `decision` stays a raw string here: validating it against the enumerated
/// set is the engine's job, and a bad value must leave the run untouched.
#[derive(Clone, Debug, Default)]
pub struct ResumeInput {
    pub decision: String,
    /// Overrides the triage-suggested tags when non-empty.
    pub tags: Vec<String>,
    pub comment: Option<String>,
}

impl ResumeInput {
    #[must_use]
    pub fn decision(decision: impl Into<String>) -> Self {
        Self {
            decision: decision.into(),
            ..Default::default()
        }
    }
}

/// Read-only snapshot of a run for callers.
#[derive(Clone, Debug)]
pub struct RunStatus {
    pub run_id: RunId,
    pub phase: Phase,
    pub payload: FxHashMap<String, Value>,
    pub error: Option<String>,
}

impl RunStatus {
    fn from_state(state: &RunState) -> Self {
        Self {
            run_id: state.run_id.clone(),
            phase: state.phase,
            payload: state.payload.clone(),
            error: state.error.clone(),
        }
    }
}

/// Operation-level failures reported to callers of the engine.
#[derive(Debug, Error, Diagnostic)]
pub enum EngineError {
    /// Storage failed; the run must not be assumed progressed.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Persistence(#[from] StoreError),

    /// Resumption attempted against a run not sitting at the suspend point
    /// (already completed, failed, mid-flight, or never started).
    #[error("run {run_id} is not awaiting a decision (phase: {phase})")]
    #[diagnostic(
        code(paperflow::engine::stale_resume),
        help("Only runs at waiting_decision accept a decision; nothing was changed.")
    )]
    StaleResume {
        run_id: RunId,
        /// Encoded phase, or "absent" when the run was never started.
        phase: String,
    },

    /// The decision value is outside the enumerated set. The run remains at
    /// `waiting_decision`; submit a corrected value.
    #[error("invalid decision value: {value:?}")]
    #[diagnostic(
        code(paperflow::engine::validation),
        help("Valid decisions are deep_read, skim and drop.")
    )]
    InvalidDecision { value: String },

    /// Another execution holds this run's permit; retry shortly.
    #[error(transparent)]
    #[diagnostic(transparent)]
    ConcurrencyRefused(#[from] ConcurrencyRefused),

    /// An identical trigger was admitted within the dedup window.
    #[error("duplicate trigger for run {run_id} suppressed")]
    #[diagnostic(code(paperflow::engine::duplicate_trigger))]
    DuplicateTrigger { run_id: RunId },

    /// `start` called for a source whose run is active or completed.
    #[error("run {run_id} already exists (phase: {phase})")]
    #[diagnostic(
        code(paperflow::engine::already_running),
        help("Only failed runs can be restarted; query status instead.")
    )]
    AlreadyRunning { run_id: RunId, phase: Phase },

    /// Status query for a run that was never started.
    #[error("run {run_id} not found")]
    #[diagnostic(code(paperflow::engine::not_found))]
    RunNotFound { run_id: RunId },
}

/// Orchestrates runs over a state store, a concurrency guard, and the
/// pipeline's collaborators. All dependencies are injected at construction.
pub struct WorkflowEngine {
    store: Arc<dyn StateStore>,
    guard: ConcurrencyGuard,
    dedup: TriggerDedup,
    pipeline: Pipeline,
    executor: StepExecutor,
    delivery: Arc<dyn crate::collaborators::DecisionDelivery>,
}

impl WorkflowEngine {
    #[must_use]
    pub fn new(store: Arc<dyn StateStore>, collaborators: Collaborators) -> Self {
        let pipeline = Pipeline::new(&collaborators);
        Self {
            store,
            guard: ConcurrencyGuard::new(),
            dedup: TriggerDedup::new(),
            pipeline,
            executor: StepExecutor::new(),
            delivery: collaborators.delivery,
        }
    }

    /// Ingestion-side duplicate filter hook.
    ///
    /// Intended for the API layer to absorb repeated webhook deliveries of
    /// the same external message (by message id or equivalent fingerprint).
    /// Checks and atomically records the key; `true` means skip.
    pub fn is_duplicate_trigger(&self, dedup_key: &str) -> bool {
        self.dedup.is_duplicate_trigger(dedup_key)
    }

    /// Start a new run for `source_reference` and drive it to the suspend
    /// point (or to `failed`).
    ///
    /// The run id is a deterministic function of the source, so resubmission
    /// maps onto the existing run: active and completed runs are refused
    /// with [`EngineError::AlreadyRunning`], failed runs are restarted from
    /// scratch under the same id. Fresh sources additionally pass a
    /// TTL-bounded dedup check that absorbs webhook-style redeliveries.
    #[instrument(skip(self, source_reference), err)]
    pub async fn start(&self, source_reference: &str) -> Result<StartReport, EngineError> {
        let source = source_reference.trim();
        let run_id = RunId::derive(source);
        tracing::info!(run = %run_id, source, "start requested");

        let restarting = match self.store.load(&run_id).await? {
            Some(existing) if existing.phase != Phase::Failed => {
                return Err(EngineError::AlreadyRunning {
                    run_id,
                    phase: existing.phase,
                });
            }
            Some(_) => true,
            None => false,
        };

        // A human retrying a failed run is not a duplicate webhook burst, so
        // the restart path skips suppression.
        if !restarting && self.dedup.is_duplicate_trigger(run_id.as_str()) {
            return Err(EngineError::DuplicateTrigger { run_id });
        }

        let _permit = self.guard.admit(&run_id)?;

        // Double-check now that we hold the permit: a concurrent start may
        // have won the race between the first load and admission.
        if let Some(existing) = self.store.load(&run_id).await? {
            if existing.phase != Phase::Failed {
                return Err(EngineError::AlreadyRunning {
                    run_id,
                    phase: existing.phase,
                });
            }
        }

        let mut state = RunState::new(run_id.clone(), source);
        self.store.save(&state).await?;

        let ctx = StepContext::new(run_id.clone());
        for step in self.pipeline.intake_steps() {
            state = self.executor.execute(step.as_ref(), state, &ctx).await;
            self.store.save(&state).await?;
            if state.phase == Phase::Failed {
                break;
            }
        }

        let decision_payload = if state.phase == Phase::WaitingDecision {
            let payload = DecisionPayload::from_state(&state);
            // Fire-and-forget: the archive already reflects triage results,
            // so a lost card degrades to a warning, not a failed run.
            if let Err(err) = self.delivery.send_decision_card(&payload).await {
                tracing::warn!(run = %run_id, error = %err, "decision card delivery failed");
            }
            Some(payload)
        } else {
            None
        };

        tracing::info!(run = %run_id, phase = %state.phase, "start finished");
        Ok(StartReport {
            run_id,
            phase: state.phase,
            decision_payload,
            error: state.error,
        })
    }

    /// Resume a suspended run with the human decision and drive it to a
    /// terminal phase.
    ///
    /// Validation order matters: a malformed decision is rejected before
    /// anything is loaded or admitted, so the run stays at
    /// `waiting_decision` and a corrected value can still be submitted. A
    /// run in any other phase yields [`EngineError::StaleResume`] with no
    /// state mutation - never a retroactive replay.
    #[instrument(skip(self, input), fields(run = %run_id), err)]
    pub async fn resume(&self, run_id: &RunId, input: ResumeInput) -> Result<RunStatus, EngineError> {
        let decision =
            Decision::parse(&input.decision).ok_or_else(|| EngineError::InvalidDecision {
                value: input.decision.clone(),
            })?;

        let stale = |phase: String| EngineError::StaleResume {
            run_id: run_id.clone(),
            phase,
        };

        match self.store.load(run_id).await? {
            None => return Err(stale("absent".to_string())),
            Some(state) if state.phase != Phase::WaitingDecision => {
                return Err(stale(state.phase.encode().to_string()));
            }
            Some(_) => {}
        }

        let _permit = self.guard.admit(run_id)?;

        // Re-load under the permit; a concurrent resume may have advanced
        // the run between the check and admission.
        let mut state = match self.store.load(run_id).await? {
            None => return Err(stale("absent".to_string())),
            Some(state) if state.phase != Phase::WaitingDecision => {
                return Err(stale(state.phase.encode().to_string()));
            }
            Some(state) => state,
        };

        tracing::info!(run = %run_id, decision = %decision, "resuming");

        state.phase = Phase::Resuming;
        state.set(keys::HUMAN_DECISION, json!(decision.as_str()));
        let tags = if input.tags.is_empty() {
            state.get_str_list(keys::TRIAGE_SUGGESTED_TAGS)
        } else {
            input.tags
        };
        state.set(keys::HUMAN_TAGS, json!(tags));
        if let Some(comment) = input.comment {
            state.set(keys::HUMAN_COMMENT, json!(comment));
        }
        self.store.save(&state).await?;

        let ctx = StepContext::new(run_id.clone());
        for step in self.pipeline.resume_steps(decision) {
            state = self.executor.execute(step.as_ref(), state, &ctx).await;
            self.store.save(&state).await?;
            if state.phase == Phase::Failed {
                break;
            }
        }

        tracing::info!(run = %run_id, phase = %state.phase, "resume finished");
        Ok(RunStatus::from_state(&state))
    }

    /// Current phase and payload snapshot for a run. Read-only; no guard.
    #[instrument(skip(self), fields(run = %run_id), err)]
    pub async fn status(&self, run_id: &RunId) -> Result<RunStatus, EngineError> {
        match self.store.load(run_id).await? {
            Some(state) => Ok(RunStatus::from_state(&state)),
            None => Err(EngineError::RunNotFound {
                run_id: run_id.clone(),
            }),
        }
    }
}
