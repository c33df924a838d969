//! # Paperflow: Interruptible Paper-Triage Workflow
//!
//! Paperflow automates a personal paper-triage pipeline: given a paper link
//! it fetches metadata, asks a language model to summarize and recommend an
//! action, pauses for a human decision delivered via a chat-bot card, then
//! archives the result (optionally with a deep-read document) in an external
//! knowledge base.
//!
//! The core is an interruptible workflow engine: a directed pipeline of
//! steps that durably suspends at the human-decision point, persists its
//! paused state, and resumes from an external callback arbitrarily later -
//! hours to weeks - without holding a thread, task, or timer open. Suspend
//! is "persist state and return"; resume is "reload state and continue".
//!
//! ## Pipeline
//!
//! ```text
//! ingesting -> extracting -> triaging -> waiting_decision   [SUSPEND]
//! waiting_decision --(decision arrives)--> resuming
//! resuming --(deep_read)--> deep_reading -> completed
//! resuming --(skim | drop)--> completed
//! any phase --(step fails)--> failed                         [terminal]
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use paperflow::collaborators::{ArxivSource, CraftArchive, FeishuDelivery, OpenAiModel};
//! use paperflow::engine::{ResumeInput, WorkflowEngine};
//! use paperflow::pipeline::Collaborators;
//! use paperflow::store::InMemoryStateStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let collaborators = Collaborators {
//!     source: Arc::new(ArxivSource::new()),
//!     model: Arc::new(OpenAiModel::new("https://api.openai.com/v1", "sk-...", "gpt-4")),
//!     archive: Arc::new(CraftArchive::new("https://craft.example/api", "papers")),
//!     delivery: Arc::new(FeishuDelivery::new("app", "secret", "verify", "oc_chat", "chat_id")),
//! };
//! let engine = WorkflowEngine::new(Arc::new(InMemoryStateStore::new()), collaborators);
//!
//! // Drive to the suspend point; the decision card goes out to the chat.
//! let report = engine.start("https://arxiv.org/abs/2401.00001").await?;
//!
//! // ...days later, the human picks a button on the card...
//! let status = engine
//!     .resume(&report.run_id, ResumeInput::decision("deep_read"))
//!     .await?;
//! println!("run finished in phase {}", status.phase);
//! # Ok(())
//! # }
//! ```
//!
//! ## Guarantees
//!
//! - **Deterministic run ids**: the same source reference always maps to
//!   the same run; resubmission is detected, not duplicated.
//! - **Durable suspension**: state is persisted at every step boundary, so
//!   a crash mid-pipeline resumes from the last completed step. Steps are
//!   at-least-once and the base archive write is an upsert.
//! - **One execution per run**: a per-run permit refuses (never queues)
//!   overlapping starts or resumes; a TTL-bounded dedup table absorbs
//!   duplicate webhook deliveries at the ingestion boundary.
//! - **Contained failure**: collaborator errors fail the run, never the
//!   process; only storage failures abort an operation.
//!
//! ## Module Guide
//!
//! - [`types`] - run ids, phases, decisions
//! - [`state`] - run state and the decision payload
//! - [`store`] - durable state storage (in-memory and SQLite)
//! - [`guard`] - per-run mutual exclusion and trigger dedup
//! - [`steps`] - step contract, executor, and the pipeline steps
//! - [`pipeline`] - the step composition with its suspend point
//! - [`engine`] - start / resume / status orchestration
//! - [`collaborators`] - external service contracts and clients
//! - [`config`] - environment-driven settings
//! - [`telemetry`] - tracing subscriber setup

pub mod collaborators;
pub mod config;
pub mod engine;
pub mod guard;
pub mod pipeline;
pub mod state;
pub mod steps;
pub mod store;
pub mod telemetry;
pub mod types;
