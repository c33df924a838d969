//! External collaborators consumed by the pipeline steps.
//!
//! Each collaborator is a narrow request/response contract with no state
//! machine of its own: paper metadata lookup, language-model analysis,
//! knowledge-base archiving, and decision-card delivery. The engine receives
//! trait objects at construction, so tests substitute doubles and production
//! wires the clients in the submodules.
//!
//! Failure surfaces are per-collaborator error enums; the step executor is
//! the single place they are normalized into a failed run.

pub mod arxiv;
pub mod craft;
pub mod feishu;
pub mod llm;

use async_trait::async_trait;
use miette::Diagnostic;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::state::DecisionPayload;
use crate::types::Decision;

pub use arxiv::ArxivSource;
pub use craft::CraftArchive;
pub use feishu::FeishuDelivery;
pub use llm::OpenAiModel;

// ============================================================================
// Data types
// ============================================================================

/// Metadata resolved for a paper source.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct PaperMetadata {
    pub title: String,
    pub authors: Vec<String>,
    pub year: Option<i64>,
    pub abstract_text: String,
    /// Where the full text can be read (handed to the language model).
    pub pdf_url: Option<String>,
    /// Inline full text, when the source provides it directly.
    pub full_text: Option<String>,
}

/// Input handed to the language model alongside the instructions.
#[derive(Clone, Debug, Default)]
pub struct ModelInput {
    pub text: String,
    /// Optional document the model should read in addition to the text.
    pub file_url: Option<String>,
}

/// Structured triage output; the triage step's narrow schema.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct TriageAnalysis {
    pub summary: String,
    #[serde(default)]
    pub contributions: String,
    #[serde(default)]
    pub limitations: String,
    #[serde(default = "default_relevance")]
    pub relevance: i64,
    pub suggested_action: Decision,
    #[serde(default)]
    pub suggested_tags: Vec<String>,
}

fn default_relevance() -> i64 {
    3
}

/// Long-form deep-read output; the deep-read step's narrow schema.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct DeepReadNote {
    pub overview: String,
    #[serde(default)]
    pub innovations: String,
    #[serde(default)]
    pub directions: String,
}

/// Fields for the base archive entry of one paper.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ArchiveEntry {
    pub title: String,
    pub link: String,
    pub summary: String,
    pub tags: Vec<String>,
}

/// Fields for the post-decision update of an existing archive entry.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ArchiveUpdate {
    pub title: String,
    pub deep_read: bool,
    /// Document to back-reference from the collection entry.
    pub reading_doc_id: Option<String>,
    pub tags: Option<Vec<String>>,
    pub comment: Option<String>,
}

// ============================================================================
// Errors
// ============================================================================

/// The source is unreachable or unparseable.
#[derive(Debug, Error, Diagnostic)]
pub enum ExtractionError {
    #[error("unsupported source reference: {reference}")]
    #[diagnostic(
        code(paperflow::extract::unsupported),
        help("Only arXiv abs/pdf URLs are recognized by this source.")
    )]
    UnsupportedSource { reference: String },

    #[error("source transport failure: {message}")]
    #[diagnostic(code(paperflow::extract::transport))]
    Transport { message: String },

    #[error("source returned no usable entry for {reference}")]
    #[diagnostic(code(paperflow::extract::empty))]
    EmptyResult { reference: String },
}

/// Transport failure or a response the model client could not shape into
/// parseable JSON. The engine does not repair malformed output.
#[derive(Debug, Error, Diagnostic)]
pub enum LlmError {
    #[error("model transport failure: {message}")]
    #[diagnostic(code(paperflow::llm::transport))]
    Transport { message: String },

    #[error("model response was not parseable JSON: {message}")]
    #[diagnostic(
        code(paperflow::llm::malformed),
        help("The model must return a single JSON object, optionally fenced.")
    )]
    MalformedResponse { message: String },
}

/// Archive API failure.
#[derive(Debug, Error, Diagnostic)]
pub enum ArchiveError {
    #[error("archive transport failure: {message}")]
    #[diagnostic(code(paperflow::archive::transport))]
    Transport { message: String },

    #[error("archive response missing {what}")]
    #[diagnostic(code(paperflow::archive::missing))]
    MissingField { what: &'static str },
}

/// Decision-card delivery failure. Degrades to a logged warning upstream;
/// never fails the pipeline.
#[derive(Debug, Error, Diagnostic)]
pub enum DeliveryError {
    #[error("delivery transport failure: {message}")]
    #[diagnostic(code(paperflow::delivery::transport))]
    Transport { message: String },

    #[error("delivery rejected: code={code} msg={message}")]
    #[diagnostic(code(paperflow::delivery::rejected))]
    Rejected { code: i64, message: String },
}

// ============================================================================
// Contracts
// ============================================================================

/// Resolves a source reference into paper metadata.
#[async_trait]
pub trait PaperSource: Send + Sync {
    async fn fetch(&self, source_reference: &str) -> Result<PaperMetadata, ExtractionError>;
}

/// Language-model collaborator.
///
/// Both operations either return parseable JSON or raise; callers apply
/// their own narrow schema to the returned value.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Structured analysis of the input under the given instructions.
    async fn analyze(&self, instructions: &str, input: &ModelInput) -> Result<Value, LlmError>;

    /// Long-form writing under the given instructions, still as one JSON
    /// object so the caller can pick the sections it archives.
    async fn write(&self, instructions: &str, input: &ModelInput) -> Result<Value, LlmError>;
}

/// Knowledge-base archive. All operations are idempotent under repeated
/// identical calls.
#[async_trait]
pub trait Archive: Send + Sync {
    /// Insert-or-update the base entry keyed by the paper's link; returns
    /// the entry's handle.
    async fn upsert_base(&self, entry: &ArchiveEntry) -> Result<String, ArchiveError>;

    /// Create the deep-read document; returns the document's handle.
    async fn create_document(
        &self,
        title: &str,
        note: &DeepReadNote,
    ) -> Result<String, ArchiveError>;

    /// Update an existing entry in place.
    async fn update(&self, item_id: &str, update: &ArchiveUpdate) -> Result<(), ArchiveError>;
}

/// Delivers the decision card to the human. Fire-and-forget from the
/// engine's perspective.
#[async_trait]
pub trait DecisionDelivery: Send + Sync {
    async fn send_decision_card(&self, payload: &DecisionPayload) -> Result<(), DeliveryError>;
}
