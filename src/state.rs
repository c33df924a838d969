//! Run state for the paperflow pipeline.
//!
//! A [`RunState`] is the unit of persisted truth for one paper's journey:
//! identity, current [`Phase`], an open additive payload map that steps
//! enrich as the run progresses, and a sticky error once the run fails.
//!
//! # Payload map
//!
//! The payload is a versionless key/value structure. Fields are additive -
//! no step deletes another step's fields - and each step validates only the
//! narrow slice it consumes, so older persisted runs keep loading when new
//! fields appear. Well-known keys live in [`keys`].
//!
//! # Examples
//!
//! ```rust
//! use paperflow::state::{keys, RunState};
//! use paperflow::types::{Phase, RunId};
//! use serde_json::json;
//!
//! let mut state = RunState::new(
//!     RunId::derive("https://arxiv.org/abs/2401.00001"),
//!     "https://arxiv.org/abs/2401.00001",
//! );
//! assert_eq!(state.phase, Phase::Ingesting);
//!
//! state.set(keys::TITLE, json!("Attention Is Not All You Need"));
//! assert_eq!(state.get_str(keys::TITLE), Some("Attention Is Not All You Need"));
//!
//! let failed = state.into_failed("source unreachable");
//! assert_eq!(failed.phase, Phase::Failed);
//! assert_eq!(failed.error.as_deref(), Some("source unreachable"));
//! ```

use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::types::{Decision, Phase, RunId};

/// Well-known payload keys, grouped by the step that writes them.
///
/// Steps read and write through these constants; ad-hoc strings are reserved
/// for caller-supplied extra fields.
pub mod keys {
    // ingest
    pub const TITLE: &str = "title";
    pub const AUTHORS: &str = "authors";
    pub const YEAR: &str = "year";
    pub const ABSTRACT: &str = "abstract";
    pub const PDF_URL: &str = "pdf_url";
    pub const FULL_TEXT: &str = "full_text";

    // triage
    pub const TRIAGE_SUMMARY: &str = "triage_summary";
    pub const TRIAGE_CONTRIBUTIONS: &str = "triage_contributions";
    pub const TRIAGE_LIMITATIONS: &str = "triage_limitations";
    pub const TRIAGE_RELEVANCE: &str = "triage_relevance";
    pub const TRIAGE_SUGGESTED_ACTION: &str = "triage_suggested_action";
    pub const TRIAGE_SUGGESTED_TAGS: &str = "triage_suggested_tags";

    // archive
    pub const ARCHIVE_ITEM_ID: &str = "archive_item_id";
    pub const READING_DOC_ID: &str = "reading_doc_id";

    // human decision
    pub const HUMAN_DECISION: &str = "human_decision";
    pub const HUMAN_TAGS: &str = "human_tags";
    pub const HUMAN_COMMENT: &str = "human_comment";

    // deep read
    pub const DEEP_READ_OVERVIEW: &str = "deep_read_overview";
    pub const DEEP_READ_INNOVATIONS: &str = "deep_read_innovations";
    pub const DEEP_READ_DIRECTIONS: &str = "deep_read_directions";
}

/// The persisted state of one run.
///
/// Exclusively owned by the state store between steps; a step executes
/// against a working copy and hands back an updated copy, which the engine
/// persists before the next step starts.
#[derive(Clone, Debug, PartialEq)]
pub struct RunState {
    /// Stable identifier derived from the source reference.
    pub run_id: RunId,
    /// The original input (URL or equivalent).
    pub source_reference: String,
    /// Current position in the pipeline state machine.
    pub phase: Phase,
    /// Open additive map of step-produced fields.
    pub payload: FxHashMap<String, Value>,
    /// Present only when `phase == Failed`; never clears itself.
    pub error: Option<String>,
}

impl RunState {
    /// Fresh state at the head of the pipeline.
    #[must_use]
    pub fn new(run_id: RunId, source_reference: impl Into<String>) -> Self {
        Self {
            run_id,
            source_reference: source_reference.into(),
            phase: Phase::Ingesting,
            payload: FxHashMap::default(),
            error: None,
        }
    }

    /// Insert or replace a payload field.
    pub fn set(&mut self, key: &str, value: Value) -> &mut Self {
        self.payload.insert(key.to_string(), value);
        self
    }

    /// Raw payload lookup.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    /// String payload field, `None` when absent or not a string.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }

    /// String-list payload field; non-string elements are skipped.
    #[must_use]
    pub fn get_str_list(&self, key: &str) -> Vec<String> {
        self.payload
            .get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Integer payload field, `None` when absent or not a number.
    #[must_use]
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.payload.get(key).and_then(Value::as_i64)
    }

    /// The human decision recorded at resume time, if any.
    #[must_use]
    pub fn human_decision(&self) -> Option<Decision> {
        self.get_str(keys::HUMAN_DECISION).and_then(Decision::parse)
    }

    /// Consume this state into a failed copy with the error recorded.
    ///
    /// Payload fields gathered so far are preserved for the status query;
    /// only the phase and error change.
    #[must_use]
    pub fn into_failed(mut self, cause: impl Into<String>) -> Self {
        self.phase = Phase::Failed;
        self.error = Some(cause.into());
        self
    }

    /// Returns `true` once the run accepts no further transitions.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }
}

/// The human-facing digest emitted at the suspend point.
///
/// Ephemeral: built from the suspended state when the decision card is sent
/// and never persisted on its own. Carries no secrets - only what the card
/// renders plus the enumerated options.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct DecisionPayload {
    pub run_id: RunId,
    pub title: String,
    pub source_reference: String,
    pub summary: String,
    pub contributions: String,
    pub relevance: Option<i64>,
    pub suggested_action: Option<Decision>,
    pub suggested_tags: Vec<String>,
    /// The decisions the human may submit.
    pub options: Vec<Decision>,
}

impl DecisionPayload {
    /// Build the digest from a run suspended at `waiting_decision`.
    #[must_use]
    pub fn from_state(state: &RunState) -> Self {
        Self {
            run_id: state.run_id.clone(),
            title: state.get_str(keys::TITLE).unwrap_or("<unknown>").to_string(),
            source_reference: state.source_reference.clone(),
            summary: state
                .get_str(keys::TRIAGE_SUMMARY)
                .unwrap_or_default()
                .to_string(),
            contributions: state
                .get_str(keys::TRIAGE_CONTRIBUTIONS)
                .unwrap_or_default()
                .to_string(),
            relevance: state.get_i64(keys::TRIAGE_RELEVANCE),
            suggested_action: state
                .get_str(keys::TRIAGE_SUGGESTED_ACTION)
                .and_then(Decision::parse),
            suggested_tags: state.get_str_list(keys::TRIAGE_SUGGESTED_TAGS),
            options: Decision::ALL.to_vec(),
        }
    }
}
