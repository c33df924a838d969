//! Deep-read step: long-form note generation plus document creation.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

use crate::collaborators::{Archive, DeepReadNote, LanguageModel, ModelInput};
use crate::state::{keys, RunState};
use crate::types::Phase;

use super::{Step, StepContext, StepError};

const DEEP_READ_INSTRUCTIONS: &str = r#"You are a research-paper deep-reading assistant. Study the paper closely and reply with exactly one JSON object:

{
  "overview": "research background, problem definition, methodology and main results (300-500 words)",
  "innovations": "analysis of the technical, methodological and applied innovations (200-300 words)",
  "directions": "3-5 research directions or application scenarios this work could combine with"
}

Return only the JSON object."#;

/// Generates the deep-read note and creates the reading document in the
/// knowledge base, recording the document handle so the archive update can
/// back-reference it.
///
/// Idempotent: a run that already carries a reading document id skips both
/// the model call and the document creation, so re-execution after a crash
/// between persist points cannot produce a second document.
pub struct DeepReadStep {
    model: Arc<dyn LanguageModel>,
    archive: Arc<dyn Archive>,
}

impl DeepReadStep {
    pub fn new(model: Arc<dyn LanguageModel>, archive: Arc<dyn Archive>) -> Self {
        Self { model, archive }
    }
}

#[async_trait]
impl Step for DeepReadStep {
    fn name(&self) -> &'static str {
        "deep_read"
    }

    async fn run(&self, mut state: RunState, _ctx: &StepContext) -> Result<RunState, StepError> {
        if let Some(doc_id) = state.get_str(keys::READING_DOC_ID) {
            tracing::info!(doc_id, "reading document already exists, skipping");
            return Ok(state);
        }

        let title = state
            .get_str(keys::TITLE)
            .ok_or(StepError::MissingField { what: "title" })?
            .to_string();
        state.phase = Phase::DeepReading;

        let input = ModelInput {
            text: format!(
                "Title: {title}\n\nAbstract:\n{}\n\nTriage summary:\n{}\n\nWrite the deep-read analysis.",
                state.get_str(keys::ABSTRACT).unwrap_or_default(),
                state.get_str(keys::TRIAGE_SUMMARY).unwrap_or_default(),
            ),
            file_url: state.get_str(keys::PDF_URL).map(str::to_string),
        };

        let raw = self.model.write(DEEP_READ_INSTRUCTIONS, &input).await?;
        let note: DeepReadNote = serde_json::from_value(raw)?;

        state.set(keys::DEEP_READ_OVERVIEW, json!(&note.overview));
        state.set(keys::DEEP_READ_INNOVATIONS, json!(&note.innovations));
        state.set(keys::DEEP_READ_DIRECTIONS, json!(&note.directions));

        let doc_id = self.archive.create_document(&title, &note).await?;
        tracing::info!(doc_id = %doc_id, "reading document created");

        state.set(keys::READING_DOC_ID, json!(doc_id));
        Ok(state)
    }
}
