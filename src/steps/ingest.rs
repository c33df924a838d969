//! Ingest step: resolve the source reference into paper metadata.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

use crate::collaborators::PaperSource;
use crate::state::{keys, RunState};
use crate::types::Phase;

use super::{Step, StepContext, StepError};

/// Fetches title/authors/year/abstract and the content location for the
/// paper, then advances the run into `extracting`.
pub struct IngestStep {
    source: Arc<dyn PaperSource>,
}

impl IngestStep {
    pub fn new(source: Arc<dyn PaperSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl Step for IngestStep {
    fn name(&self) -> &'static str {
        "ingest"
    }

    async fn run(&self, mut state: RunState, _ctx: &StepContext) -> Result<RunState, StepError> {
        let metadata = self.source.fetch(&state.source_reference).await?;

        tracing::info!(title = %metadata.title, "paper metadata resolved");

        state.set(keys::TITLE, json!(metadata.title));
        state.set(keys::AUTHORS, json!(metadata.authors));
        if let Some(year) = metadata.year {
            state.set(keys::YEAR, json!(year));
        }
        state.set(keys::ABSTRACT, json!(metadata.abstract_text));
        if let Some(pdf_url) = metadata.pdf_url {
            state.set(keys::PDF_URL, json!(pdf_url));
        }
        if let Some(full_text) = metadata.full_text {
            state.set(keys::FULL_TEXT, json!(full_text));
        }
        state.phase = Phase::Extracting;
        Ok(state)
    }
}
