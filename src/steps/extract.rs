//! Extract step: confirm the paper's content is reachable for analysis.
//!
//! The language model reads the PDF by URL, so no local text extraction
//! happens here; this step only verifies that ingest left the run with
//! something the triage step can feed the model.

use async_trait::async_trait;

use crate::state::{keys, RunState};
use crate::types::Phase;

use super::{Step, StepContext, StepError};

pub struct ExtractStep;

impl ExtractStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ExtractStep {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Step for ExtractStep {
    fn name(&self) -> &'static str {
        "extract"
    }

    async fn run(&self, mut state: RunState, _ctx: &StepContext) -> Result<RunState, StepError> {
        if state.get_str(keys::PDF_URL).is_none() && state.get_str(keys::FULL_TEXT).is_none() {
            return Err(StepError::MissingField { what: "pdf_url" });
        }
        state.phase = Phase::Triaging;
        Ok(state)
    }
}
