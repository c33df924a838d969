//! Triage step: language-model analysis of the paper.
//!
//! The step owns the instructions and the narrow output schema
//! ([`TriageAnalysis`](crate::collaborators::TriageAnalysis)); the model
//! collaborator only guarantees parseable JSON.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

use crate::collaborators::{LanguageModel, ModelInput, TriageAnalysis};
use crate::state::{keys, RunState};

use super::{Step, StepContext, StepError};

const TRIAGE_INSTRUCTIONS: &str = r#"You are a research-paper triage assistant. Analyze the paper and reply with exactly one JSON object:

{
  "summary": "2-3 sentence core summary",
  "contributions": "3-5 main contributions",
  "limitations": "2-3 limitations or open directions",
  "relevance": 1-5 integer importance score,
  "suggested_action": "deep_read" | "skim" | "drop",
  "suggested_tags": ["1-3 tags from: AI Infra, MultiMode, Agent, Context Engineering, Memory, Agent Collaboration, Coding, Reasoning, Bench, Pre-Training, LLM, Post-Training, RAG"]
}

Return only the JSON object."#;

pub struct TriageStep {
    model: Arc<dyn LanguageModel>,
}

impl TriageStep {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl Step for TriageStep {
    fn name(&self) -> &'static str {
        "triage"
    }

    async fn run(&self, mut state: RunState, _ctx: &StepContext) -> Result<RunState, StepError> {
        let title = state
            .get_str(keys::TITLE)
            .ok_or(StepError::MissingField { what: "title" })?;
        let abstract_text = state
            .get_str(keys::ABSTRACT)
            .ok_or(StepError::MissingField { what: "abstract" })?;

        let input = ModelInput {
            text: format!("Title: {title}\n\nAbstract:\n{abstract_text}\n\nAnalyze this paper."),
            file_url: state.get_str(keys::PDF_URL).map(str::to_string),
        };

        let raw = self.model.analyze(TRIAGE_INSTRUCTIONS, &input).await?;
        let analysis: TriageAnalysis = serde_json::from_value(raw)?;

        tracing::info!(
            suggested_action = %analysis.suggested_action,
            relevance = analysis.relevance,
            "triage analysis complete"
        );

        state.set(keys::TRIAGE_SUMMARY, json!(analysis.summary));
        state.set(keys::TRIAGE_CONTRIBUTIONS, json!(analysis.contributions));
        state.set(keys::TRIAGE_LIMITATIONS, json!(analysis.limitations));
        state.set(keys::TRIAGE_RELEVANCE, json!(analysis.relevance));
        state.set(
            keys::TRIAGE_SUGGESTED_ACTION,
            json!(analysis.suggested_action.as_str()),
        );
        state.set(keys::TRIAGE_SUGGESTED_TAGS, json!(analysis.suggested_tags));
        Ok(state)
    }
}
