//! Archive steps: the base upsert at the end of triage, and the final
//! update after the human decision.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

use crate::collaborators::{Archive, ArchiveEntry, ArchiveUpdate};
use crate::state::{keys, RunState};
use crate::types::{Decision, Phase};

use super::{Step, StepContext, StepError};

/// Upserts the base collection entry and suspends the run at
/// `waiting_decision`.
///
/// The upsert is keyed by the paper's link, so re-entry after a
/// failed-and-restarted run updates the existing entry instead of creating
/// a duplicate. If an earlier attempt already recorded the item id, the
/// call is skipped outright.
pub struct ArchiveBaseStep {
    archive: Arc<dyn Archive>,
}

impl ArchiveBaseStep {
    pub fn new(archive: Arc<dyn Archive>) -> Self {
        Self { archive }
    }
}

#[async_trait]
impl Step for ArchiveBaseStep {
    fn name(&self) -> &'static str {
        "archive_base"
    }

    async fn run(&self, mut state: RunState, _ctx: &StepContext) -> Result<RunState, StepError> {
        if let Some(item_id) = state.get_str(keys::ARCHIVE_ITEM_ID) {
            tracing::info!(item_id, "base archive entry already exists, skipping");
            state.phase = Phase::WaitingDecision;
            return Ok(state);
        }

        let entry = ArchiveEntry {
            title: state
                .get_str(keys::TITLE)
                .ok_or(StepError::MissingField { what: "title" })?
                .to_string(),
            link: state.source_reference.clone(),
            summary: state
                .get_str(keys::TRIAGE_SUMMARY)
                .unwrap_or_default()
                .to_string(),
            tags: state.get_str_list(keys::TRIAGE_SUGGESTED_TAGS),
        };

        let item_id = self.archive.upsert_base(&entry).await?;
        tracing::info!(item_id = %item_id, "base archive entry upserted");

        state.set(keys::ARCHIVE_ITEM_ID, json!(item_id));
        state.phase = Phase::WaitingDecision;
        Ok(state)
    }
}

/// Updates the existing collection entry after the decision branch has run,
/// then completes the run.
pub struct UpdateArchiveStep {
    archive: Arc<dyn Archive>,
}

impl UpdateArchiveStep {
    pub fn new(archive: Arc<dyn Archive>) -> Self {
        Self { archive }
    }
}

#[async_trait]
impl Step for UpdateArchiveStep {
    fn name(&self) -> &'static str {
        "update_archive"
    }

    async fn run(&self, mut state: RunState, _ctx: &StepContext) -> Result<RunState, StepError> {
        let item_id = state
            .get_str(keys::ARCHIVE_ITEM_ID)
            .ok_or(StepError::MissingField {
                what: "archive_item_id",
            })?
            .to_string();

        let deep_read = state.human_decision() == Some(Decision::DeepRead);
        let tags = {
            let human = state.get_str_list(keys::HUMAN_TAGS);
            if human.is_empty() { None } else { Some(human) }
        };

        let update = ArchiveUpdate {
            title: state
                .get_str(keys::TITLE)
                .unwrap_or("<unknown>")
                .to_string(),
            deep_read,
            reading_doc_id: state.get_str(keys::READING_DOC_ID).map(str::to_string),
            tags,
            comment: state
                .get_str(keys::HUMAN_COMMENT)
                .filter(|c| !c.is_empty())
                .map(str::to_string),
        };

        self.archive.update(&item_id, &update).await?;
        tracing::info!(item_id = %item_id, deep_read, "archive entry updated");

        state.phase = Phase::Completed;
        Ok(state)
    }
}
