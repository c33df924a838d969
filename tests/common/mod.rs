//! Shared fixtures: scripted collaborator doubles and engine wiring.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;

use paperflow::collaborators::{
    Archive, ArchiveEntry, ArchiveError, ArchiveUpdate, DecisionDelivery, DeepReadNote,
    DeliveryError, ExtractionError, LanguageModel, LlmError, ModelInput, PaperMetadata,
    PaperSource,
};
use paperflow::engine::WorkflowEngine;
use paperflow::pipeline::Collaborators;
use paperflow::state::DecisionPayload;
use paperflow::store::{InMemoryStateStore, StateStore};

/// Paper source returning fixed metadata, or failing when scripted to.
pub struct FakeSource {
    pub fail: bool,
}

#[async_trait]
impl PaperSource for FakeSource {
    async fn fetch(&self, source_reference: &str) -> Result<PaperMetadata, ExtractionError> {
        if self.fail {
            return Err(ExtractionError::Transport {
                message: "connection refused".to_string(),
            });
        }
        Ok(PaperMetadata {
            title: format!("Paper for {source_reference}"),
            authors: vec!["Ada Lovelace".to_string()],
            year: Some(2026),
            abstract_text: "We study interruptible pipelines.".to_string(),
            pdf_url: Some("https://arxiv.org/pdf/2401.00001".to_string()),
            full_text: None,
        })
    }
}

/// Language model returning canned triage/deep-read JSON.
#[derive(Default)]
pub struct FakeModel {
    pub fail_analyze: bool,
    pub malformed_analyze: bool,
}

#[async_trait]
impl LanguageModel for FakeModel {
    async fn analyze(&self, _instructions: &str, _input: &ModelInput) -> Result<Value, LlmError> {
        if self.fail_analyze {
            return Err(LlmError::Transport {
                message: "model timeout".to_string(),
            });
        }
        if self.malformed_analyze {
            // Parseable JSON whose shape does not match the triage schema.
            return Ok(json!({ "totally": "unrelated" }));
        }
        Ok(json!({
            "summary": "A crisp summary.",
            "contributions": "Three things.",
            "limitations": "Two things.",
            "relevance": 4,
            "suggested_action": "deep_read",
            "suggested_tags": ["Agent", "Reasoning"],
        }))
    }

    async fn write(&self, _instructions: &str, _input: &ModelInput) -> Result<Value, LlmError> {
        Ok(json!({
            "overview": "Long-form overview.",
            "innovations": "Novel bits.",
            "directions": "Follow-ups.",
        }))
    }
}

/// Archive recording every call; upserts are idempotent by link.
#[derive(Default)]
pub struct RecordingArchive {
    pub upserts: Mutex<Vec<ArchiveEntry>>,
    pub documents: Mutex<Vec<String>>,
    pub updates: Mutex<Vec<(String, ArchiveUpdate)>>,
    pub fail_upsert: bool,
}

impl RecordingArchive {
    /// Number of distinct logical entries created for a link. Upserts are
    /// keyed by link, so any number of calls yields at most one.
    pub fn entries_for_link(&self, link: &str) -> usize {
        usize::from(self.upserts.lock().iter().any(|e| e.link == link))
    }

    /// Raw number of upsert calls seen for a link.
    pub fn upsert_calls_for_link(&self, link: &str) -> usize {
        self.upserts.lock().iter().filter(|e| e.link == link).count()
    }
}

#[async_trait]
impl Archive for RecordingArchive {
    async fn upsert_base(&self, entry: &ArchiveEntry) -> Result<String, ArchiveError> {
        if self.fail_upsert {
            return Err(ArchiveError::Transport {
                message: "archive 500".to_string(),
            });
        }
        let mut upserts = self.upserts.lock();
        let id = format!("item-{}", entry.link);
        upserts.push(entry.clone());
        Ok(id)
    }

    async fn create_document(
        &self,
        title: &str,
        _note: &DeepReadNote,
    ) -> Result<String, ArchiveError> {
        let id = format!("doc-{title}");
        self.documents.lock().push(id.clone());
        Ok(id)
    }

    async fn update(&self, item_id: &str, update: &ArchiveUpdate) -> Result<(), ArchiveError> {
        self.updates
            .lock()
            .push((item_id.to_string(), update.clone()));
        Ok(())
    }
}

/// Delivery capturing sent payloads; optionally failing to verify that card
/// loss never fails the run.
#[derive(Default)]
pub struct CapturingDelivery {
    pub sent: Mutex<Vec<DecisionPayload>>,
    pub fail: bool,
}

#[async_trait]
impl DecisionDelivery for CapturingDelivery {
    async fn send_decision_card(&self, payload: &DecisionPayload) -> Result<(), DeliveryError> {
        if self.fail {
            return Err(DeliveryError::Transport {
                message: "bot unreachable".to_string(),
            });
        }
        self.sent.lock().push(payload.clone());
        Ok(())
    }
}

/// Everything a test needs to drive and inspect an engine.
pub struct Harness {
    pub engine: WorkflowEngine,
    pub store: Arc<InMemoryStateStore>,
    pub archive: Arc<RecordingArchive>,
    pub delivery: Arc<CapturingDelivery>,
}

#[derive(Default)]
pub struct HarnessOptions {
    pub source_fails: bool,
    pub model_fails: bool,
    pub model_malformed: bool,
    pub archive_fails: bool,
    pub delivery_fails: bool,
}

pub fn harness(options: HarnessOptions) -> Harness {
    let store = Arc::new(InMemoryStateStore::new());
    let archive = Arc::new(RecordingArchive {
        fail_upsert: options.archive_fails,
        ..Default::default()
    });
    let delivery = Arc::new(CapturingDelivery {
        fail: options.delivery_fails,
        ..Default::default()
    });

    let collaborators = Collaborators {
        source: Arc::new(FakeSource {
            fail: options.source_fails,
        }),
        model: Arc::new(FakeModel {
            fail_analyze: options.model_fails,
            malformed_analyze: options.model_malformed,
        }),
        archive: Arc::clone(&archive) as Arc<dyn Archive>,
        delivery: Arc::clone(&delivery) as Arc<dyn DecisionDelivery>,
    };

    Harness {
        engine: WorkflowEngine::new(
            Arc::clone(&store) as Arc<dyn StateStore>,
            collaborators,
        ),
        store,
        archive,
        delivery,
    }
}

pub fn default_harness() -> Harness {
    harness(HarnessOptions::default())
}

/// Harness over an existing store, simulating a process restart: fresh
/// engine, guard, and dedup table, shared durable state.
pub fn harness_with_store(store: Arc<InMemoryStateStore>) -> Harness {
    let archive = Arc::new(RecordingArchive::default());
    let delivery = Arc::new(CapturingDelivery::default());

    let collaborators = Collaborators {
        source: Arc::new(FakeSource { fail: false }),
        model: Arc::new(FakeModel::default()),
        archive: Arc::clone(&archive) as Arc<dyn Archive>,
        delivery: Arc::clone(&delivery) as Arc<dyn DecisionDelivery>,
    };

    Harness {
        engine: WorkflowEngine::new(
            Arc::clone(&store) as Arc<dyn StateStore>,
            collaborators,
        ),
        store,
        archive,
        delivery,
    }
}
