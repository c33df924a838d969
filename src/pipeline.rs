//! The pipeline graph: ordered step composition with one suspend point.
//!
//! ```text
//! ingesting -> extracting -> triaging -> waiting_decision   [SUSPEND]
//! waiting_decision --(decision arrives)--> resuming
//! resuming --(deep_read)--> deep_reading -> completed
//! resuming --(skim | drop)--> completed
//! any phase --(step fails)--> failed                         [terminal]
//! ```
//!
//! The intake segment runs without suspension; `waiting_decision` is a
//! persisted-and-returned state, not a held task. Resumption re-enters at
//! the branch selected by the decision. The engine drives these sequences,
//! persisting after every step.

use std::sync::Arc;

use crate::collaborators::{Archive, DecisionDelivery, LanguageModel, PaperSource};
use crate::steps::{
    ArchiveBaseStep, DeepReadStep, ExtractStep, IngestStep, Step, TriageStep, UpdateArchiveStep,
};
use crate::types::Decision;

/// The injected collaborators a pipeline is built from.
///
/// Construction-time dependency injection: production wires the reqwest
/// clients from [`crate::collaborators`], tests substitute doubles.
pub struct Collaborators {
    pub source: Arc<dyn PaperSource>,
    pub model: Arc<dyn LanguageModel>,
    pub archive: Arc<dyn Archive>,
    pub delivery: Arc<dyn DecisionDelivery>,
}

/// The compiled step composition.
pub struct Pipeline {
    intake: Vec<Arc<dyn Step>>,
    deep_read: Arc<dyn Step>,
    finalize: Arc<dyn Step>,
}

impl Pipeline {
    /// Wire the steps from a set of collaborators.
    #[must_use]
    pub fn new(collaborators: &Collaborators) -> Self {
        let intake: Vec<Arc<dyn Step>> = vec![
            Arc::new(IngestStep::new(Arc::clone(&collaborators.source))),
            Arc::new(ExtractStep::new()),
            Arc::new(TriageStep::new(Arc::clone(&collaborators.model))),
            Arc::new(ArchiveBaseStep::new(Arc::clone(&collaborators.archive))),
        ];
        Self {
            intake,
            deep_read: Arc::new(DeepReadStep::new(
                Arc::clone(&collaborators.model),
                Arc::clone(&collaborators.archive),
            )),
            finalize: Arc::new(UpdateArchiveStep::new(Arc::clone(&collaborators.archive))),
        }
    }

    /// Steps from `ingesting` through the suspend point, in graph order.
    #[must_use]
    pub fn intake_steps(&self) -> &[Arc<dyn Step>] {
        &self.intake
    }

    /// Steps for the resumption branch selected by `decision`, in graph
    /// order. `deep_read` inserts the deep-reading step before the final
    /// archive update; `skim` and `drop` go straight to it.
    #[must_use]
    pub fn resume_steps(&self, decision: Decision) -> Vec<Arc<dyn Step>> {
        match decision {
            Decision::DeepRead => vec![Arc::clone(&self.deep_read), Arc::clone(&self.finalize)],
            Decision::Skim | Decision::Drop => vec![Arc::clone(&self.finalize)],
        }
    }
}
