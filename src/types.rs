//! Core types for the paperflow workflow engine.
//!
//! This module defines the fundamental identifiers used throughout the crate:
//! which run a piece of state belongs to, where that run sits in the pipeline,
//! and which action the human picked at the suspend point.
//!
//! # Key Types
//!
//! - [`RunId`]: stable, deterministic identifier for one run
//! - [`Phase`]: the run's current position in the pipeline state machine
//! - [`Decision`]: the enumerated human choice delivered at resume time
//!
//! # Examples
//!
//! ```rust
//! use paperflow::types::{Decision, Phase, RunId};
//!
//! // Same source, same id - resubmissions are detected, not duplicated.
//! let a = RunId::derive("https://arxiv.org/abs/2401.00001");
//! let b = RunId::derive("https://arxiv.org/abs/2401.00001");
//! assert_eq!(a, b);
//!
//! // Phases encode to stable strings for persistence.
//! assert_eq!(Phase::WaitingDecision.encode(), "waiting_decision");
//! assert_eq!(Phase::decode("waiting_decision"), Some(Phase::WaitingDecision));
//!
//! assert_eq!(Decision::parse("deep_read"), Some(Decision::DeepRead));
//! assert_eq!(Decision::parse("archive_everything"), None);
//! ```

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Stable identifier for a single run of the pipeline.
///
/// Derived deterministically from the source reference so that a resubmission
/// of the same paper maps onto the existing run instead of forking a second
/// one. The derivation is the first 16 hex characters of the SHA-256 of the
/// trimmed source string.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// Derive the run id for a source reference.
    ///
    /// The input is trimmed before hashing so that incidental whitespace from
    /// chat messages does not split one paper into two runs.
    #[must_use]
    pub fn derive(source_reference: &str) -> Self {
        let digest = Sha256::digest(source_reference.trim().as_bytes());
        RunId(hex::encode(digest)[..16].to_string())
    }

    /// Wrap an already-derived id (e.g. one received back from a callback).
    pub fn from_string(raw: impl Into<String>) -> Self {
        RunId(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RunId {
    fn from(s: &str) -> Self {
        RunId(s.to_string())
    }
}

/// Position of a run in the pipeline state machine.
///
/// Transitions are monotonic along the pipeline graph: a run never moves to a
/// phase with a lower [`rank`](Self::rank), except into [`Failed`](Self::Failed),
/// which is reachable from anywhere and terminal. `WaitingDecision` is the
/// single suspend point; `Completed` and `Failed` are terminal.
///
/// # Persistence
///
/// `Phase` round-trips through [`encode`](Self::encode)/[`decode`](Self::decode)
/// as a snake_case string, which is also its serde representation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Accepting the source reference and resolving paper metadata.
    Ingesting,
    /// Confirming the paper's content is reachable for analysis.
    Extracting,
    /// Running the triage analysis and archiving the base entry.
    Triaging,
    /// Suspended, awaiting the human decision. The only suspend point.
    WaitingDecision,
    /// A decision arrived; the run is being driven to a terminal phase.
    Resuming,
    /// Producing the long-form deep-read note and its document.
    DeepReading,
    /// Terminal: the run finished and the archive reflects it.
    Completed,
    /// Terminal: a step failed; `error` on the run state holds the cause.
    Failed,
}

impl Phase {
    /// Encode this phase into its persisted string form.
    #[must_use]
    pub fn encode(&self) -> &'static str {
        match self {
            Phase::Ingesting => "ingesting",
            Phase::Extracting => "extracting",
            Phase::Triaging => "triaging",
            Phase::WaitingDecision => "waiting_decision",
            Phase::Resuming => "resuming",
            Phase::DeepReading => "deep_reading",
            Phase::Completed => "completed",
            Phase::Failed => "failed",
        }
    }

    /// Decode a persisted string form back into a phase.
    ///
    /// Returns `None` for unknown strings; persisted runs never contain
    /// phases this build does not know about (payload fields are additive,
    /// phases are not).
    #[must_use]
    pub fn decode(s: &str) -> Option<Self> {
        Some(match s {
            "ingesting" => Phase::Ingesting,
            "extracting" => Phase::Extracting,
            "triaging" => Phase::Triaging,
            "waiting_decision" => Phase::WaitingDecision,
            "resuming" => Phase::Resuming,
            "deep_reading" => Phase::DeepReading,
            "completed" => Phase::Completed,
            "failed" => Phase::Failed,
            _ => return None,
        })
    }

    /// Ordinal position along the pipeline graph, used to enforce the
    /// monotonic-transition invariant. `Failed` ranks above everything since
    /// it is reachable from any phase.
    #[must_use]
    pub fn rank(&self) -> u8 {
        match self {
            Phase::Ingesting => 0,
            Phase::Extracting => 1,
            Phase::Triaging => 2,
            Phase::WaitingDecision => 3,
            Phase::Resuming => 4,
            Phase::DeepReading => 5,
            Phase::Completed => 6,
            Phase::Failed => 7,
        }
    }

    /// Returns `true` once the run accepts no further transitions.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Completed | Phase::Failed)
    }

    /// Returns `true` at the suspend point.
    #[must_use]
    pub fn is_suspended(&self) -> bool {
        matches!(self, Phase::WaitingDecision)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}

/// The enumerated human choice at the suspend point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Produce a deep-read note and a linked document before completing.
    DeepRead,
    /// Keep the base archive entry, no deep read.
    Skim,
    /// Keep the base archive entry, explicitly marked as dropped interest.
    Drop,
}

impl Decision {
    /// All decisions a human may submit, in card-button order.
    pub const ALL: [Decision; 3] = [Decision::DeepRead, Decision::Skim, Decision::Drop];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::DeepRead => "deep_read",
            Decision::Skim => "skim",
            Decision::Drop => "drop",
        }
    }

    /// Parse a decision value received from an external callback.
    ///
    /// Returns `None` for anything outside the enumerated set; callers turn
    /// that into a validation error without touching the run.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "deep_read" => Some(Decision::DeepRead),
            "skim" => Some(Decision::Skim),
            "drop" => Some(Decision::Drop),
            _ => None,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_id_is_deterministic_and_trimmed() {
        let a = RunId::derive("https://arxiv.org/abs/2401.00001");
        let b = RunId::derive("  https://arxiv.org/abs/2401.00001 ");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 16);
    }

    #[test]
    fn run_id_differs_per_source() {
        let a = RunId::derive("https://arxiv.org/abs/2401.00001");
        let b = RunId::derive("https://arxiv.org/abs/2401.00002");
        assert_ne!(a, b);
    }

    #[test]
    fn phase_encode_decode_roundtrip() {
        for phase in [
            Phase::Ingesting,
            Phase::Extracting,
            Phase::Triaging,
            Phase::WaitingDecision,
            Phase::Resuming,
            Phase::DeepReading,
            Phase::Completed,
            Phase::Failed,
        ] {
            assert_eq!(Phase::decode(phase.encode()), Some(phase));
        }
        assert_eq!(Phase::decode("unknown"), None);
    }

    #[test]
    fn phase_ranks_follow_graph_order() {
        assert!(Phase::Ingesting.rank() < Phase::Extracting.rank());
        assert!(Phase::Triaging.rank() < Phase::WaitingDecision.rank());
        assert!(Phase::Resuming.rank() < Phase::DeepReading.rank());
        assert!(Phase::DeepReading.rank() < Phase::Completed.rank());
        assert!(Phase::Failed.is_terminal());
        assert!(Phase::Completed.is_terminal());
        assert!(!Phase::WaitingDecision.is_terminal());
    }

    #[test]
    fn decision_parse_rejects_unknown_values() {
        assert_eq!(Decision::parse("deep_read"), Some(Decision::DeepRead));
        assert_eq!(Decision::parse(" skim "), Some(Decision::Skim));
        assert_eq!(Decision::parse("read_later"), None);
        assert_eq!(Decision::parse(""), None);
    }
}
