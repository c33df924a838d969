/*!
Persistence primitives for serializing/deserializing run state.

Design goals:
- Serde-friendly struct decoupled from the in-memory representation.
- Conversion logic localized (From / TryFrom impls) so backend code stays
  lean and declarative.
- Forward compatibility: payload fields are additive, unknown keys
  round-trip untouched.

This module performs no I/O; it is pure data transformation glue shared by
every store backend.
*/

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::state::RunState;
use crate::types::{Phase, RunId};

use super::StoreError;

/// Complete persisted shape of one run record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistedRun {
    pub run_id: String,
    pub source_reference: String,
    /// Phase encoded via [`Phase::encode`].
    pub phase: String,
    #[serde(default)]
    pub payload: FxHashMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// RFC3339 save time; informational only, latest-wins needs no ordering.
    pub updated_at: DateTime<Utc>,
}

impl From<&RunState> for PersistedRun {
    fn from(state: &RunState) -> Self {
        PersistedRun {
            run_id: state.run_id.as_str().to_string(),
            source_reference: state.source_reference.clone(),
            phase: state.phase.encode().to_string(),
            payload: state.payload.clone(),
            error: state.error.clone(),
            updated_at: Utc::now(),
        }
    }
}

impl TryFrom<PersistedRun> for RunState {
    type Error = StoreError;

    fn try_from(p: PersistedRun) -> Result<Self, StoreError> {
        let phase = Phase::decode(&p.phase).ok_or_else(|| StoreError::Corrupt {
            run_id: p.run_id.clone(),
            message: format!("unknown phase {:?}", p.phase),
        })?;
        Ok(RunState {
            run_id: RunId::from_string(p.run_id),
            source_reference: p.source_reference,
            phase,
            payload: p.payload,
            error: p.error,
        })
    }
}

impl PersistedRun {
    pub fn to_json_string(&self) -> Result<String, StoreError> {
        serde_json::to_string(self).map_err(|e| StoreError::Serde { source: e })
    }

    pub fn from_json_str(s: &str) -> Result<Self, StoreError> {
        serde_json::from_str(s).map_err(|e| StoreError::Serde { source: e })
    }
}
