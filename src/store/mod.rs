//! Durable state storage for runs.
//!
//! The store is the only shared mutable resource in the system: one record
//! per run id, replaced whole on every save (latest-wins), with atomic
//! replace semantics - a reader never observes a half-written state. Storage
//! failures surface as [`StoreError`] and are fatal to the operation that
//! triggered them; the run is left unmodified from the caller's perspective.
//!
//! Backends:
//! - [`InMemoryStateStore`] - volatile, for tests and development
//! - [`SqliteStateStore`](sqlite::SqliteStateStore) - durable SQLite storage
//!   (feature `sqlite`, default on)

pub mod persistence;
#[cfg(feature = "sqlite")]
pub mod sqlite;

use async_trait::async_trait;
use miette::Diagnostic;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::state::RunState;
use crate::types::RunId;

pub use persistence::PersistedRun;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStateStore;

/// Storage-layer failure. Callers treat this as fatal to the current
/// operation: without durable persistence the run's true status is unknown
/// and must not be assumed progressed.
#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("state serialization failed: {source}")]
    #[diagnostic(
        code(paperflow::store::serde),
        help("Ensure the persisted shape matches PersistedRun.")
    )]
    Serde {
        #[source]
        source: serde_json::Error,
    },

    #[error("storage backend error: {message}")]
    #[diagnostic(code(paperflow::store::backend))]
    Backend { message: String },

    #[error("corrupt persisted record for run {run_id}: {message}")]
    #[diagnostic(code(paperflow::store::corrupt))]
    Corrupt { run_id: String, message: String },
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Persists and retrieves a run's latest state, keyed by run id.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Durably persist the full state, replacing any prior value for this
    /// run id. A crash immediately after `save` returns leaves the new
    /// state recoverable.
    async fn save(&self, state: &RunState) -> Result<()>;

    /// Latest state for the run, or `None` if it was never persisted.
    async fn load(&self, run_id: &RunId) -> Result<Option<RunState>>;

    /// All persisted run ids, unordered.
    async fn list_runs(&self) -> Result<Vec<RunId>>;
}

/// Volatile store backed by a map. Save/load still round-trip through the
/// persisted model so tests exercise the same serialization path as the
/// SQLite backend.
#[derive(Clone, Debug, Default)]
pub struct InMemoryStateStore {
    runs: Arc<Mutex<FxHashMap<RunId, PersistedRun>>>,
}

impl InMemoryStateStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn save(&self, state: &RunState) -> Result<()> {
        let persisted = PersistedRun::from(state);
        self.runs.lock().insert(state.run_id.clone(), persisted);
        Ok(())
    }

    async fn load(&self, run_id: &RunId) -> Result<Option<RunState>> {
        match self.runs.lock().get(run_id).cloned() {
            Some(persisted) => Ok(Some(RunState::try_from(persisted)?)),
            None => Ok(None),
        }
    }

    async fn list_runs(&self) -> Result<Vec<RunId>> {
        Ok(self.runs.lock().keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::keys;
    use crate::types::Phase;
    use serde_json::json;

    #[tokio::test]
    async fn save_load_roundtrip() {
        let store = InMemoryStateStore::new();
        let run_id = RunId::derive("paper-A");
        let mut state = RunState::new(run_id.clone(), "paper-A");
        state.phase = Phase::WaitingDecision;
        state.set(keys::TITLE, json!("A Paper"));

        store.save(&state).await.unwrap();
        let loaded = store.load(&run_id).await.unwrap().expect("state present");
        assert_eq!(loaded, state);
    }

    #[tokio::test]
    async fn save_replaces_prior_value() {
        let store = InMemoryStateStore::new();
        let run_id = RunId::derive("paper-A");
        let mut state = RunState::new(run_id.clone(), "paper-A");
        store.save(&state).await.unwrap();

        state.phase = Phase::Completed;
        store.save(&state).await.unwrap();

        let loaded = store.load(&run_id).await.unwrap().expect("state present");
        assert_eq!(loaded.phase, Phase::Completed);
        assert_eq!(store.list_runs().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn load_absent_is_none() {
        let store = InMemoryStateStore::new();
        assert!(store.load(&RunId::derive("nope")).await.unwrap().is_none());
    }
}
