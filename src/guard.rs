//! Per-run mutual exclusion and duplicate-trigger suppression.
//!
//! Two independent mechanisms guard the ingestion boundary:
//!
//! - [`ConcurrencyGuard`] admits at most one in-flight execution per run id.
//!   A second admission while the first permit is live is refused, not
//!   queued - the pipeline is short-running and callers (webhook deliveries)
//!   retry at the boundary instead of blocking.
//! - [`TriggerDedup`] records trigger fingerprints with a fixed 10-minute
//!   expiry to absorb repeated external deliveries of the same message. It
//!   is advisory and process-local; it softens duplicate-webhook bursts and
//!   provides no correctness guarantee.
//!
//! The guard prevents two *executions* of one run; the dedup table prevents
//! two *runs* from the same *external event*.

use miette::Diagnostic;
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::types::RunId;

/// Fixed lifetime of a suppression entry.
pub const DEDUP_TTL: Duration = Duration::from_secs(10 * 60);

/// Only sweep expired entries once the table has grown past this.
const DEDUP_PRUNE_THRESHOLD: usize = 1024;

/// Admission refused: another execution holds the run's permit.
#[derive(Debug, Error, Diagnostic)]
#[error("another execution is in flight for run {run_id}")]
#[diagnostic(
    code(paperflow::guard::refused),
    help("Retry after a short delay; permits are held only for the duration of a pipeline segment.")
)]
pub struct ConcurrencyRefused {
    pub run_id: RunId,
}

/// Exclusive section token for one run.
///
/// Dropping the permit releases the run for the next admission. Permits are
/// intentionally not clonable.
#[derive(Debug)]
pub struct RunPermit {
    run_id: RunId,
    in_flight: Arc<Mutex<FxHashSet<RunId>>>,
}

impl RunPermit {
    #[must_use]
    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }
}

impl Drop for RunPermit {
    fn drop(&mut self) {
        self.in_flight.lock().remove(&self.run_id);
    }
}

/// Per-run exclusive admission.
///
/// Cheap to clone; clones share the same in-flight table. The interface is a
/// plain map behind one mutex - enough for single-process deployment, and
/// narrow enough to swap in a distributed lock later without touching
/// callers.
#[derive(Clone, Debug, Default)]
pub struct ConcurrencyGuard {
    in_flight: Arc<Mutex<FxHashSet<RunId>>>,
}

impl ConcurrencyGuard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit an execution for `run_id`, or refuse if one is already open.
    pub fn admit(&self, run_id: &RunId) -> Result<RunPermit, ConcurrencyRefused> {
        let mut in_flight = self.in_flight.lock();
        if !in_flight.insert(run_id.clone()) {
            return Err(ConcurrencyRefused {
                run_id: run_id.clone(),
            });
        }
        Ok(RunPermit {
            run_id: run_id.clone(),
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    /// Whether an execution is currently admitted for `run_id`.
    #[must_use]
    pub fn is_in_flight(&self, run_id: &RunId) -> bool {
        self.in_flight.lock().contains(run_id)
    }
}

/// Time-bounded table of recently seen trigger fingerprints.
///
/// Entries live for [`DEDUP_TTL`] and exist only in process memory.
#[derive(Clone, Debug)]
pub struct TriggerDedup {
    seen: Arc<Mutex<FxHashMap<String, Instant>>>,
    ttl: Duration,
}

impl Default for TriggerDedup {
    fn default() -> Self {
        Self::with_ttl(DEDUP_TTL)
    }
}

impl TriggerDedup {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct with a custom TTL. Tests use short lifetimes.
    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            seen: Arc::new(Mutex::new(FxHashMap::default())),
            ttl,
        }
    }

    /// Check and atomically record a trigger fingerprint.
    ///
    /// Returns `true` when an identical trigger was admitted within the TTL
    /// (the caller should skip the delivery); `false` on first sight, which
    /// also records the fingerprint.
    pub fn is_duplicate_trigger(&self, dedup_key: &str) -> bool {
        let now = Instant::now();
        let mut seen = self.seen.lock();

        // Keep the sweep off the hot path until the table is actually large.
        if seen.len() > DEDUP_PRUNE_THRESHOLD {
            let ttl = self.ttl;
            seen.retain(|_, recorded| now.duration_since(*recorded) < ttl);
        }

        if let Some(recorded) = seen.get(dedup_key) {
            if now.duration_since(*recorded) < self.ttl {
                return true;
            }
        }
        seen.insert(dedup_key.to_string(), now);
        false
    }
}
