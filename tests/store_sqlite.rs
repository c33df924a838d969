//! SQLite state store: roundtrip, latest-wins replace, durability across
//! reconnects.

#![cfg(feature = "sqlite")]

use serde_json::json;

use paperflow::state::{keys, RunState};
use paperflow::store::{SqliteStateStore, StateStore};
use paperflow::types::{Phase, RunId};

fn waiting_state(source: &str) -> RunState {
    let mut state = RunState::new(RunId::derive(source), source);
    state.phase = Phase::WaitingDecision;
    state.set(keys::TITLE, json!("A Paper"));
    state.set(keys::TRIAGE_SUGGESTED_TAGS, json!(["Agent"]));
    state.set(keys::ARCHIVE_ITEM_ID, json!("item-1"));
    state
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn roundtrip_in_memory_db() {
    let store = SqliteStateStore::connect("sqlite::memory:")
        .await
        .expect("connect sqlite memory");

    let state = waiting_state("paper-A");
    store.save(&state).await.expect("save");

    let loaded = store
        .load(&state.run_id)
        .await
        .expect("load")
        .expect("state present");
    assert_eq!(loaded, state);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn save_replaces_whole_record() {
    let store = SqliteStateStore::connect("sqlite::memory:")
        .await
        .expect("connect");

    let mut state = waiting_state("paper-A");
    store.save(&state).await.expect("first save");

    state.phase = Phase::Completed;
    state.set(keys::HUMAN_DECISION, json!("skim"));
    store.save(&state).await.expect("second save");

    let loaded = store
        .load(&state.run_id)
        .await
        .expect("load")
        .expect("state present");
    assert_eq!(loaded.phase, Phase::Completed);
    assert_eq!(loaded.get_str(keys::HUMAN_DECISION), Some("skim"));
    assert_eq!(store.list_runs().await.expect("list").len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn load_nonexistent_is_none() {
    let store = SqliteStateStore::connect("sqlite::memory:")
        .await
        .expect("connect");
    let res = store.load(&RunId::derive("nope")).await.expect("load");
    assert!(res.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failed_run_keeps_error_text() {
    let store = SqliteStateStore::connect("sqlite::memory:")
        .await
        .expect("connect");

    let state = RunState::new(RunId::derive("paper-B"), "paper-B")
        .into_failed("ingest: source transport failure: connection refused");
    store.save(&state).await.expect("save");

    let loaded = store
        .load(&state.run_id)
        .await
        .expect("load")
        .expect("state present");
    assert_eq!(loaded.phase, Phase::Failed);
    assert!(loaded.error.expect("error").contains("connection refused"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn state_survives_reconnect_on_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("paperflow.db");
    let url = format!("sqlite://{}", db_path.display());

    let state = waiting_state("paper-C");
    {
        let store = SqliteStateStore::connect(&url).await.expect("connect");
        store.save(&state).await.expect("save");
    }

    // Fresh connection, same file: the suspended run is recoverable.
    let store = SqliteStateStore::connect(&url).await.expect("reconnect");
    let loaded = store
        .load(&state.run_id)
        .await
        .expect("load")
        .expect("state present");
    assert_eq!(loaded.phase, Phase::WaitingDecision);
    assert_eq!(loaded.get_str(keys::ARCHIVE_ITEM_ID), Some("item-1"));

    let mut runs = store.list_runs().await.expect("list");
    runs.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    assert_eq!(runs, vec![state.run_id.clone()]);
}
