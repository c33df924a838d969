//! Concurrency guard behavior across tasks.

use std::sync::Arc;
use std::time::Duration;

use paperflow::guard::{ConcurrencyGuard, TriggerDedup};
use paperflow::types::RunId;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn only_one_task_holds_the_permit() {
    let guard = Arc::new(ConcurrencyGuard::new());
    let run_id = RunId::derive("paper-A");

    let mut handles = Vec::new();
    for _ in 0..8 {
        let guard = Arc::clone(&guard);
        let run_id = run_id.clone();
        handles.push(tokio::spawn(async move {
            match guard.admit(&run_id) {
                Ok(_permit) => {
                    // Hold the section long enough that the other tasks
                    // observably collide with it.
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    true
                }
                Err(_) => false,
            }
        }));
    }

    let mut admitted = 0;
    for handle in handles {
        if handle.await.expect("task") {
            admitted += 1;
        }
    }
    assert_eq!(admitted, 1, "exactly one concurrent admission succeeds");

    // All permits dropped: admission works again.
    assert!(guard.admit(&run_id).is_ok());
}

#[tokio::test]
async fn permit_release_is_immediate_on_drop() {
    let guard = ConcurrencyGuard::new();
    let run_id = RunId::derive("paper-B");

    for _ in 0..3 {
        let permit = guard.admit(&run_id).expect("admission");
        assert!(guard.admit(&run_id).is_err());
        drop(permit);
    }
}

#[tokio::test]
async fn guard_and_dedup_are_independent() {
    let guard = ConcurrencyGuard::new();
    let dedup = TriggerDedup::new();
    let run_id = RunId::derive("paper-C");

    // A recorded trigger does not block admission, and an open permit does
    // not mark triggers as duplicates.
    assert!(!dedup.is_duplicate_trigger(run_id.as_str()));
    let _permit = guard.admit(&run_id).expect("admission");
    assert!(!dedup.is_duplicate_trigger("some-other-message"));
    assert!(dedup.is_duplicate_trigger(run_id.as_str()));
}
