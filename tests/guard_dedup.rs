//! Duplicate-operation suppression scenarios.
//!
//! An operation triple `(operation_type, target_type, target_id)` may have
//! at most one live task. These tests drive the suppression through the
//! public submission API: rejection while a task is live, release on
//! terminal states, pass-through for unregistered types, and the parent
//! parameter contract.

use std::sync::Arc;

use bgtask::{
    InMemoryTaskStore, InProcessTransport, OperationGuard, QueueAdapter, SubmitOptions, TaskError,
    TaskResult, TaskState, TaskStore, TaskSubmitter,
};
use serde_json::{json, Map, Value};

/// Deferred stack with "Scan" registered as a guarded operation type.
fn scan_stack() -> (
    Arc<InMemoryTaskStore>,
    Arc<InProcessTransport>,
    TaskSubmitter,
) {
    let store = Arc::new(InMemoryTaskStore::new());
    let transport = Arc::new(InProcessTransport::new());
    let adapter = QueueAdapter::deferred(store.clone(), transport.clone());
    let submitter = TaskSubmitter::new(store.clone(), adapter)
        .with_guard(OperationGuard::new(store.clone()).with_types(["Scan"]));
    (store, transport, submitter)
}

fn parent_params(target_type: &str, target_id: i64) -> Map<String, Value> {
    let mut params = Map::new();
    params.insert(
        "parent".to_string(),
        json!({"type": target_type, "id": target_id}),
    );
    params
}

fn scan_options(target_id: i64) -> SubmitOptions {
    SubmitOptions::new("scan", "/tasks/scan")
        .with_parameters(parent_params("Audit", target_id))
        .with_operation_type("Scan")
}

// --------------------------------------------------------------------------
// Test 1: A live Scan on Audit 7 blocks a second Scan on Audit 7
// --------------------------------------------------------------------------

#[tokio::test]
async fn live_scan_blocks_duplicate_scan() {
    let (store, transport, submitter) = scan_stack();

    let first = submitter.submit(scan_options(7), None).await.unwrap();
    assert!(first.operation.is_some());
    transport.try_pop().unwrap();

    // Still blocked while Pending
    let err = submitter.submit(scan_options(7), None).await.unwrap_err();
    assert!(matches!(err, TaskError::DuplicateOperation { .. }));

    // And while Running
    store
        .update_state(&first.id, TaskState::Running)
        .await
        .unwrap();
    let err = submitter.submit(scan_options(7), None).await.unwrap_err();
    assert_eq!(err.to_string(), "task 'Scan' already run for Audit 7");

    // The rejections queued nothing
    assert!(transport.is_empty());
}

// --------------------------------------------------------------------------
// Test 2: A terminal Scan releases the triple for a fresh submission
// --------------------------------------------------------------------------

#[tokio::test]
async fn finished_scan_releases_the_triple() {
    let (store, transport, submitter) = scan_stack();

    let first = submitter.submit(scan_options(7), None).await.unwrap();
    transport.try_pop().unwrap();
    store
        .update_state(&first.id, TaskState::Running)
        .await
        .unwrap();
    store
        .finish_with_result(&first.id, TaskState::Success, TaskResult::from_plain("ok"))
        .await
        .unwrap();

    // A new scan record is created Pending, under a fresh unique name
    let second = submitter.submit(scan_options(7), None).await.unwrap();
    assert_eq!(second.status, TaskState::Pending);
    assert!(second.name.ends_with("_scan"));
    assert_ne!(second.id, first.id);
    assert!(second.operation.is_some());
}

// --------------------------------------------------------------------------
// Test 3: Different targets never block each other
// --------------------------------------------------------------------------

#[tokio::test]
async fn different_targets_are_independent() {
    let (_, _, submitter) = scan_stack();

    submitter.submit(scan_options(7), None).await.unwrap();
    let other = submitter.submit(scan_options(8), None).await.unwrap();
    assert_eq!(other.status, TaskState::Pending);
}

// --------------------------------------------------------------------------
// Test 4: Unregistered operation types run without suppression
// --------------------------------------------------------------------------

#[tokio::test]
async fn unregistered_type_never_blocks() {
    let (_, transport, submitter) = scan_stack();

    let options = || {
        SubmitOptions::new("reticulate", "/tasks/reticulate")
            .with_parameters(parent_params("Audit", 7))
            .with_operation_type("reticulate")
    };

    let first = submitter.submit(options(), None).await.unwrap();
    let second = submitter.submit(options(), None).await.unwrap();

    // Both went through, neither carries a marker
    assert!(first.operation.is_none());
    assert!(second.operation.is_none());
    assert_eq!(transport.len(), 2);
}

// --------------------------------------------------------------------------
// Test 5: Naming an operation type requires naming its target
// --------------------------------------------------------------------------

#[tokio::test]
async fn operation_type_without_parent_is_rejected() {
    let (_, transport, submitter) = scan_stack();

    // No parent at all
    let err = submitter
        .submit(
            SubmitOptions::new("scan", "/tasks/scan").with_operation_type("Scan"),
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, TaskError::InvalidParams { .. }));

    // Parent present but id is not an integer
    let mut params = Map::new();
    params.insert("parent".to_string(), json!({"type": "Audit", "id": "7"}));
    let err = submitter
        .submit(
            SubmitOptions::new("scan", "/tasks/scan")
                .with_parameters(params)
                .with_operation_type("Scan"),
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, TaskError::InvalidParams { .. }));

    assert!(transport.is_empty());
}

// --------------------------------------------------------------------------
// Test 6: Submissions without an operation type skip the guard entirely
// --------------------------------------------------------------------------

#[tokio::test]
async fn plain_submissions_need_no_parent() {
    let (_, _, submitter) = scan_stack();

    // Same base name, no operation type: duplicates are allowed
    submitter
        .submit(SubmitOptions::new("scan", "/tasks/scan"), None)
        .await
        .unwrap();
    let second = submitter
        .submit(SubmitOptions::new("scan", "/tasks/scan"), None)
        .await
        .unwrap();
    assert_eq!(second.status, TaskState::Pending);
    assert!(second.operation.is_none());
}
