//! Property-based state machine tests.
//!
//! Verifies the one-way lifecycle invariants under arbitrary inputs:
//! terminal states accept nothing, nothing returns to `Pending`, `Success`
//! is reachable only from `Running`, and the store enforces exactly the
//! rules the state type declares.

use proptest::prelude::*;
use serde_json::Map;

use bgtask::{InMemoryTaskStore, NewTask, TaskError, TaskState, TaskStore};

// ─── Arbitrary Strategies ───────────────────────────────────────────────────

fn arb_state() -> impl Strategy<Value = TaskState> {
    prop::sample::select(vec![
        TaskState::Pending,
        TaskState::Running,
        TaskState::Success,
        TaskState::Failure,
    ])
}

/// Every lifecycle path a record can walk from `Pending`, including the
/// empty one.
fn arb_valid_path() -> impl Strategy<Value = Vec<TaskState>> {
    prop::sample::select(vec![
        vec![],
        vec![TaskState::Running],
        vec![TaskState::Failure],
        vec![TaskState::Running, TaskState::Success],
        vec![TaskState::Running, TaskState::Failure],
    ])
}

/// A permitted path from `Pending` to `target`.
fn path_to(target: TaskState) -> Vec<TaskState> {
    match target {
        TaskState::Pending => vec![],
        TaskState::Running => vec![TaskState::Running],
        TaskState::Success => vec![TaskState::Running, TaskState::Success],
        TaskState::Failure => vec![TaskState::Failure],
    }
}

fn new_task(name: &str) -> NewTask {
    NewTask {
        name: name.to_string(),
        parameters: Map::new(),
        payload: None,
        operation: None,
        created_by: "prop-tester".to_string(),
    }
}

// ─── Property Tests: State Type Invariants ──────────────────────────────────

proptest! {
    /// Terminal states (Success, Failure) reject ALL transitions.
    #[test]
    fn terminal_states_reject_all_transitions(
        from in prop::sample::select(vec![TaskState::Success, TaskState::Failure]),
        to in arb_state(),
    ) {
        prop_assert!(!from.can_transition_to(&to));
    }

    /// No state ever transitions back to Pending.
    #[test]
    fn nothing_returns_to_pending(from in arb_state()) {
        prop_assert!(!from.can_transition_to(&TaskState::Pending));
    }

    /// Success is reachable from Running and nowhere else.
    #[test]
    fn success_only_from_running(from in arb_state()) {
        prop_assert_eq!(
            from.can_transition_to(&TaskState::Success),
            from == TaskState::Running
        );
    }

    /// No state transitions to itself.
    #[test]
    fn no_self_transitions(state in arb_state()) {
        prop_assert!(!state.can_transition_to(&state));
    }

    /// is_terminal() holds exactly when no transition out exists.
    #[test]
    fn is_terminal_iff_no_valid_transitions(state in arb_state()) {
        let all = [
            TaskState::Pending,
            TaskState::Running,
            TaskState::Success,
            TaskState::Failure,
        ];
        let has_any = all.iter().any(|to| state.can_transition_to(to));
        prop_assert_eq!(state.is_terminal(), !has_any);
    }

    /// States round-trip through serde_json without data loss.
    #[test]
    fn state_serde_round_trip(state in arb_state()) {
        let json = serde_json::to_value(state).unwrap();
        let back: TaskState = serde_json::from_value(json).unwrap();
        prop_assert_eq!(state, back);
    }

    /// Deserializing arbitrary strings as TaskState either succeeds with a
    /// valid variant or fails without panicking.
    #[test]
    fn fuzz_state_deserialization(s in "\\PC*") {
        let json_str = format!(
            "\"{}\"",
            s.replace('\\', "\\\\").replace('"', "\\\"")
        );
        // Must not panic -- Ok or Err are both fine
        let _ = serde_json::from_str::<TaskState>(&json_str);
    }
}

// ─── Property Tests: Store-level Invariants ─────────────────────────────────

proptest! {
    /// The store accepts exactly the transitions the state type declares,
    /// and a rejected transition leaves the record untouched.
    #[test]
    fn store_accepts_exactly_the_declared_transitions(
        from in arb_state(),
        to in arb_state(),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let store = InMemoryTaskStore::new();
            let record = store.create(new_task("prop_walk")).await.unwrap();

            for step in path_to(from) {
                let moved = store.update_state(&record.id, step).await;
                prop_assert!(moved.is_ok(), "setup transition to {step} failed");
            }

            let result = store.update_state(&record.id, to).await;
            prop_assert_eq!(result.is_ok(), from.can_transition_to(&to));

            if !from.can_transition_to(&to) {
                prop_assert!(
                    matches!(
                        result.unwrap_err(),
                        TaskError::InvalidTransition { .. }
                    ),
                    "expected TaskError::InvalidTransition"
                );
                let untouched = store.get(&record.id).await.unwrap();
                prop_assert_eq!(untouched.status, from);
            }

            Ok(())
        })?;
    }

    /// Along any permitted lifecycle path the version strictly increases
    /// and the stored state tracks the last applied transition.
    #[test]
    fn version_strictly_increases_along_valid_paths(path in arb_valid_path()) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let store = InMemoryTaskStore::new();
            let record = store.create(new_task("prop_version")).await.unwrap();

            let mut version = record.version;
            let mut state = TaskState::Pending;
            for step in path {
                let updated = store.update_state(&record.id, step).await.unwrap();
                prop_assert!(updated.version > version);
                version = updated.version;
                state = step;
            }

            let loaded = store.get(&record.id).await.unwrap();
            prop_assert_eq!(loaded.status, state);
            prop_assert_eq!(loaded.version, version);

            Ok(())
        })?;
    }

    /// Creating N records always produces unique ids and names resolve
    /// back to their own record.
    #[test]
    fn record_ids_always_unique(n in 1usize..30) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let store = InMemoryTaskStore::new();
            let mut ids = std::collections::HashSet::new();

            for i in 0..n {
                let record = store
                    .create(new_task(&format!("prop_unique_{i}")))
                    .await
                    .unwrap();
                prop_assert!(ids.insert(record.id.clone()), "duplicate id generated");

                let by_name = store.get_by_name(&record.name).await.unwrap();
                prop_assert_eq!(by_name.id, record.id);
            }

            Ok(())
        })?;
    }
}
