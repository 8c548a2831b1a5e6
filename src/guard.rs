//! Duplicate suppression for operations that must not run twice.
//!
//! An operation is identified by the triple `(operation_type, target_type,
//! target_id)`. While a task carrying that triple is still `Pending` or
//! `Running`, a second submission for the same triple is rejected; once the
//! task reaches a terminal state the triple is free again.
//!
//! Only registered operation types participate. An unregistered type never
//! blocks a submission, it just runs without a suppression marker.
//!
//! # Race Window
//!
//! The probe and the subsequent record creation are two separate store
//! calls, so two submissions racing on the same triple can both pass the
//! probe and both create records. Deployments that cannot tolerate the
//! window must serialize submissions per triple outside this crate.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::constants::KNOWN_OPERATION_TYPES;
use crate::domain::operation::OperationRecord;
use crate::error::TaskError;
use crate::store::TaskStore;

/// Guards operation triples against concurrent duplicate submissions.
pub struct OperationGuard {
    store: Arc<dyn TaskStore>,
    known_types: HashSet<String>,
}

impl OperationGuard {
    /// Creates a guard recognizing [`KNOWN_OPERATION_TYPES`].
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self {
            store,
            known_types: KNOWN_OPERATION_TYPES
                .iter()
                .map(|t| (*t).to_string())
                .collect(),
        }
    }

    /// Registers additional operation types.
    pub fn with_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known_types.extend(types.into_iter().map(Into::into));
        self
    }

    /// Whether the guard recognizes `operation_type`.
    pub fn knows(&self, operation_type: &str) -> bool {
        self.known_types.contains(operation_type)
    }

    /// Probes the store for a live task carrying the triple.
    pub async fn is_running(
        &self,
        operation_type: &str,
        target_type: &str,
        target_id: i64,
    ) -> Result<bool, TaskError> {
        self.store
            .operation_running(operation_type, target_type, target_id)
            .await
    }

    /// Builds the suppression marker for a submission, without probing.
    ///
    /// Returns `Ok(None)` for unregistered operation types. `parameters`
    /// must carry `parent.type` and `parent.id`; a submission that names an
    /// operation type without naming its target is malformed regardless of
    /// whether the type is registered.
    pub fn build(
        &self,
        operation_type: &str,
        parameters: &Map<String, Value>,
    ) -> Result<Option<OperationRecord>, TaskError> {
        let (target_type, target_id) = parent_target(parameters)?;
        if !self.knows(operation_type) {
            tracing::debug!(
                operation_type = %operation_type,
                "unregistered operation type, skipping suppression marker"
            );
            return Ok(None);
        }
        Ok(Some(OperationRecord::new(
            operation_type,
            target_type,
            target_id,
        )))
    }

    /// Probes for a duplicate, then builds the suppression marker.
    ///
    /// The submission path for any request naming an `operation_type`:
    /// rejects with [`TaskError::DuplicateOperation`] while a live task
    /// holds the triple, otherwise hands back the marker to persist with
    /// the new record (`None` for unregistered types).
    pub async fn check_and_build(
        &self,
        operation_type: &str,
        parameters: &Map<String, Value>,
    ) -> Result<Option<OperationRecord>, TaskError> {
        let (target_type, target_id) = parent_target(parameters)?;
        if self
            .is_running(operation_type, target_type, target_id)
            .await?
        {
            return Err(TaskError::DuplicateOperation {
                operation_type: operation_type.to_string(),
                target_type: target_type.to_string(),
                target_id,
            });
        }
        self.build(operation_type, parameters)
    }
}

/// Extracts `parent.type` and `parent.id` from submission parameters.
fn parent_target(parameters: &Map<String, Value>) -> Result<(&str, i64), TaskError> {
    let parent = parameters.get("parent");
    let target_type = parent
        .and_then(|p| p.get("type"))
        .and_then(Value::as_str);
    let target_id = parent.and_then(|p| p.get("id")).and_then(Value::as_i64);

    match (target_type, target_id) {
        (Some(target_type), Some(target_id)) => Ok((target_type, target_id)),
        _ => Err(TaskError::InvalidParams {
            reason: "parameters should contain parent.type and parent.id \
                     when operation_type is specified"
                .to_string(),
        }),
    }
}
