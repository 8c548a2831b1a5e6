//! Operation marker linking a task to the logical operation it performs.

use serde::{Deserialize, Serialize};

/// Marker tying a [`TaskRecord`](crate::domain::TaskRecord) to a logical
/// (operation-type, target) pair, used for duplicate suppression.
///
/// At most one per record, persisted together with it. An operation is
/// implicitly closed when its record turns terminal; the existence of a
/// non-terminal record for the triple is itself the duplicate signal, so
/// there is no explicit cleanup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationRecord {
    /// Logical operation tag, e.g. `"Scan"`.
    pub operation_type: String,
    /// Type of the object the operation works on.
    pub target_type: String,
    /// Id of the object the operation works on.
    pub target_id: i64,
}

impl OperationRecord {
    /// Builds a marker for the given operation and target.
    pub fn new(
        operation_type: impl Into<String>,
        target_type: impl Into<String>,
        target_id: i64,
    ) -> Self {
        Self {
            operation_type: operation_type.into(),
            target_type: target_type.into(),
            target_id,
        }
    }
}
