//! Error types for task submission, storage and execution.
//!
//! Guard and configuration errors are synchronous failures returned to the
//! submitting caller. Transport and work failures are absorbed at the queue
//! adapter / task runner boundary and converted into persisted record state;
//! they only appear here where a caller opted into the non-absorbing path
//! (fire-and-forget dispatch).

use http::StatusCode;
use thiserror::Error;

use crate::queue::TransportError;
use crate::types::TaskState;

/// Errors that can occur while submitting, storing or running a task.
#[derive(Error, Debug)]
pub enum TaskError {
    /// A non-terminal task already exists for the same operation and target
    #[error("task '{operation_type}' already run for {target_type} {target_id}")]
    DuplicateOperation {
        /// The duplicated operation type
        operation_type: String,
        /// Type of the target object
        target_type: String,
        /// Id of the target object
        target_id: i64,
    },

    /// Submission parameters are missing or malformed
    #[error("invalid submission: {reason}")]
    InvalidParams {
        /// Why the submission was rejected
        reason: String,
    },

    /// No execution path is available for a dispatch
    #[error("either a queued callback should be provided or a queue transport configured")]
    Configuration,

    /// No task record exists for the given id or name
    #[error("background task '{task}' not found")]
    NotFound {
        /// The id or name that failed to resolve
        task: String,
    },

    /// A lifecycle transition that the state machine forbids
    #[error("task {task_id}: illegal transition {from} -> {to}")]
    InvalidTransition {
        /// The task whose transition was rejected
        task_id: String,
        /// State the record was in
        from: TaskState,
        /// State the caller asked for
        to: TaskState,
    },

    /// Two writers raced on the same record
    #[error("task {task_id}: concurrent modification (expected version {expected}, found {actual})")]
    ConcurrentModification {
        /// The contended task
        task_id: String,
        /// Version the writer read
        expected: u64,
        /// Version the store holds
        actual: u64,
    },

    /// A deferred enqueue failed and the caller chose not to absorb it
    #[error("queue transport failure: {0}")]
    Transport(#[from] TransportError),

    /// The storage layer failed outside the cases above
    #[error("store error: {0}")]
    Store(String),
}

impl TaskError {
    /// HTTP-equivalent status for surfacing this error at a request boundary.
    ///
    /// Client mistakes (duplicate operations, malformed submissions) map to
    /// 400, missing records to 404, lost races to 409, and everything the
    /// caller cannot fix to 500-class codes.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::DuplicateOperation { .. } | Self::InvalidParams { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::ConcurrentModification { .. } => StatusCode::CONFLICT,
            Self::Transport(_) => StatusCode::BAD_GATEWAY,
            Self::Configuration | Self::InvalidTransition { .. } | Self::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_operation_message() {
        let err = TaskError::DuplicateOperation {
            operation_type: "Scan".to_string(),
            target_type: "Audit".to_string(),
            target_id: 7,
        };
        let msg = err.to_string();
        assert!(msg.contains("'Scan'"));
        assert!(msg.contains("Audit 7"));
        assert!(msg.contains("already run"));
    }

    #[test]
    fn test_invalid_transition_message() {
        let err = TaskError::InvalidTransition {
            task_id: "t-1".to_string(),
            from: TaskState::Success,
            to: TaskState::Running,
        };
        let msg = err.to_string();
        assert!(msg.contains("t-1"));
        assert!(msg.contains("Success"));
        assert!(msg.contains("Running"));
    }

    #[test]
    fn test_status_codes() {
        let dup = TaskError::DuplicateOperation {
            operation_type: "Scan".to_string(),
            target_type: "Audit".to_string(),
            target_id: 7,
        };
        assert_eq!(dup.status_code(), StatusCode::BAD_REQUEST);

        let missing = TaskError::NotFound {
            task: "t-404".to_string(),
        };
        assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);

        assert_eq!(
            TaskError::Configuration.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );

        let raced = TaskError::ConcurrentModification {
            task_id: "t-1".to_string(),
            expected: 1,
            actual: 2,
        };
        assert_eq!(raced.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TaskError>();
    }
}
