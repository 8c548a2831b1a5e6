//! Task lifecycle states and the rules for moving between them.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::TaskError;

/// Lifecycle state of a [`TaskRecord`](crate::domain::TaskRecord).
///
/// States move one way only. Terminal states (`Success`, `Failure`) reject
/// all transitions, and nothing ever returns to `Pending`.
///
/// # State Machine
///
/// ```text
/// Pending -> Running, Failure
/// Running -> Success, Failure
/// Success -> (terminal, no transitions)
/// Failure -> (terminal, no transitions)
/// ```
///
/// `Pending -> Failure` covers a dispatch that is aborted before any work
/// runs (the queue transport rejected it). `Success` is only reachable from
/// `Running`: a task cannot succeed without a runner having started it.
///
/// # Examples
///
/// ```
/// use bgtask::TaskState;
///
/// let state = TaskState::Pending;
/// assert!(!state.is_terminal());
/// assert!(state.can_transition_to(&TaskState::Running));
/// assert!(!state.can_transition_to(&TaskState::Success)); // must run first
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskState {
    /// Created and persisted at submission; not yet picked up by a runner.
    Pending,
    /// A runner has committed to executing the work.
    Running,
    /// Work finished and its result is captured (terminal).
    Success,
    /// Work failed or dispatch was aborted; diagnostics captured (terminal).
    Failure,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TaskState {
    /// Canonical string form, identical to the persisted representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Running => "Running",
            Self::Success => "Success",
            Self::Failure => "Failure",
        }
    }

    /// Returns `true` once the record can no longer change state.
    ///
    /// # Examples
    ///
    /// ```
    /// use bgtask::TaskState;
    ///
    /// assert!(!TaskState::Pending.is_terminal());
    /// assert!(!TaskState::Running.is_terminal());
    /// assert!(TaskState::Success.is_terminal());
    /// assert!(TaskState::Failure.is_terminal());
    /// ```
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failure)
    }

    /// Returns `true` if transitioning from this state to `next` is legal.
    ///
    /// Legal transitions:
    /// - `Pending` -> `Running` (a runner picked the task up)
    /// - `Pending` -> `Failure` (dispatch aborted before any work ran)
    /// - `Running` -> `Success`, `Failure`
    ///
    /// Self-transitions and any move out of a terminal state are rejected.
    ///
    /// # Examples
    ///
    /// ```
    /// use bgtask::TaskState;
    ///
    /// assert!(TaskState::Pending.can_transition_to(&TaskState::Running));
    /// assert!(TaskState::Running.can_transition_to(&TaskState::Failure));
    /// assert!(!TaskState::Running.can_transition_to(&TaskState::Pending));
    /// assert!(!TaskState::Failure.can_transition_to(&TaskState::Running));
    /// ```
    pub fn can_transition_to(&self, next: &Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Pending, Self::Failure)
                | (Self::Running, Self::Success)
                | (Self::Running, Self::Failure)
        )
    }

    /// Validates a transition, returning a structured error when illegal.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::InvalidTransition`] carrying the task id and the
    /// offending state pair.
    ///
    /// # Examples
    ///
    /// ```
    /// use bgtask::TaskState;
    ///
    /// assert!(TaskState::Pending
    ///     .validate_transition("task-123", &TaskState::Running)
    ///     .is_ok());
    /// assert!(TaskState::Success
    ///     .validate_transition("task-123", &TaskState::Running)
    ///     .is_err());
    /// ```
    pub fn validate_transition(&self, task_id: &str, next: &Self) -> Result<(), TaskError> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(TaskError::InvalidTransition {
                task_id: task_id.to_string(),
                from: *self,
                to: *next,
            })
        }
    }
}
