//! Task record -- the persisted unit of deferred work.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::constants::RECORD_KIND;
use crate::domain::operation::OperationRecord;
use crate::types::response::{TaskResponse, TaskResult};
use crate::types::status::TaskState;

/// Persisted record of one unit of deferred work and its terminal outcome.
///
/// Created in `Pending` at submission, exclusively mutated by the submitter
/// and runner, read by API consumers polling status. `parameters`, `payload`
/// and `result` are opaque to the store.
///
/// All fields are public so that store implementors have full access.
///
/// # Construction
///
/// Use [`TaskRecord::new`] with an already-unique name (the submitter
/// prefixes the caller's base name with a generated UUID):
///
/// ```
/// use bgtask::{TaskRecord, TaskState};
/// use serde_json::Map;
///
/// let record = TaskRecord::new(
///     "3f1a-reindex".to_string(),
///     Map::new(),
///     None,
///     None,
///     "user-1".to_string(),
/// );
/// assert_eq!(record.status, TaskState::Pending);
/// assert!(!record.id.is_empty());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Unique record id (UUID v4).
    pub id: String,

    /// Unique task name: caller-supplied base name behind a generated
    /// uniqueness token, so retried submissions never collide.
    pub name: String,

    /// Current lifecycle state.
    pub status: TaskState,

    /// Arbitrary key-value parameters, opaque to the store.
    #[serde(default)]
    pub parameters: Map<String, Value>,

    /// Opaque payload blob.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Vec<u8>>,

    /// Captured outcome, set when the record reaches a terminal state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<TaskResult>,

    /// Operation marker for duplicate suppression, when the submission
    /// named an operation type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<OperationRecord>,

    /// Principal that submitted the task.
    pub created_by: String,

    /// ISO 8601 timestamp when the record was created.
    pub created_at: String,

    /// ISO 8601 timestamp when the record was last mutated.
    pub updated_at: String,

    /// Storage version for optimistic concurrency. Not serialized; the
    /// store sets it from the backend on every read and write.
    #[serde(skip)]
    pub version: u64,
}

impl TaskRecord {
    /// Creates a new record in the `Pending` state.
    ///
    /// Generates a `UUIDv4` id and sets both timestamps to the current
    /// UTC time.
    ///
    /// # Arguments
    ///
    /// * `name` - Unique task name (uniqueness token already applied).
    /// * `parameters` - Submission parameter bag.
    /// * `payload` - Opaque payload blob, if the submission carried one.
    /// * `operation` - Duplicate-suppression marker, if any.
    /// * `created_by` - Acting principal, for attribution.
    pub fn new(
        name: String,
        parameters: Map<String, Value>,
        payload: Option<Vec<u8>>,
        operation: Option<OperationRecord>,
        created_by: String,
    ) -> Self {
        let now = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);

        Self {
            id: Uuid::new_v4().to_string(),
            name,
            status: TaskState::Pending,
            parameters,
            payload,
            result: None,
            operation,
            created_by,
            created_at: now.clone(),
            updated_at: now,
            version: 0,
        }
    }

    /// The shape exposed on the status polling surface.
    ///
    /// # Examples
    ///
    /// ```
    /// use bgtask::TaskRecord;
    /// use serde_json::Map;
    ///
    /// let record = TaskRecord::new(
    ///     "9a2c-scan".to_string(),
    ///     Map::new(),
    ///     None,
    ///     None,
    ///     "user-1".to_string(),
    /// );
    /// let view = record.status_view();
    /// let json = serde_json::to_value(&view).unwrap();
    /// assert_eq!(json["status"], "Pending");
    /// assert_eq!(json["type"], "background_task");
    /// ```
    pub fn status_view(&self) -> TaskStatusView {
        TaskStatusView {
            id: self.id.clone(),
            status: self.status,
            kind: RECORD_KIND.to_string(),
        }
    }

    /// Reconstructs the captured response, or returns `default` when no
    /// result has been persisted yet.
    pub fn response_or(&self, default: TaskResponse) -> TaskResponse {
        match &self.result {
            Some(result) => result.to_response(),
            None => default,
        }
    }

    /// Canonical "task scheduled" response for the submission surface:
    /// a JSON string noting the unique task name, status 200.
    pub fn scheduled_response(&self) -> TaskResponse {
        let body = Value::String(format!("scheduled {}", self.name)).to_string();
        self.response_or(TaskResponse::json(body))
    }

    /// Parses the captured result content as JSON.
    ///
    /// Falls back to `{}` when no result exists or the content is not
    /// valid JSON; this never errors.
    pub fn get_content(&self) -> Value {
        match &self.result {
            Some(result) => result.content_json(),
            None => Value::Object(Map::new()),
        }
    }
}

/// Status polling shape: the only fields guaranteed externally visible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatusView {
    /// Record id.
    pub id: String,
    /// Current lifecycle state.
    pub status: TaskState,
    /// Record type tag.
    #[serde(rename = "type")]
    pub kind: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn record(name: &str) -> TaskRecord {
        TaskRecord::new(
            name.to_string(),
            Map::new(),
            None,
            None,
            "tester".to_string(),
        )
    }

    #[test]
    fn new_record_has_uuid_id() {
        let record = record("a-task");
        // UUID v4 format: 8-4-4-4-12 hex chars
        assert_eq!(record.id.len(), 36);
        assert!(record.id.contains('-'));
    }

    #[test]
    fn new_record_is_pending() {
        let record = record("a-task");
        assert_eq!(record.status, TaskState::Pending);
        assert!(record.result.is_none());
        assert!(record.operation.is_none());
    }

    #[test]
    fn new_record_timestamps_are_set() {
        let record = record("a-task");
        assert!(!record.created_at.is_empty());
        assert_eq!(record.created_at, record.updated_at);
    }

    #[test]
    fn status_view_shape() {
        let record = record("a-task");
        let view = record.status_view();
        assert_eq!(view.id, record.id);
        assert_eq!(view.status, TaskState::Pending);
        assert_eq!(view.kind, "background_task");
    }

    #[test]
    fn response_or_returns_default_without_result() {
        let record = record("a-task");
        let response = record.response_or(TaskResponse::retry_later("not yet"));
        assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn response_or_reconstructs_persisted_result() {
        let mut record = record("a-task");
        record.result = Some(TaskResult::from_plain("done"));
        let response = record.response_or(TaskResponse::retry_later("not yet"));
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.content, b"done");
    }

    #[test]
    fn scheduled_response_names_the_task() {
        let record = record("3f-scan");
        let response = record.scheduled_response();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.content_str(), "\"scheduled 3f-scan\"");
    }

    #[test]
    fn get_content_parses_json_result() {
        let mut record = record("a-task");
        record.result = Some(TaskResult::from_plain(r#"{"imported": 4}"#));
        assert_eq!(record.get_content(), json!({"imported": 4}));
    }

    #[test]
    fn get_content_falls_back_to_empty_object() {
        let mut record = record("a-task");
        assert_eq!(record.get_content(), json!({}));

        record.result = Some(TaskResult::from_plain("<traceback>"));
        assert_eq!(record.get_content(), json!({}));
    }

    #[test]
    fn version_is_not_serialized() {
        let mut record = record("a-task");
        record.version = 5;
        let value = serde_json::to_value(&record).unwrap();
        assert!(value.get("version").is_none());

        let parsed: TaskRecord = serde_json::from_value(value).unwrap();
        assert_eq!(parsed.version, 0);
    }
}
