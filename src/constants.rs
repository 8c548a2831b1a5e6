//! Constants shared across submission, dispatch and execution.

/// Header carrying the unique task name on a dispatched request.
///
/// The queue adapter injects this header on every tracked dispatch; the
/// task runner reads it back to resolve the owning record when the record
/// is not passed in directly.
pub const TASK_NAME_HEADER: &str = "x-task-name";

/// Dispatch parameter key carrying the task record id.
///
/// Every tracked dispatch carries exactly this one parameter; the work
/// function loads the record by id and reads the submission parameters
/// from it.
pub const TASK_ID_PARAM: &str = "task_id";

/// Type tag exposed on the status polling surface.
pub const RECORD_KIND: &str = "background_task";

/// Queue selected when neither the submission nor the adapter names one.
pub const DEFAULT_QUEUE: &str = "default";

/// Principal recorded when submission happens outside any request context.
pub const SYSTEM_PRINCIPAL: &str = "system";

/// Operation types that participate in duplicate suppression by default.
///
/// Submissions carrying any other `operation_type` still run; they simply
/// skip the suppression marker. Deployments register additional types on
/// the guard at construction.
pub const KNOWN_OPERATION_TYPES: &[&str] = &["import", "export"];
