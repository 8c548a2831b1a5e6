//! Domain types: the persisted task record and its operation marker.

pub mod operation;
pub mod record;

pub use operation::OperationRecord;
pub use record::{TaskRecord, TaskStatusView};
