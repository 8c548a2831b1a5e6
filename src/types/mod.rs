//! Shared value types: lifecycle states, response capture, and the queue
//! dispatch descriptor.

pub mod dispatch;
pub mod response;
pub mod status;

pub use dispatch::{banned_dispatch_headers, collect_dispatch_headers, RetryOptions, TaskDispatch};
pub use response::{TaskResponse, TaskResult};
pub use status::TaskState;
