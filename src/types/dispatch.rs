//! Dispatch descriptor handed to a queue transport, and the header
//! filtering applied before anything is forwarded.

use http::{HeaderMap, HeaderName, Method};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// One unit of work as submitted to a queue transport.
///
/// Assembled by the queue adapter from the submission: the transport-unique
/// task name, an opaque target locator (URL or handler id, whatever the
/// bound transport understands), the parameter bag, an optional payload
/// blob, filtered headers, and the queue/retry selection.
#[derive(Debug, Clone)]
pub struct TaskDispatch {
    /// Transport-unique dispatch name.
    pub name: String,
    /// Opaque target locator the transport delivers to.
    pub work_ref: String,
    /// Delivery method.
    pub method: Method,
    /// Key-value parameters; tracked dispatches carry the task id here.
    pub parameters: Map<String, Value>,
    /// Opaque payload blob, when the dispatch carries one.
    pub payload: Option<Vec<u8>>,
    /// Headers to forward, already filtered through the denylist.
    pub headers: HeaderMap,
    /// Named queue to deliver on.
    pub queue: String,
    /// Retry policy for the transport.
    pub retry_options: RetryOptions,
}

/// Retry policy forwarded to the queue transport.
///
/// | Field | Default | Meaning |
/// |-------|---------|---------|
/// | `task_retry_limit` | `3` | Delivery attempts before the transport gives up |
/// | `min_backoff_seconds` | `1` | First retry delay |
/// | `max_backoff_seconds` | `3600` | Ceiling on the retry delay |
/// | `max_doublings` | `16` | Doublings applied before the delay grows linearly |
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryOptions {
    /// Delivery attempts before the transport gives up.
    pub task_retry_limit: u32,
    /// First retry delay in seconds.
    pub min_backoff_seconds: u64,
    /// Ceiling on the retry delay in seconds.
    pub max_backoff_seconds: u64,
    /// Doublings applied before the delay grows linearly.
    pub max_doublings: u32,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            task_retry_limit: 3,
            min_backoff_seconds: 1,
            max_backoff_seconds: 3600,
            max_doublings: 16,
        }
    }
}

impl RetryOptions {
    /// Sets the delivery attempt limit.
    pub fn with_task_retry_limit(mut self, limit: u32) -> Self {
        self.task_retry_limit = limit;
        self
    }

    /// Sets the backoff window in seconds.
    pub fn with_backoff_seconds(mut self, min: u64, max: u64) -> Self {
        self.min_backoff_seconds = min;
        self.max_backoff_seconds = max;
        self
    }
}

/// Headers the queue transport itself stamps onto delivered requests.
///
/// Dispatch headers start from the inbound request that triggered the
/// submission. If that request was itself a queue delivery, forwarding its
/// transport metadata into the new dispatch would spoof the transport's own
/// bookkeeping, so everything in this set is stripped first. The task-name
/// header is included because the adapter injects a fresh one per dispatch.
pub fn banned_dispatch_headers() -> HashSet<HeaderName> {
    let mut headers = HashSet::new();

    // Delivery metadata stamped by the transport
    headers.insert(HeaderName::from_static("x-appengine-taskname"));
    headers.insert(HeaderName::from_static("x-appengine-queuename"));
    headers.insert(HeaderName::from_static("x-appengine-tasketa"));
    headers.insert(HeaderName::from_static("x-appengine-taskexecutioncount"));
    headers.insert(HeaderName::from_static("x-appengine-taskretrycount"));

    // Routing metadata stamped by the hosting environment
    headers.insert(HeaderName::from_static("x-appengine-country"));
    headers.insert(HeaderName::from_static("x-appengine-current-namespace"));

    // Re-injected per dispatch
    headers.insert(HeaderName::from_static(crate::constants::TASK_NAME_HEADER));

    headers
}

/// Copies `inbound` minus everything in [`banned_dispatch_headers`].
///
/// Repeated values of a surviving header are all kept, in order.
pub fn collect_dispatch_headers(inbound: &HeaderMap) -> HeaderMap {
    let banned = banned_dispatch_headers();
    let mut filtered = HeaderMap::new();
    for (name, value) in inbound {
        if !banned.contains(name) {
            filtered.append(name.clone(), value.clone());
        }
    }
    filtered
}
