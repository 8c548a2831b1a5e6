//! Queue dispatch layer.
//!
//! The [`QueueAdapter`] decides how a dispatch reaches its worker:
//!
//! * **Deferred** - a [`QueueTransport`] is configured; the dispatch is
//!   handed to the queue service and a worker picks it up later.
//! * **Immediate** - no transport, but the caller supplied a
//!   [`QueuedCallback`]; the work runs synchronously in the calling
//!   process.
//!
//! With neither configured, dispatch fails with
//! [`TaskError::Configuration`].
//!
//! Transport failures on a tracked dispatch are absorbed: the adapter logs
//! a warning, marks the owning record `Failure`, and reports success to the
//! submitter so the caller still receives its record. Untracked
//! fire-and-forget dispatches have no record to mark, so there transport
//! failures propagate.

pub mod memory;
pub mod transport;

use std::sync::Arc;

use http::{HeaderMap, HeaderValue, Method};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::constants::{DEFAULT_QUEUE, TASK_NAME_HEADER};
use crate::domain::record::TaskRecord;
use crate::error::TaskError;
use crate::store::TaskStore;
use crate::types::dispatch::{collect_dispatch_headers, RetryOptions, TaskDispatch};
use crate::types::status::TaskState;

pub use memory::InProcessTransport;
pub use transport::{QueueTransport, TransportError};

/// Queue defaults applied when a submission does not name its own.
///
/// | Field | Default | Purpose |
/// |-------|---------|---------|
/// | `default_queue` | `"default"` | Queue dispatches land on |
/// | `retry_options` | [`RetryOptions::default`] | Queue-side retry policy |
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Queue dispatches land on when the submission names none.
    pub default_queue: String,
    /// Retry policy attached to dispatches that carry none.
    pub retry_options: RetryOptions,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            default_queue: DEFAULT_QUEUE.to_string(),
            retry_options: RetryOptions::default(),
        }
    }
}

impl QueueConfig {
    /// Sets the default queue name.
    pub fn with_default_queue(mut self, queue: impl Into<String>) -> Self {
        self.default_queue = queue.into();
        self
    }

    /// Sets the default retry policy.
    pub fn with_retry_options(mut self, retry_options: RetryOptions) -> Self {
        self.retry_options = retry_options;
        self
    }
}

/// What an immediate callback receives.
#[derive(Debug, Clone)]
pub enum QueuedWork {
    /// The tracked record, for dispatches that own one.
    Record(TaskRecord),
    /// The raw parameters, for fire-and-forget dispatches.
    Parameters(Map<String, Value>),
}

/// Synchronous fallback invoked when no transport is configured.
pub type QueuedCallback = Box<dyn FnOnce(QueuedWork) + Send>;

/// Routes dispatches to a transport or a synchronous callback.
pub struct QueueAdapter {
    store: Arc<dyn TaskStore>,
    transport: Option<Arc<dyn QueueTransport>>,
    config: QueueConfig,
}

impl QueueAdapter {
    /// Creates an adapter that defers dispatches to `transport`.
    pub fn deferred(store: Arc<dyn TaskStore>, transport: Arc<dyn QueueTransport>) -> Self {
        Self {
            store,
            transport: Some(transport),
            config: QueueConfig::default(),
        }
    }

    /// Creates an adapter with no transport.
    ///
    /// Dispatches run through their [`QueuedCallback`]; a dispatch without
    /// one fails with [`TaskError::Configuration`].
    pub fn immediate(store: Arc<dyn TaskStore>) -> Self {
        Self {
            store,
            transport: None,
            config: QueueConfig::default(),
        }
    }

    /// Sets the queue defaults.
    pub fn with_config(mut self, config: QueueConfig) -> Self {
        self.config = config;
        self
    }

    /// The active queue defaults.
    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Whether a transport is configured.
    ///
    /// Without one, every dispatch needs a [`QueuedCallback`] to have
    /// anywhere to go.
    pub fn is_deferred(&self) -> bool {
        self.transport.is_some()
    }

    /// Dispatches work, deferred through the transport when one is
    /// configured, otherwise through `callback`.
    ///
    /// `task` is the tracked record for this dispatch, when one exists. On
    /// the deferred path its name rides along as the `x-task-name` header,
    /// and a transport failure marks it `Failure` instead of surfacing an
    /// error. On the immediate path the callback receives the record
    /// itself, or the dispatch parameters when there is no record.
    pub async fn enqueue(
        &self,
        mut dispatch: TaskDispatch,
        task: Option<&TaskRecord>,
        callback: Option<QueuedCallback>,
    ) -> Result<(), TaskError> {
        if let Some(transport) = &self.transport {
            dispatch.headers = collect_dispatch_headers(&dispatch.headers);
            if let Some(task) = task {
                let value = HeaderValue::from_str(&task.name).map_err(|_| {
                    TaskError::InvalidParams {
                        reason: format!("task name '{}' is not a valid header value", task.name),
                    }
                })?;
                dispatch.headers.insert(TASK_NAME_HEADER, value);
            }

            let name = dispatch.name.clone();
            if let Err(err) = transport.enqueue(dispatch).await {
                tracing::warn!(name = %name, error = %err, "transport rejected dispatch");
                if let Some(task) = task {
                    if let Err(mark_err) =
                        self.store.update_state(&task.id, TaskState::Failure).await
                    {
                        tracing::warn!(
                            task_id = %task.id,
                            error = %mark_err,
                            "failed to mark task after transport rejection"
                        );
                    }
                }
            }
            return Ok(());
        }

        if let Some(callback) = callback {
            match task {
                Some(task) => callback(QueuedWork::Record(task.clone())),
                None => callback(QueuedWork::Parameters(dispatch.parameters)),
            }
            return Ok(());
        }

        Err(TaskError::Configuration)
    }

    /// Dispatches untracked work with no backing record.
    ///
    /// The dispatch name is made unique as `"{name}{unix_secs}_{uuid}"` and
    /// the parameters travel as a JSON payload. Without a record there is
    /// nothing to mark on failure, so transport errors propagate to the
    /// caller.
    pub async fn enqueue_fire_and_forget(
        &self,
        name: &str,
        work_ref: &str,
        callback: Option<QueuedCallback>,
        parameters: Map<String, Value>,
        method: Option<Method>,
        headers: &HeaderMap,
    ) -> Result<(), TaskError> {
        if let Some(transport) = &self.transport {
            let payload = serde_json::to_vec(&parameters)
                .map_err(|e| TaskError::Store(format!("failed to serialize parameters: {e}")))?;
            let dispatch = TaskDispatch {
                name: format!(
                    "{}{}_{}",
                    name,
                    chrono::Utc::now().timestamp(),
                    Uuid::new_v4()
                ),
                work_ref: work_ref.to_string(),
                method: method.unwrap_or(Method::POST),
                parameters: Map::new(),
                payload: Some(payload),
                headers: collect_dispatch_headers(headers),
                queue: self.config.default_queue.clone(),
                retry_options: self.config.retry_options.clone(),
            };
            transport.enqueue(dispatch).await?;
            return Ok(());
        }

        if let Some(callback) = callback {
            callback(QueuedWork::Parameters(parameters));
            return Ok(());
        }

        Err(TaskError::Configuration)
    }
}
