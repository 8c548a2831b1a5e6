//! Task submission.
//!
//! [`TaskSubmitter`] is the write-side entry point: it runs the duplicate
//! guard, persists the tracked record, and hands the dispatch to the
//! [`QueueAdapter`]. The dispatch deliberately carries only the record id;
//! workers load the record and read the submission parameters from it, so
//! large parameter sets never transit the queue.

use std::sync::Arc;

use http::{HeaderMap, Method};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::constants::TASK_ID_PARAM;
use crate::domain::record::TaskRecord;
use crate::error::TaskError;
use crate::guard::OperationGuard;
use crate::principal::RequestContext;
use crate::queue::{QueueAdapter, QueuedCallback};
use crate::store::{NewTask, TaskStore};
use crate::types::dispatch::{RetryOptions, TaskDispatch};

/// Everything a caller can say about a submission.
///
/// Only `name` and `work_ref` are required; the rest defaults.
#[derive(Debug, Clone)]
pub struct SubmitOptions {
    /// Human-readable base name; the submitter prefixes a UUID to make the
    /// stored name unique.
    pub name: String,
    /// Where the worker finds the work, e.g. a route like `/tasks/reindex`.
    pub work_ref: String,
    /// Request parameters preserved on the record for the worker.
    pub parameters: Map<String, Value>,
    /// HTTP method for the dispatch.
    pub method: Method,
    /// Operation type for duplicate suppression, when the submission
    /// guards one.
    pub operation_type: Option<String>,
    /// Opaque payload stored on the record.
    pub payload: Option<Vec<u8>>,
    /// Queue override; defaults from the adapter's [`QueueConfig`].
    ///
    /// [`QueueConfig`]: crate::queue::QueueConfig
    pub queue: Option<String>,
    /// Retry policy override; defaults from the adapter's config.
    pub retry_options: Option<RetryOptions>,
    /// Inbound request headers to forward, filtered through the dispatch
    /// denylist.
    pub headers: HeaderMap,
    /// Request context the record's `created_by` is resolved from.
    pub context: RequestContext,
}

impl SubmitOptions {
    /// Creates options with the required fields and all defaults.
    pub fn new(name: impl Into<String>, work_ref: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            work_ref: work_ref.into(),
            parameters: Map::new(),
            method: Method::POST,
            operation_type: None,
            payload: None,
            queue: None,
            retry_options: None,
            headers: HeaderMap::new(),
            context: RequestContext::default(),
        }
    }

    /// Sets the submission parameters.
    pub fn with_parameters(mut self, parameters: Map<String, Value>) -> Self {
        self.parameters = parameters;
        self
    }

    /// Sets the dispatch method.
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Names the operation type for duplicate suppression.
    pub fn with_operation_type(mut self, operation_type: impl Into<String>) -> Self {
        self.operation_type = Some(operation_type.into());
        self
    }

    /// Attaches an opaque payload.
    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Overrides the queue.
    pub fn with_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = Some(queue.into());
        self
    }

    /// Overrides the retry policy.
    pub fn with_retry_options(mut self, retry_options: RetryOptions) -> Self {
        self.retry_options = Some(retry_options);
        self
    }

    /// Forwards inbound request headers.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Sets the request context for attribution.
    pub fn with_context(mut self, context: RequestContext) -> Self {
        self.context = context;
        self
    }
}

/// Submits tracked background tasks.
pub struct TaskSubmitter {
    store: Arc<dyn TaskStore>,
    guard: OperationGuard,
    adapter: QueueAdapter,
}

impl TaskSubmitter {
    /// Creates a submitter with a default [`OperationGuard`] over `store`.
    pub fn new(store: Arc<dyn TaskStore>, adapter: QueueAdapter) -> Self {
        let guard = OperationGuard::new(store.clone());
        Self {
            store,
            guard,
            adapter,
        }
    }

    /// Replaces the guard, e.g. to register extra operation types.
    pub fn with_guard(mut self, guard: OperationGuard) -> Self {
        self.guard = guard;
        self
    }

    /// Submits a tracked task: guard, persist, dispatch.
    ///
    /// Returns the freshly re-read record, so callers observe the
    /// `Failure` marking when the transport rejected the dispatch. Guard
    /// rejections and configuration errors fail before any record is
    /// created.
    pub async fn submit(
        &self,
        options: SubmitOptions,
        callback: Option<QueuedCallback>,
    ) -> Result<TaskRecord, TaskError> {
        let operation = match &options.operation_type {
            Some(operation_type) => {
                self.guard
                    .check_and_build(operation_type, &options.parameters)
                    .await?
            },
            None => None,
        };

        // Fail before persisting when the dispatch has nowhere to go
        if !self.adapter.is_deferred() && callback.is_none() {
            return Err(TaskError::Configuration);
        }

        let unique_name = format!("{}_{}", Uuid::new_v4(), options.name);
        let record = self
            .store
            .create(NewTask {
                name: unique_name,
                parameters: options.parameters,
                payload: options.payload,
                operation,
                created_by: options.context.resolve(),
            })
            .await?;

        let mut dispatch_parameters = Map::new();
        dispatch_parameters.insert(
            TASK_ID_PARAM.to_string(),
            Value::String(record.id.clone()),
        );
        let dispatch = TaskDispatch {
            name: record.name.clone(),
            work_ref: options.work_ref,
            method: options.method,
            parameters: dispatch_parameters,
            payload: None,
            headers: options.headers,
            queue: options
                .queue
                .unwrap_or_else(|| self.adapter.config().default_queue.clone()),
            retry_options: options
                .retry_options
                .unwrap_or_else(|| self.adapter.config().retry_options.clone()),
        };

        self.adapter
            .enqueue(dispatch, Some(&record), callback)
            .await?;

        // Re-read to surface state changes made during dispatch, e.g. the
        // Failure marking after an absorbed transport rejection.
        self.store.get(&record.id).await
    }

    /// Submits untracked work with no backing record.
    ///
    /// See [`QueueAdapter::enqueue_fire_and_forget`].
    pub async fn submit_fire_and_forget(
        &self,
        name: &str,
        work_ref: &str,
        callback: Option<QueuedCallback>,
        parameters: Map<String, Value>,
        method: Option<Method>,
        headers: &HeaderMap,
    ) -> Result<(), TaskError> {
        self.adapter
            .enqueue_fire_and_forget(name, work_ref, callback, parameters, method, headers)
            .await
    }
}
