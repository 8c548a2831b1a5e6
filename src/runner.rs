//! Task execution.
//!
//! [`TaskRunner`] wraps a work function with the lifecycle bookkeeping the
//! queue side expects: resolve the record, mark it `Running`, run the work,
//! and land the outcome on the record in one terminal write.
//!
//! A failing work function does not surface as an error to the queue. The
//! failure is captured on the record and the runner responds with a benign
//! 200 so the queue does not retry a task whose outcome is already
//! recorded. Only store failures, where the bookkeeping itself breaks,
//! return `Err`.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use http::HeaderMap;

use crate::constants::TASK_NAME_HEADER;
use crate::domain::record::TaskRecord;
use crate::error::TaskError;
use crate::store::TaskStore;
use crate::types::response::{TaskResponse, TaskResult};
use crate::types::status::TaskState;

/// How a run identifies its record.
#[derive(Debug, Clone)]
pub enum TaskSource {
    /// The record itself, for in-process immediate execution.
    Record(TaskRecord),
    /// Inbound request headers; the record is resolved through the
    /// `x-task-name` header.
    Headers(HeaderMap),
}

/// Executes work functions against tracked records.
pub struct TaskRunner {
    store: Arc<dyn TaskStore>,
}

impl TaskRunner {
    /// Creates a runner over `store`.
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }

    /// Runs `work` for the record identified by `source`.
    ///
    /// When the record cannot be resolved the runner answers 503 without
    /// touching any state; the queue redelivers once the record's write
    /// has landed. Otherwise the record is marked `Running`, `work` runs,
    /// and the outcome is written in a single terminal update:
    ///
    /// * work returns `Ok(response)` - record finishes `Success` carrying
    ///   the response, which is returned as-is
    /// * work returns `Err` or panics - record finishes `Failure` carrying
    ///   the error trace, and a 200 `"failure"` response is returned
    ///
    /// `Err` from this method always means a store failure.
    pub async fn run<F, Fut>(
        &self,
        source: TaskSource,
        work: F,
    ) -> Result<TaskResponse, TaskError>
    where
        F: FnOnce(TaskRecord) -> Fut,
        Fut: Future<Output = anyhow::Result<TaskResponse>>,
    {
        let record = match self.resolve(source).await? {
            Some(record) => record,
            None => {
                return Ok(TaskResponse::retry_later(
                    "Background task not found. Retry later.",
                ))
            },
        };

        let record = self
            .store
            .update_state(&record.id, TaskState::Running)
            .await?;
        tracing::info!(task_id = %record.id, name = %record.name, "task started");

        match AssertUnwindSafe(work(record.clone())).catch_unwind().await {
            Ok(Ok(response)) => {
                self.store
                    .finish_with_result(
                        &record.id,
                        TaskState::Success,
                        TaskResult::from(&response),
                    )
                    .await?;
                tracing::info!(task_id = %record.id, "task succeeded");
                Ok(response)
            },
            Ok(Err(error)) => {
                tracing::error!(task_id = %record.id, error = %error, "task failed");
                self.fail(&record, format!("{error:?}")).await
            },
            Err(panic) => {
                let message = panic_message(panic);
                tracing::error!(task_id = %record.id, panic = %message, "task panicked");
                self.fail(&record, message).await
            },
        }
    }

    async fn resolve(&self, source: TaskSource) -> Result<Option<TaskRecord>, TaskError> {
        match source {
            TaskSource::Record(record) => Ok(Some(record)),
            TaskSource::Headers(headers) => {
                let name = headers
                    .get(TASK_NAME_HEADER)
                    .and_then(|value| value.to_str().ok());
                let Some(name) = name else {
                    return Ok(None);
                };
                match self.store.get_by_name(name).await {
                    Ok(record) => Ok(Some(record)),
                    Err(TaskError::NotFound { .. }) => Ok(None),
                    Err(e) => Err(e),
                }
            },
        }
    }

    async fn fail(&self, record: &TaskRecord, trace: String) -> Result<TaskResponse, TaskError> {
        self.store
            .finish_with_result(
                &record.id,
                TaskState::Failure,
                TaskResult::from_plain(trace),
            )
            .await?;
        // 200 so the queue does not redeliver a task whose outcome is
        // already recorded
        Ok(TaskResponse::html("failure"))
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "task panicked".to_string()
    }
}
