//! Background task lifecycle, deduplication and queue dispatch for web
//! backends.
//!
//! This crate implements the task-tracking slice of a request/worker
//! architecture: an endpoint accepts a long-running request, records it as
//! a task, hands a dispatch to a queue, and answers immediately; a worker
//! later runs the work under the task's identity while clients poll the
//! record for its state and captured result.
//!
//! # Overview
//!
//! A task progresses through a one-way state machine
//! (`Pending` -> `Running` -> `Success`/`Failure`). Submissions that name
//! an operation type are deduplicated per target object: while a live task
//! holds the `(operation_type, target_type, target_id)` triple, a second
//! submission for the same triple is rejected. Worker failures never bounce
//! back into the queue; the failure trace is captured on the record and the
//! worker answers with a benign 200.
//!
//! # Module Organization
//!
//! - [`domain`] - `TaskRecord`, `OperationRecord` and the status view
//! - [`store`] - `TaskStore` trait, generic domain logic, in-memory backend
//! - [`guard`] - duplicate suppression for guarded operations
//! - [`queue`] - queue adapter, transport trait, in-process transport
//! - [`submit`] - the write-side entry point
//! - [`runner`] - worker-side execution with lifecycle bookkeeping
//! - [`notify`] - import/export job outcome notifications
//! - [`principal`] - request context and principal resolution
//! - [`types`] - states, responses, results, dispatches
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use bgtask::{
//!     InMemoryTaskStore, InProcessTransport, QueueAdapter, SubmitOptions,
//!     TaskResponse, TaskRunner, TaskSource, TaskStore, TaskSubmitter,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = Arc::new(InMemoryTaskStore::new());
//!     let transport = Arc::new(InProcessTransport::new());
//!     let adapter = QueueAdapter::deferred(store.clone(), transport.clone());
//!     let submitter = TaskSubmitter::new(store.clone(), adapter);
//!
//!     // Request side: record the task and hand it to the queue
//!     let record = submitter
//!         .submit(SubmitOptions::new("reindex", "/tasks/reindex"), None)
//!         .await?;
//!     println!("submitted {}", record.name);
//!
//!     // Worker side: drain the queue and run under the task's identity
//!     let dispatch = transport.pop().await;
//!     let runner = TaskRunner::new(store.clone());
//!     let response = runner
//!         .run(TaskSource::Headers(dispatch.headers.clone()), |task| async move {
//!             println!("running {}", task.name);
//!             Ok(TaskResponse::html("done"))
//!         })
//!         .await?;
//!     println!("worker answered {}", response.status);
//!
//!     // Clients poll the record
//!     let finished = store.get(&record.id).await?;
//!     println!("{:?}", finished.status_view());
//!     Ok(())
//! }
//! ```

pub mod constants;
pub mod domain;
pub mod error;
pub mod guard;
pub mod notify;
pub mod principal;
pub mod queue;
pub mod runner;
pub mod store;
pub mod submit;
pub mod types;

// Re-exports for ergonomic access
pub use domain::{OperationRecord, TaskRecord, TaskStatusView};
pub use error::TaskError;
pub use guard::OperationGuard;
pub use principal::RequestContext;
pub use queue::{
    InProcessTransport, QueueAdapter, QueueConfig, QueuedCallback, QueuedWork, QueueTransport,
    TransportError,
};
pub use runner::{TaskRunner, TaskSource};
pub use store::{
    GenericTaskStore, InMemoryBackend, InMemoryTaskStore, NewTask, StorageBackend, StoreConfig,
    TaskStore,
};
pub use submit::{SubmitOptions, TaskSubmitter};
pub use types::{RetryOptions, TaskDispatch, TaskResponse, TaskResult, TaskState};
