//! Task persistence layer.
//!
//! The store is split into three layers:
//!
//! 1. [`TaskStore`] - the trait the rest of the crate programs against
//! 2. [`GenericTaskStore`] - all domain logic (state machine, indexes,
//!    size limits, CAS) over any backend
//! 3. [`StorageBackend`] - a dumb versioned key-value interface
//!
//! New storage targets implement only [`StorageBackend`]; the blanket
//! `TaskStore` impl for `GenericTaskStore` gives them the full domain
//! behavior for free. [`InMemoryTaskStore`] is the bundled backend, suitable
//! for single-process deployments and tests.

pub mod backend;
pub mod generic;
pub mod memory;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::domain::operation::OperationRecord;
use crate::domain::record::TaskRecord;
use crate::error::TaskError;
use crate::types::response::TaskResult;
use crate::types::status::TaskState;

pub use backend::{StorageBackend, StorageError, VersionedRecord};
pub use generic::GenericTaskStore;
pub use memory::{InMemoryBackend, InMemoryTaskStore};

/// Storage configuration limits.
///
/// | Field | Default | Purpose |
/// |-------|---------|---------|
/// | `max_parameter_size_bytes` | 1 MiB | Cap on serialized request parameters |
/// | `max_payload_size_bytes` | 16 MiB | Cap on the opaque payload blob |
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Maximum serialized size of a record's parameter object, in bytes.
    pub max_parameter_size_bytes: usize,
    /// Maximum size of a record's raw payload, in bytes.
    pub max_payload_size_bytes: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_parameter_size_bytes: 1_048_576,
            max_payload_size_bytes: 16_777_216,
        }
    }
}

impl StoreConfig {
    /// Sets the maximum serialized parameter size in bytes.
    pub fn with_max_parameter_size_bytes(mut self, bytes: usize) -> Self {
        self.max_parameter_size_bytes = bytes;
        self
    }

    /// Sets the maximum payload size in bytes.
    pub fn with_max_payload_size_bytes(mut self, bytes: usize) -> Self {
        self.max_payload_size_bytes = bytes;
        self
    }
}

/// Input for [`TaskStore::create`].
///
/// The store assigns the id, timestamps, initial state and version; callers
/// provide everything else.
#[derive(Debug, Clone)]
pub struct NewTask {
    /// Unique task name, usually `"{uuid}_{base_name}"`.
    pub name: String,
    /// Request parameters preserved for the worker.
    pub parameters: Map<String, Value>,
    /// Opaque payload for workers that read raw bytes instead of parameters.
    pub payload: Option<Vec<u8>>,
    /// Duplicate-suppression marker, when the task guards an operation.
    pub operation: Option<OperationRecord>,
    /// Principal the task is attributed to.
    pub created_by: String,
}

/// Persistence operations for background task records.
///
/// Implementations must be safe to share across the submitter, the runner
/// and the status surface concurrently.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Persists a new record in the `Pending` state and returns it.
    async fn create(&self, new_task: NewTask) -> Result<TaskRecord, TaskError>;

    /// Retrieves a record by id.
    async fn get(&self, task_id: &str) -> Result<TaskRecord, TaskError>;

    /// Retrieves a record by its unique name.
    async fn get_by_name(&self, name: &str) -> Result<TaskRecord, TaskError>;

    /// Transitions a record to a new state, validating the state machine.
    async fn update_state(
        &self,
        task_id: &str,
        new_state: TaskState,
    ) -> Result<TaskRecord, TaskError>;

    /// Stores a captured result without changing state.
    async fn set_result(&self, task_id: &str, result: TaskResult) -> Result<(), TaskError>;

    /// Atomically transitions to a terminal state and stores the result.
    async fn finish_with_result(
        &self,
        task_id: &str,
        state: TaskState,
        result: TaskResult,
    ) -> Result<TaskRecord, TaskError>;

    /// Reports whether a non-terminal record exists for the operation triple.
    async fn operation_running(
        &self,
        operation_type: &str,
        target_type: &str,
        target_id: i64,
    ) -> Result<bool, TaskError>;

    /// The active storage configuration.
    fn config(&self) -> &StoreConfig;
}

#[async_trait]
impl<B: StorageBackend + 'static> TaskStore for GenericTaskStore<B> {
    async fn create(&self, new_task: NewTask) -> Result<TaskRecord, TaskError> {
        GenericTaskStore::create(self, new_task).await
    }

    async fn get(&self, task_id: &str) -> Result<TaskRecord, TaskError> {
        GenericTaskStore::get(self, task_id).await
    }

    async fn get_by_name(&self, name: &str) -> Result<TaskRecord, TaskError> {
        GenericTaskStore::get_by_name(self, name).await
    }

    async fn update_state(
        &self,
        task_id: &str,
        new_state: TaskState,
    ) -> Result<TaskRecord, TaskError> {
        GenericTaskStore::update_state(self, task_id, new_state).await
    }

    async fn set_result(&self, task_id: &str, result: TaskResult) -> Result<(), TaskError> {
        GenericTaskStore::set_result(self, task_id, result).await
    }

    async fn finish_with_result(
        &self,
        task_id: &str,
        state: TaskState,
        result: TaskResult,
    ) -> Result<TaskRecord, TaskError> {
        GenericTaskStore::finish_with_result(self, task_id, state, result).await
    }

    async fn operation_running(
        &self,
        operation_type: &str,
        target_type: &str,
        target_id: i64,
    ) -> Result<bool, TaskError> {
        GenericTaskStore::operation_running(self, operation_type, target_type, target_id).await
    }

    fn config(&self) -> &StoreConfig {
        GenericTaskStore::config(self)
    }
}
