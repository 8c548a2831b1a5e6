//! Generic task store with all domain logic delegating to a [`StorageBackend`].
//!
//! [`GenericTaskStore`] implements every domain operation (record creation
//! with its name and operation indexes, state machine transitions, atomic
//! finish-with-result, the duplicate-suppression probe, canonical JSON
//! serialization) on top of any [`StorageBackend`] implementation.
//!
//! Backends remain dumb key-value stores; all intelligence lives here.
//!
//! # CAS Semantics
//!
//! All mutations of an existing record use
//! [`StorageBackend::put_if_version`] for optimistic concurrency. A version
//! mismatch surfaces as [`TaskError::ConcurrentModification`]; a failed
//! commit is always an error, never silently swallowed.
//!
//! # Index Writes
//!
//! [`create`](GenericTaskStore::create) writes the record first and its
//! name/operation index entries after, so an index hit always resolves to a
//! stored record. The duplicate-suppression probe treats a dangling index
//! entry as not-running and removes it.

use serde_json::Value;

use crate::domain::record::TaskRecord;
use crate::error::TaskError;
use crate::store::backend::{
    name_key, operation_key, task_key, StorageBackend, StorageError,
};
use crate::store::{NewTask, StoreConfig};
use crate::types::response::TaskResult;
use crate::types::status::TaskState;

/// Generic task store that delegates all storage to a [`StorageBackend`].
///
/// All domain logic lives here: state machine validation, size limit
/// enforcement, CAS-based mutations, index maintenance, and canonical JSON
/// serialization at the storage boundary.
///
/// # Type Parameters
///
/// * `B` - A [`StorageBackend`] implementation (in-memory, SQL, Redis, etc.)
#[derive(Debug)]
pub struct GenericTaskStore<B: StorageBackend> {
    backend: B,
    config: StoreConfig,
}

impl<B: StorageBackend> GenericTaskStore<B> {
    /// Creates a new generic task store backed by the given backend, with
    /// `StoreConfig::default()`.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            config: StoreConfig::default(),
        }
    }

    /// Sets the storage configuration.
    pub fn with_config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// The active storage configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The underlying backend, for direct inspection in tests.
    #[cfg(test)]
    pub(crate) fn backend(&self) -> &B {
        &self.backend
    }

    // ---- Serialization helpers (private) ----

    fn serialize_record(record: &TaskRecord) -> Result<Vec<u8>, TaskError> {
        serde_json::to_vec(record)
            .map_err(|e| TaskError::Store(format!("failed to serialize TaskRecord: {e}")))
    }

    fn deserialize_record(data: &[u8]) -> Result<TaskRecord, TaskError> {
        serde_json::from_slice(data)
            .map_err(|e| TaskError::Store(format!("failed to deserialize TaskRecord: {e}")))
    }

    fn map_storage_error(err: StorageError, task: &str) -> TaskError {
        match err {
            StorageError::NotFound { .. } => TaskError::NotFound {
                task: task.to_string(),
            },
            StorageError::VersionConflict {
                expected, actual, ..
            } => TaskError::ConcurrentModification {
                task_id: task.to_string(),
                expected,
                actual,
            },
            StorageError::Backend { message, .. } => TaskError::Store(message),
        }
    }

    fn now() -> String {
        chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
    }

    // ---- Domain operations (public) ----

    /// Persists a new record in the `Pending` state.
    ///
    /// Enforces the parameter and payload size limits and name uniqueness,
    /// then writes the record, its name index entry, and (when an operation
    /// marker is present) its duplicate-suppression index entry.
    pub async fn create(&self, new_task: NewTask) -> Result<TaskRecord, TaskError> {
        let NewTask {
            name,
            parameters,
            payload,
            operation,
            created_by,
        } = new_task;

        let params_bytes = serde_json::to_vec(&Value::Object(parameters.clone()))
            .map_err(|e| TaskError::Store(format!("failed to serialize parameters: {e}")))?;
        if params_bytes.len() > self.config.max_parameter_size_bytes {
            return Err(TaskError::InvalidParams {
                reason: format!(
                    "parameters are {} bytes, limit is {}",
                    params_bytes.len(),
                    self.config.max_parameter_size_bytes
                ),
            });
        }
        if let Some(payload) = &payload {
            if payload.len() > self.config.max_payload_size_bytes {
                return Err(TaskError::InvalidParams {
                    reason: format!(
                        "payload is {} bytes, limit is {}",
                        payload.len(),
                        self.config.max_payload_size_bytes
                    ),
                });
            }
        }

        // Name uniqueness: the generated uuid prefix makes collisions
        // practically impossible, but a retried create must still fail
        // loudly instead of shadowing an existing record.
        let nkey = name_key(&name);
        match self.backend.get(&nkey).await {
            Ok(_) => {
                return Err(TaskError::Store(format!(
                    "task name '{name}' already exists"
                )))
            },
            Err(StorageError::NotFound { .. }) => {},
            Err(e) => return Err(Self::map_storage_error(e, &name)),
        }

        let mut record = TaskRecord::new(name, parameters, payload, operation, created_by);

        let key = task_key(&record.id);
        let bytes = Self::serialize_record(&record)?;
        let version = self
            .backend
            .put(&key, &bytes)
            .await
            .map_err(|e| Self::map_storage_error(e, &record.id))?;
        record.version = version;

        self.backend
            .put(&nkey, record.id.as_bytes())
            .await
            .map_err(|e| Self::map_storage_error(e, &record.id))?;

        if let Some(op) = &record.operation {
            let okey = operation_key(&op.operation_type, &op.target_type, op.target_id);
            self.backend
                .put(&okey, record.id.as_bytes())
                .await
                .map_err(|e| Self::map_storage_error(e, &record.id))?;
        }

        tracing::debug!(
            task_id = %record.id,
            name = %record.name,
            created_by = %record.created_by,
            "created background task record"
        );
        Ok(record)
    }

    /// Retrieves a record by id.
    pub async fn get(&self, task_id: &str) -> Result<TaskRecord, TaskError> {
        let key = task_key(task_id);
        let versioned = self
            .backend
            .get(&key)
            .await
            .map_err(|e| Self::map_storage_error(e, task_id))?;

        let mut record = Self::deserialize_record(&versioned.data)?;
        record.version = versioned.version;
        Ok(record)
    }

    /// Retrieves a record by its unique name, via the name index.
    pub async fn get_by_name(&self, name: &str) -> Result<TaskRecord, TaskError> {
        let nkey = name_key(name);
        let versioned = self
            .backend
            .get(&nkey)
            .await
            .map_err(|e| Self::map_storage_error(e, name))?;

        let task_id = String::from_utf8(versioned.data).map_err(|_| {
            TaskError::Store(format!("name index entry for '{name}' is not valid UTF-8"))
        })?;
        self.get(&task_id).await
    }

    /// Transitions a record to a new state with CAS-based atomicity.
    ///
    /// The state machine is validated first; an illegal transition is
    /// rejected without touching storage.
    pub async fn update_state(
        &self,
        task_id: &str,
        new_state: TaskState,
    ) -> Result<TaskRecord, TaskError> {
        let key = task_key(task_id);
        let versioned = self
            .backend
            .get(&key)
            .await
            .map_err(|e| Self::map_storage_error(e, task_id))?;

        let mut record = Self::deserialize_record(&versioned.data)?;
        record.version = versioned.version;

        record.status.validate_transition(task_id, &new_state)?;

        record.status = new_state;
        record.updated_at = Self::now();

        let bytes = Self::serialize_record(&record)?;
        let new_version = self
            .backend
            .put_if_version(&key, &bytes, versioned.version)
            .await
            .map_err(|e| Self::map_storage_error(e, task_id))?;
        record.version = new_version;

        Ok(record)
    }

    /// Stores a captured result without changing state.
    pub async fn set_result(&self, task_id: &str, result: TaskResult) -> Result<(), TaskError> {
        let key = task_key(task_id);
        let versioned = self
            .backend
            .get(&key)
            .await
            .map_err(|e| Self::map_storage_error(e, task_id))?;

        let mut record = Self::deserialize_record(&versioned.data)?;
        record.version = versioned.version;

        record.result = Some(result);
        record.updated_at = Self::now();

        let bytes = Self::serialize_record(&record)?;
        self.backend
            .put_if_version(&key, &bytes, versioned.version)
            .await
            .map_err(|e| Self::map_storage_error(e, task_id))?;

        Ok(())
    }

    /// Atomically transitions to a terminal state AND stores the result.
    ///
    /// Both the transition and the result land in a single CAS write, so a
    /// reader never observes a terminal record without its outcome.
    pub async fn finish_with_result(
        &self,
        task_id: &str,
        state: TaskState,
        result: TaskResult,
    ) -> Result<TaskRecord, TaskError> {
        if !state.is_terminal() {
            return Err(TaskError::InvalidParams {
                reason: format!("finish requires a terminal state, got {state}"),
            });
        }

        let key = task_key(task_id);
        let versioned = self
            .backend
            .get(&key)
            .await
            .map_err(|e| Self::map_storage_error(e, task_id))?;

        let mut record = Self::deserialize_record(&versioned.data)?;
        record.version = versioned.version;

        record.status.validate_transition(task_id, &state)?;

        record.status = state;
        record.result = Some(result);
        record.updated_at = Self::now();

        let bytes = Self::serialize_record(&record)?;
        let new_version = self
            .backend
            .put_if_version(&key, &bytes, versioned.version)
            .await
            .map_err(|e| Self::map_storage_error(e, task_id))?;
        record.version = new_version;

        Ok(record)
    }

    /// Reports whether a non-terminal record exists for the operation triple.
    ///
    /// Resolves the duplicate-suppression index entry to its record and
    /// checks both that the record still carries the same triple and that it
    /// has not reached a terminal state. A dangling or corrupt index entry
    /// is removed and reported as not-running.
    pub async fn operation_running(
        &self,
        operation_type: &str,
        target_type: &str,
        target_id: i64,
    ) -> Result<bool, TaskError> {
        let okey = operation_key(operation_type, target_type, target_id);
        let versioned = match self.backend.get(&okey).await {
            Ok(v) => v,
            Err(StorageError::NotFound { .. }) => return Ok(false),
            Err(e) => return Err(Self::map_storage_error(e, &okey)),
        };

        let task_id = match String::from_utf8(versioned.data) {
            Ok(id) => id,
            Err(_) => {
                self.remove_dangling(&okey).await;
                return Ok(false);
            },
        };

        match self.get(&task_id).await {
            Ok(record) => {
                let same_triple = record.operation.as_ref().is_some_and(|op| {
                    op.operation_type == operation_type
                        && op.target_type == target_type
                        && op.target_id == target_id
                });
                Ok(same_triple && !record.status.is_terminal())
            },
            Err(TaskError::NotFound { .. }) => {
                self.remove_dangling(&okey).await;
                Ok(false)
            },
            Err(e) => Err(e),
        }
    }

    async fn remove_dangling(&self, key: &str) {
        if let Err(err) = self.backend.delete(key).await {
            tracing::debug!(key = %key, error = %err, "failed to remove dangling index entry");
        }
    }
}
