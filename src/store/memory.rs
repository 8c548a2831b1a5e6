//! In-memory storage backend backed by [`DashMap`].
//!
//! Suitable for single-process deployments and tests. Records live only as
//! long as the process; nothing is persisted.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::domain::record::TaskRecord;
use crate::error::TaskError;
use crate::store::backend::{StorageBackend, StorageError, VersionedRecord};
use crate::store::generic::GenericTaskStore;
use crate::store::{NewTask, StoreConfig, TaskStore};
use crate::types::response::TaskResult;
use crate::types::status::TaskState;

/// Versioned in-memory key-value backend.
///
/// Each key maps to its bytes plus a monotonically increasing version,
/// starting at 1 on first write.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    data: DashMap<String, (Vec<u8>, u64)>,
}

impl InMemoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys, including index entries.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the backend holds no keys.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[async_trait]
impl StorageBackend for InMemoryBackend {
    async fn get(&self, key: &str) -> Result<VersionedRecord, StorageError> {
        match self.data.get(key) {
            Some(entry) => {
                let (data, version) = entry.value();
                Ok(VersionedRecord {
                    data: data.clone(),
                    version: *version,
                })
            },
            None => Err(StorageError::NotFound {
                key: key.to_string(),
            }),
        }
    }

    async fn put(&self, key: &str, data: &[u8]) -> Result<u64, StorageError> {
        let mut version = 1;
        self.data
            .entry(key.to_string())
            .and_modify(|(bytes, v)| {
                *bytes = data.to_vec();
                *v += 1;
                version = *v;
            })
            .or_insert_with(|| (data.to_vec(), 1));
        Ok(version)
    }

    async fn put_if_version(
        &self,
        key: &str,
        data: &[u8],
        expected_version: u64,
    ) -> Result<u64, StorageError> {
        match self.data.get_mut(key) {
            Some(mut entry) => {
                let (bytes, version) = entry.value_mut();
                if *version != expected_version {
                    return Err(StorageError::VersionConflict {
                        key: key.to_string(),
                        expected: expected_version,
                        actual: *version,
                    });
                }
                *bytes = data.to_vec();
                *version += 1;
                Ok(*version)
            },
            None => Err(StorageError::NotFound {
                key: key.to_string(),
            }),
        }
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.data.remove(key).is_some())
    }
}

/// In-memory task store: [`GenericTaskStore`] over [`InMemoryBackend`].
///
/// The convenience pairing used throughout the crate's tests and by
/// single-process servers.
#[derive(Debug)]
pub struct InMemoryTaskStore {
    inner: GenericTaskStore<InMemoryBackend>,
}

impl Default for InMemoryTaskStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTaskStore {
    /// Creates an empty store with default configuration.
    pub fn new() -> Self {
        Self {
            inner: GenericTaskStore::new(InMemoryBackend::new()),
        }
    }

    /// Creates an empty store with the given configuration.
    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            inner: GenericTaskStore::new(InMemoryBackend::new()).with_config(config),
        }
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn create(&self, new_task: NewTask) -> Result<TaskRecord, TaskError> {
        self.inner.create(new_task).await
    }

    async fn get(&self, task_id: &str) -> Result<TaskRecord, TaskError> {
        self.inner.get(task_id).await
    }

    async fn get_by_name(&self, name: &str) -> Result<TaskRecord, TaskError> {
        self.inner.get_by_name(name).await
    }

    async fn update_state(
        &self,
        task_id: &str,
        new_state: TaskState,
    ) -> Result<TaskRecord, TaskError> {
        self.inner.update_state(task_id, new_state).await
    }

    async fn set_result(&self, task_id: &str, result: TaskResult) -> Result<(), TaskError> {
        self.inner.set_result(task_id, result).await
    }

    async fn finish_with_result(
        &self,
        task_id: &str,
        state: TaskState,
        result: TaskResult,
    ) -> Result<TaskRecord, TaskError> {
        self.inner.finish_with_result(task_id, state, result).await
    }

    async fn operation_running(
        &self,
        operation_type: &str,
        target_type: &str,
        target_id: i64,
    ) -> Result<bool, TaskError> {
        self.inner
            .operation_running(operation_type, target_type, target_id)
            .await
    }

    fn config(&self) -> &StoreConfig {
        self.inner.config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::operation::OperationRecord;
    use pretty_assertions::assert_eq;

    // ---- backend tests ----

    #[tokio::test]
    async fn put_get_roundtrip() {
        let backend = InMemoryBackend::new();
        let version = backend.put("task:1", b"hello").await.unwrap();
        assert_eq!(version, 1);

        let record = backend.get("task:1").await.unwrap();
        assert_eq!(record.data, b"hello");
        assert_eq!(record.version, 1);
    }

    #[tokio::test]
    async fn put_bumps_version() {
        let backend = InMemoryBackend::new();
        assert_eq!(backend.put("k", b"a").await.unwrap(), 1);
        assert_eq!(backend.put("k", b"b").await.unwrap(), 2);
        assert_eq!(backend.get("k").await.unwrap().data, b"b");
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let backend = InMemoryBackend::new();
        assert!(matches!(
            backend.get("nope").await,
            Err(StorageError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn put_if_version_enforces_cas() {
        let backend = InMemoryBackend::new();
        backend.put("k", b"v1").await.unwrap();

        let v2 = backend.put_if_version("k", b"v2", 1).await.unwrap();
        assert_eq!(v2, 2);

        let err = backend.put_if_version("k", b"v3", 1).await.unwrap_err();
        assert!(matches!(
            err,
            StorageError::VersionConflict {
                expected: 1,
                actual: 2,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn put_if_version_missing_is_not_found() {
        let backend = InMemoryBackend::new();
        assert!(matches!(
            backend.put_if_version("nope", b"v", 1).await,
            Err(StorageError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn delete_reports_presence() {
        let backend = InMemoryBackend::new();
        backend.put("k", b"v").await.unwrap();
        assert!(backend.delete("k").await.unwrap());
        assert!(!backend.delete("k").await.unwrap());
        assert!(backend.is_empty());
    }

    // ---- store tests ----

    #[tokio::test]
    async fn store_roundtrip_through_trait() {
        let store = InMemoryTaskStore::new();
        let record = store
            .create(NewTask {
                name: "uuid_memory".to_string(),
                parameters: serde_json::Map::new(),
                payload: Some(b"bytes".to_vec()),
                operation: Some(OperationRecord::new("Import", "Person", 3)),
                created_by: "tester".to_string(),
            })
            .await
            .unwrap();

        let loaded = store.get_by_name("uuid_memory").await.unwrap();
        assert_eq!(loaded.id, record.id);
        assert_eq!(loaded.payload.as_deref(), Some(b"bytes".as_slice()));
        assert!(store.operation_running("Import", "Person", 3).await.unwrap());
    }

    #[tokio::test]
    async fn store_config_is_exposed() {
        let store = InMemoryTaskStore::with_config(
            StoreConfig::default().with_max_payload_size_bytes(10),
        );
        assert_eq!(store.config().max_payload_size_bytes, 10);
    }
}
