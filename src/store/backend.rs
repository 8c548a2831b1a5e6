//! Low-level key-value storage backend trait and supporting types.
//!
//! The [`StorageBackend`] trait defines the contract that all storage engines
//! implement: [`get`](StorageBackend::get), [`put`](StorageBackend::put),
//! [`put_if_version`](StorageBackend::put_if_version) and
//! [`delete`](StorageBackend::delete).
//!
//! Domain logic (state machine validation, duplicate suppression,
//! serialization) does **not** belong here. Backends are dumb KV stores;
//! domain logic lives in `GenericTaskStore`.
//!
//! # Key Structure
//!
//! Three key families share one namespace:
//!
//! - `task:{task_id}` - the serialized [`TaskRecord`](crate::domain::TaskRecord)
//! - `name:{task_name}` - name index, holds the owning task id
//! - `op:{operation_type}:{target_type}:{target_id}` - duplicate-suppression
//!   index, holds the id of the most recently submitted task for the triple
//!
//! Task ids are UUIDs, so `task:` keys never collide with caller input.
//! Index keys embed caller-supplied strings verbatim; lookups are exact
//! match, so embedded separators are harmless.
//!
//! # Versioning
//!
//! Each stored record carries a monotonic `u64` version starting at 1,
//! incremented on every successful write. [`put_if_version`](StorageBackend::put_if_version)
//! provides compare-and-swap (CAS) semantics for optimistic concurrency.

use std::fmt;

use async_trait::async_trait;

/// A stored record paired with its monotonic version number.
///
/// # Examples
///
/// ```
/// use bgtask::store::backend::VersionedRecord;
///
/// let record = VersionedRecord {
///     data: b"{}".to_vec(),
///     version: 1,
/// };
/// assert_eq!(record.version, 1);
/// ```
#[derive(Debug, Clone)]
pub struct VersionedRecord {
    /// The stored bytes (canonical JSON for task records, raw ids for
    /// index entries).
    pub data: Vec<u8>,

    /// Monotonic version number. Starts at 1, increments on each
    /// successful write.
    pub version: u64,
}

/// Errors that can occur during raw storage operations.
///
/// These are low-level errors from the storage backend. `GenericTaskStore`
/// maps them to domain-aware [`TaskError`](crate::error::TaskError) variants
/// before surfacing to callers.
///
/// # Examples
///
/// ```
/// use bgtask::store::backend::StorageError;
///
/// let err = StorageError::NotFound { key: "task:abc".to_string() };
/// assert!(err.to_string().contains("task:abc"));
/// ```
#[derive(Debug)]
pub enum StorageError {
    /// The requested key was not found in storage.
    NotFound {
        /// The key that was not found.
        key: String,
    },

    /// A [`put_if_version`](StorageBackend::put_if_version) call failed
    /// because the stored version does not match the expected version.
    VersionConflict {
        /// The key where the conflict occurred.
        key: String,
        /// The version the caller expected.
        expected: u64,
        /// The actual version found in storage.
        actual: u64,
    },

    /// An I/O or backend-specific error occurred.
    Backend {
        /// Human-readable description of the error.
        message: String,
        /// The underlying error, if available. Accessible via
        /// [`std::error::Error::source()`].
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { key } => write!(f, "key not found: {key}"),
            Self::VersionConflict {
                key,
                expected,
                actual,
            } => write!(
                f,
                "version conflict on key {key}: expected {expected}, found {actual}"
            ),
            Self::Backend { message, .. } => write!(f, "backend error: {message}"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Backend {
                source: Some(src), ..
            } => Some(src.as_ref()),
            _ => None,
        }
    }
}

/// Key for a task record.
pub fn task_key(task_id: &str) -> String {
    format!("task:{task_id}")
}

/// Key for the name index entry pointing at a task id.
pub fn name_key(task_name: &str) -> String {
    format!("name:{task_name}")
}

/// Key for the duplicate-suppression index entry of an operation triple.
pub fn operation_key(operation_type: &str, target_type: &str, target_id: i64) -> String {
    format!("op:{operation_type}:{target_type}:{target_id}")
}

/// Key-value storage backend for task persistence.
///
/// Implementations provide raw storage primitives. All domain logic lives
/// in `GenericTaskStore`, **not** in the backend.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to support concurrent access from
/// multiple request handlers.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Retrieves a record by key.
    ///
    /// # Errors
    ///
    /// - [`StorageError::NotFound`] if no record exists for the given key.
    /// - [`StorageError::Backend`] on I/O or backend-specific failures.
    async fn get(&self, key: &str) -> Result<VersionedRecord, StorageError>;

    /// Stores a record unconditionally (create or overwrite).
    ///
    /// For new keys, the backend assigns version 1. For existing keys, the
    /// backend increments the current version. Returns the assigned version.
    ///
    /// # Errors
    ///
    /// - [`StorageError::Backend`] on I/O or backend-specific failures.
    async fn put(&self, key: &str, data: &[u8]) -> Result<u64, StorageError>;

    /// Stores a record only if the current version matches `expected_version`.
    ///
    /// This is the compare-and-swap (CAS) primitive. On success the version
    /// is incremented and the new version returned.
    ///
    /// # Errors
    ///
    /// - [`StorageError::NotFound`] if no record exists for the given key.
    /// - [`StorageError::VersionConflict`] if the stored version does not
    ///   match `expected_version`.
    /// - [`StorageError::Backend`] on I/O or backend-specific failures.
    async fn put_if_version(
        &self,
        key: &str,
        data: &[u8],
        expected_version: u64,
    ) -> Result<u64, StorageError>;

    /// Deletes a record by key.
    ///
    /// Returns `true` if the key existed and was deleted, `false` if the
    /// key did not exist (idempotent delete).
    ///
    /// # Errors
    ///
    /// - [`StorageError::Backend`] on I/O or backend-specific failures.
    async fn delete(&self, key: &str) -> Result<bool, StorageError>;
}
