//! Shared keyed store: the single cross-instance source of truth.
//!
//! Rooms, session records, and round state all live behind [`SharedStore`],
//! a Redis-shaped interface with TTLs, versioned compare-and-swap values,
//! and atomic set/hash operations. In-process caches are never
//! authoritative; every coordinator reads and writes through this trait so
//! that multiple gateway instances observe the same state.
//!
//! Two operations carry the correctness-critical races of the quiz flow:
//!
//! - [`SharedStore::hash_set_nx`] is the single conditional insert that
//!   dedupes answer submissions per (participant, round).
//! - [`SharedStore::set_add`] returns the post-write cardinality together
//!   with the inserted flag, so round-completion detection is decided from
//!   the same atomic step that recorded the submission.

pub mod memory;

pub use memory::MemoryStore;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

/// Errors surfaced by [`SharedStore`] implementations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A versioned write lost against a concurrent writer.
    #[error("version mismatch at {key}")]
    VersionMismatch {
        /// Key whose stored version differed from the expected one.
        key: String,
    },

    /// The key holds a value of a different kind (e.g. a set where a list
    /// was expected).
    #[error("{key} holds a value that is not a {expected}")]
    WrongKind {
        /// Offending key.
        key: String,
        /// Kind the caller expected.
        expected: &'static str,
    },

    /// Payload (de)serialization failed.
    #[error("serde error: {0}")]
    Serde(String),

    /// Backend failure (connectivity, protocol).
    #[error("backend error: {0}")]
    Backend(String),
}

/// Convenience alias for store operation results.
pub type StoreResult<T> = Result<T, StoreError>;

/// A value together with its store-held CAS version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned {
    /// The stored payload.
    pub value: String,
    /// Monotonic version token; starts at 1 on first write.
    pub version: u64,
}

/// Outcome of [`SharedStore::set_add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetAdd {
    /// Whether the member was newly inserted.
    pub inserted: bool,
    /// Set cardinality immediately after the operation.
    pub len: u64,
}

/// Abstract keyed store with TTLs, CAS values, sets, lists, and hashes.
///
/// All operations are atomic with respect to other operations on the same
/// key. Passing `Some(ttl)` (re)arms the key's expiry, mirroring how the
/// callers refresh Redis TTLs on every touch; `None` leaves the current
/// expiry untouched.
#[async_trait]
pub trait SharedStore: Send + Sync + fmt::Debug {
    /// Reads a plain value.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on backend failure or when the key
    /// holds a value of a different kind.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Writes a plain value, resetting any CAS version history.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on backend failure or when the key
    /// holds a value of a different kind.
    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()>;

    /// Reads a value together with its CAS version.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on backend failure or when the key
    /// holds a value of a different kind.
    async fn get_versioned(&self, key: &str) -> StoreResult<Option<Versioned>>;

    /// Conditionally writes a value: succeeds only when the stored version
    /// equals `expected_version` (0 = the key must not exist). Returns the
    /// new version.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on backend failure or when the key
    /// holds a value of a different kind.
    async fn put_versioned(
        &self,
        key: &str,
        value: &str,
        expected_version: u64,
        ttl: Option<Duration>,
    ) -> StoreResult<u64>;

    /// Deletes a key of any kind. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on backend failure or when the key
    /// holds a value of a different kind.
    async fn remove(&self, key: &str) -> StoreResult<bool>;

    /// (Re)arms a key's TTL. Returns `false` if the key does not exist.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on backend failure or when the key
    /// holds a value of a different kind.
    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool>;

    /// Adds a member to a set, returning the inserted flag and the
    /// post-write cardinality in one atomic step.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on backend failure or when the key
    /// holds a value of a different kind.
    async fn set_add(&self, key: &str, member: &str, ttl: Option<Duration>)
    -> StoreResult<SetAdd>;

    /// Removes a member from a set. Returns whether it was present.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on backend failure or when the key
    /// holds a value of a different kind.
    async fn set_remove(&self, key: &str, member: &str) -> StoreResult<bool>;

    /// Returns whether a member is in the set.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on backend failure or when the key
    /// holds a value of a different kind.
    async fn set_contains(&self, key: &str, member: &str) -> StoreResult<bool>;

    /// Returns all members of the set (empty if the key is absent).
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on backend failure or when the key
    /// holds a value of a different kind.
    async fn set_members(&self, key: &str) -> StoreResult<Vec<String>>;

    /// Returns the set cardinality (0 if the key is absent).
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on backend failure or when the key
    /// holds a value of a different kind.
    async fn set_len(&self, key: &str) -> StoreResult<u64>;

    /// Appends to a list, returning the new length.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on backend failure or when the key
    /// holds a value of a different kind.
    async fn list_push(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<u64>;

    /// Reads a list element by 0-based index.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on backend failure or when the key
    /// holds a value of a different kind.
    async fn list_get(&self, key: &str, index: u64) -> StoreResult<Option<String>>;

    /// Returns the list length (0 if the key is absent).
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on backend failure or when the key
    /// holds a value of a different kind.
    async fn list_len(&self, key: &str) -> StoreResult<u64>;

    /// Sets a hash field unconditionally.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on backend failure or when the key
    /// holds a value of a different kind.
    async fn hash_set(
        &self,
        key: &str,
        field: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> StoreResult<()>;

    /// Sets a hash field only if it is absent: the atomic conditional
    /// insert. Returns whether the write happened.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on backend failure or when the key
    /// holds a value of a different kind.
    async fn hash_set_nx(
        &self,
        key: &str,
        field: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> StoreResult<bool>;

    /// Reads a hash field.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on backend failure or when the key
    /// holds a value of a different kind.
    async fn hash_get(&self, key: &str, field: &str) -> StoreResult<Option<String>>;

    /// Returns all (field, value) pairs of a hash (empty if absent).
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on backend failure or when the key
    /// holds a value of a different kind.
    async fn hash_entries(&self, key: &str) -> StoreResult<Vec<(String, String)>>;

    /// Removes a hash field. Returns whether it was present. Deletes the
    /// key entirely when the hash becomes empty.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on backend failure or when the key
    /// holds a value of a different kind.
    async fn hash_remove(&self, key: &str, field: &str) -> StoreResult<bool>;

    /// Returns the number of fields in a hash (0 if the key is absent).
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on backend failure or when the key
    /// holds a value of a different kind.
    async fn hash_len(&self, key: &str) -> StoreResult<u64>;

    /// Lists all live keys starting with `prefix`.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on backend failure or when the key
    /// holds a value of a different kind.
    async fn keys_with_prefix(&self, prefix: &str) -> StoreResult<Vec<String>>;
}
