//! Key-value store collaborator for CRISPy records.
//!
//! The models layer only needs hash fields and lists with per-command
//! atomicity. [`KvStore`] captures exactly that surface; backends are an
//! in-memory map, SQLite and Redis.

pub mod error;
pub mod memory;
#[cfg(feature = "redis")]
pub mod redis_backend;
#[cfg(feature = "sqlite")]
pub mod sqlite;

use std::collections::HashMap;

use async_trait::async_trait;

pub use {
    error::{StoreError, StoreResult},
    memory::MemoryStore,
};

#[cfg(feature = "redis")]
pub use redis_backend::RedisStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

/// Hash and list primitives over string keys.
///
/// Every method is one atomic store command. Nothing here groups commands
/// into a transaction except [`KvStore::hset_multiple`], which writes all
/// given fields of one hash at once.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Short backend name for logs.
    fn backend(&self) -> &'static str;

    // ---- hashes ----
    async fn hset(&self, key: &str, field: &str, value: &str) -> StoreResult<()>;
    async fn hset_multiple(&self, key: &str, fields: &[(&str, String)]) -> StoreResult<()>;
    async fn hget(&self, key: &str, field: &str) -> StoreResult<Option<String>>;
    async fn hgetall(&self, key: &str) -> StoreResult<HashMap<String, String>>;
    async fn hexists(&self, key: &str, field: &str) -> StoreResult<bool>;

    // ---- keys ----
    async fn exists(&self, key: &str) -> StoreResult<bool>;

    // ---- lists ----
    /// Push onto the back of the list, returning the new length.
    async fn list_push(&self, key: &str, value: &str) -> StoreResult<usize>;
    /// Pop from the front of the list. `None` when empty or missing.
    async fn list_pop(&self, key: &str) -> StoreResult<Option<String>>;
    async fn list_len(&self, key: &str) -> StoreResult<usize>;
}
