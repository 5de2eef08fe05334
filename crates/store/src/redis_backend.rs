use std::collections::HashMap;

use {
    async_trait::async_trait,
    redis::{AsyncCommands, RedisError, aio::MultiplexedConnection},
    tracing::debug,
};

use crate::{KvStore, StoreError, StoreResult};

/// Redis-backed store.
///
/// Lists are written with LPUSH and drained with RPOP, matching the layout
/// that existing CRISPy workers read.
#[derive(Clone)]
pub struct RedisStore {
    conn: MultiplexedConnection,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore").finish_non_exhaustive()
    }
}

impl RedisStore {
    pub fn new(conn: MultiplexedConnection) -> Self {
        Self { conn }
    }

    /// Connect to `redis://host:port/db`.
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        debug!("connected to redis");
        Ok(Self::new(conn))
    }

    fn conn(&self) -> MultiplexedConnection {
        self.conn.clone()
    }
}

fn map_err(key: &str, err: RedisError) -> StoreError {
    if err.code() == Some("WRONGTYPE") {
        StoreError::wrong_type(key)
    } else {
        StoreError::Redis(err)
    }
}

#[async_trait]
impl KvStore for RedisStore {
    fn backend(&self) -> &'static str {
        "redis"
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> StoreResult<()> {
        self.conn()
            .hset::<_, _, _, ()>(key, field, value)
            .await
            .map_err(|e| map_err(key, e))
    }

    async fn hset_multiple(&self, key: &str, fields: &[(&str, String)]) -> StoreResult<()> {
        if fields.is_empty() {
            return Ok(());
        }
        self.conn()
            .hset_multiple::<_, _, _, ()>(key, fields)
            .await
            .map_err(|e| map_err(key, e))
    }

    async fn hget(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        self.conn()
            .hget(key, field)
            .await
            .map_err(|e| map_err(key, e))
    }

    async fn hgetall(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        self.conn()
            .hgetall(key)
            .await
            .map_err(|e| map_err(key, e))
    }

    async fn hexists(&self, key: &str, field: &str) -> StoreResult<bool> {
        self.conn()
            .hexists(key, field)
            .await
            .map_err(|e| map_err(key, e))
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        self.conn()
            .exists(key)
            .await
            .map_err(|e| map_err(key, e))
    }

    async fn list_push(&self, key: &str, value: &str) -> StoreResult<usize> {
        self.conn()
            .lpush(key, value)
            .await
            .map_err(|e| map_err(key, e))
    }

    async fn list_pop(&self, key: &str) -> StoreResult<Option<String>> {
        self.conn()
            .rpop(key, None)
            .await
            .map_err(|e| map_err(key, e))
    }

    async fn list_len(&self, key: &str) -> StoreResult<usize> {
        self.conn()
            .llen(key)
            .await
            .map_err(|e| map_err(key, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Only runs against a live server named by `CRISPY_TEST_REDIS_URL`.
    async fn redis_store() -> Option<RedisStore> {
        let url = std::env::var("CRISPY_TEST_REDIS_URL").ok()?;
        Some(RedisStore::connect(&url).await.unwrap())
    }

    #[tokio::test]
    async fn test_redis_round_trip() {
        let Some(store) = redis_store().await else {
            return;
        };
        let hash = "crispy-test:store:hash";
        let list = "crispy-test:store:list";
        let mut conn = store.conn();
        let _: () = redis::cmd("DEL")
            .arg(hash)
            .arg(list)
            .query_async(&mut conn)
            .await
            .unwrap();

        store
            .hset_multiple(hash, &[("state", "pending".into()), ("from", "0".into())])
            .await
            .unwrap();
        assert_eq!(
            store.hget(hash, "state").await.unwrap().as_deref(),
            Some("pending")
        );
        assert!(store.exists(hash).await.unwrap());

        store.list_push(list, "a").await.unwrap();
        store.list_push(list, "b").await.unwrap();
        assert_eq!(store.list_len(list).await.unwrap(), 2);
        assert_eq!(store.list_pop(list).await.unwrap().as_deref(), Some("a"));
        assert_eq!(store.list_pop(list).await.unwrap().as_deref(), Some("b"));
        assert_eq!(store.list_pop(list).await.unwrap(), None);

        assert!(matches!(
            store.list_push(hash, "x").await,
            Err(StoreError::WrongType { .. })
        ));
    }
}
