use std::{collections::HashMap, path::Path, str::FromStr, time::Duration};

use {
    async_trait::async_trait,
    sqlx::{
        SqlitePool,
        sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    },
    tracing::debug,
};

use crate::{KvStore, StoreError, StoreResult};

/// SQLite-backed store for single-node deployments.
///
/// Hash fields live in `kv_hash`, list items in `kv_list` ordered by an
/// autoincrement id. Popping is one `DELETE ... RETURNING` statement, so two
/// consumers never receive the same item. Writes fold the key type check into
/// the write statement itself, so a transaction never upgrades a read lock.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

/// How long a connection waits on another writer before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

fn tune(options: SqliteConnectOptions) -> SqliteConnectOptions {
    options
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT)
}

fn count(len: i64) -> StoreResult<usize> {
    usize::try_from(len).map_err(|e| StoreError::Backend(format!("bad list length {len}: {e}")))
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) the database file at `path` and ensure the
    /// schema exists.
    pub async fn open(path: &Path) -> StoreResult<Self> {
        let options = tune(SqliteConnectOptions::new().filename(path));
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        Self::init(&pool).await?;
        debug!(path = %path.display(), "opened sqlite store");
        Ok(Self::new(pool))
    }

    /// Connect using a sqlx URL such as `sqlite://crispy.db` or `sqlite::memory:`.
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let options = tune(SqliteConnectOptions::from_str(url)?);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        Self::init(&pool).await?;
        Ok(Self::new(pool))
    }

    /// Create the `kv_hash` and `kv_list` tables if they don't exist.
    pub async fn init(pool: &SqlitePool) -> StoreResult<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS kv_hash (
                key   TEXT NOT NULL,
                field TEXT NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (key, field)
            )"#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS kv_list (
                id    INTEGER PRIMARY KEY AUTOINCREMENT,
                key   TEXT NOT NULL,
                value TEXT NOT NULL
            )"#,
        )
        .execute(pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS kv_list_key ON kv_list (key, id)")
            .execute(pool)
            .await?;

        Ok(())
    }

    async fn is_list(&self, key: &str) -> StoreResult<bool> {
        let found: i64 = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM kv_list WHERE key = ?)")
            .bind(key)
            .fetch_one(&self.pool)
            .await?;
        Ok(found != 0)
    }

    async fn is_hash(&self, key: &str) -> StoreResult<bool> {
        let found: i64 = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM kv_hash WHERE key = ?)")
            .bind(key)
            .fetch_one(&self.pool)
            .await?;
        Ok(found != 0)
    }
}

#[async_trait]
impl KvStore for SqliteStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> StoreResult<()> {
        self.hset_multiple(key, &[(field, value.to_string())]).await
    }

    async fn hset_multiple(&self, key: &str, fields: &[(&str, String)]) -> StoreResult<()> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;

        for (field, value) in fields {
            let written = sqlx::query(
                r#"INSERT INTO kv_hash (key, field, value)
                   SELECT ?, ?, ? WHERE NOT EXISTS (SELECT 1 FROM kv_list WHERE key = ?)
                   ON CONFLICT(key, field) DO UPDATE SET value = excluded.value"#,
            )
            .bind(key)
            .bind(*field)
            .bind(value)
            .bind(key)
            .execute(&mut *tx)
            .await?
            .rows_affected();
            if written == 0 {
                return Err(StoreError::wrong_type(key));
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn hget(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        if self.is_list(key).await? {
            return Err(StoreError::wrong_type(key));
        }
        let value = sqlx::query_scalar::<_, String>(
            "SELECT value FROM kv_hash WHERE key = ? AND field = ?",
        )
        .bind(key)
        .bind(field)
        .fetch_optional(&self.pool)
        .await?;
        Ok(value)
    }

    async fn hgetall(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        if self.is_list(key).await? {
            return Err(StoreError::wrong_type(key));
        }
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT field, value FROM kv_hash WHERE key = ?")
                .bind(key)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().collect())
    }

    async fn hexists(&self, key: &str, field: &str) -> StoreResult<bool> {
        Ok(self.hget(key, field).await?.is_some())
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        Ok(self.is_hash(key).await? || self.is_list(key).await?)
    }

    async fn list_push(&self, key: &str, value: &str) -> StoreResult<usize> {
        let mut tx = self.pool.begin().await?;

        let written = sqlx::query(
            r#"INSERT INTO kv_list (key, value)
               SELECT ?, ? WHERE NOT EXISTS (SELECT 1 FROM kv_hash WHERE key = ?)"#,
        )
        .bind(key)
        .bind(value)
        .bind(key)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if written == 0 {
            return Err(StoreError::wrong_type(key));
        }
        let len: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM kv_list WHERE key = ?")
            .bind(key)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        count(len)
    }

    async fn list_pop(&self, key: &str) -> StoreResult<Option<String>> {
        if self.is_hash(key).await? {
            return Err(StoreError::wrong_type(key));
        }
        let value = sqlx::query_scalar::<_, String>(
            r#"DELETE FROM kv_list
               WHERE id = (SELECT MIN(id) FROM kv_list WHERE key = ?)
               RETURNING value"#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(value)
    }

    async fn list_len(&self, key: &str) -> StoreResult<usize> {
        if self.is_hash(key).await? {
            return Err(StoreError::wrong_type(key));
        }
        let len: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM kv_list WHERE key = ?")
            .bind(key)
            .fetch_one(&self.pool)
            .await?;
        count(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn sqlite_store() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(&dir.path().join("crispy.db"))
            .await
            .unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_sqlite_hash_fields() {
        let (_dir, store) = sqlite_store().await;

        store
            .hset_multiple("h", &[("a", "1".into()), ("b", "2".into())])
            .await
            .unwrap();
        store.hset("h", "a", "3").await.unwrap();

        assert!(store.exists("h").await.unwrap());
        assert!(!store.exists("nope").await.unwrap());
        assert!(store.hexists("h", "b").await.unwrap());
        assert_eq!(store.hget("h", "a").await.unwrap().as_deref(), Some("3"));
        assert_eq!(store.hget("h", "c").await.unwrap(), None);
        assert_eq!(store.hgetall("h").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_sqlite_list_fifo() {
        let (_dir, store) = sqlite_store().await;

        assert_eq!(store.list_push("l", "first").await.unwrap(), 1);
        assert_eq!(store.list_push("l", "second").await.unwrap(), 2);
        store.list_push("other", "elsewhere").await.unwrap();

        assert_eq!(store.list_len("l").await.unwrap(), 2);
        assert_eq!(store.list_pop("l").await.unwrap().as_deref(), Some("first"));
        assert_eq!(store.list_pop("l").await.unwrap().as_deref(), Some("second"));
        assert_eq!(store.list_pop("l").await.unwrap(), None);
        assert!(!store.exists("l").await.unwrap());
        assert_eq!(store.list_len("other").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_sqlite_wrong_type() {
        let (_dir, store) = sqlite_store().await;
        store.hset("h", "a", "1").await.unwrap();
        store.list_push("l", "x").await.unwrap();

        assert!(matches!(
            store.list_push("h", "x").await,
            Err(StoreError::WrongType { .. })
        ));
        assert!(matches!(
            store.hset("l", "a", "1").await,
            Err(StoreError::WrongType { .. })
        ));
        assert_eq!(store.list_len("l").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_sqlite_connect_url() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("url.db").display());
        let store = SqliteStore::connect(&url).await.unwrap();
        assert_eq!(store.backend(), "sqlite");
        store.list_push("l", "x").await.unwrap();
        assert_eq!(store.list_len("l").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_sqlite_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crispy.db");
        {
            let store = SqliteStore::open(&path).await.unwrap();
            store.hset("h", "state", "pending").await.unwrap();
            store.list_push("l", "ref").await.unwrap();
        }

        let store = SqliteStore::open(&path).await.unwrap();
        assert_eq!(
            store.hget("h", "state").await.unwrap().as_deref(),
            Some("pending")
        );
        assert_eq!(store.list_pop("l").await.unwrap().as_deref(), Some("ref"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_sqlite_concurrent_writers() {
        let (_dir, store) = sqlite_store().await;
        let store = std::sync::Arc::new(store);

        let mut tasks = Vec::new();
        for i in 0..32 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                let key = format!("crispy:session:{i:039}");
                for n in 0..10 {
                    store
                        .list_push("crispy:queue:test", &format!("{i}-{n}"))
                        .await
                        .unwrap();
                    store
                        .hset(&key, "last_changed", &n.to_string())
                        .await
                        .unwrap();
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(store.list_len("crispy:queue:test").await.unwrap(), 320);
        assert_eq!(
            store
                .hget(&format!("crispy:session:{:039}", 31), "last_changed")
                .await
                .unwrap()
                .as_deref(),
            Some("9")
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_sqlite_concurrent_pops_are_distinct() {
        let (_dir, store) = sqlite_store().await;
        let store = std::sync::Arc::new(store);
        for i in 0..50 {
            store.list_push("crispy:queue:test", &i.to_string()).await.unwrap();
        }

        let mut workers = Vec::new();
        for _ in 0..4 {
            let store = store.clone();
            workers.push(tokio::spawn(async move {
                let mut claimed = Vec::new();
                while let Some(item) = store.list_pop("crispy:queue:test").await.unwrap() {
                    claimed.push(item);
                }
                claimed
            }));
        }

        let mut all = Vec::new();
        for worker in workers {
            all.extend(worker.await.unwrap());
        }
        assert_eq!(all.len(), 50);
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 50);
        assert_eq!(store.list_len("crispy:queue:test").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sqlite_rejected_write_leaves_nothing_behind() {
        let (_dir, store) = sqlite_store().await;
        store.list_push("l", "x").await.unwrap();

        assert!(matches!(
            store
                .hset_multiple("l", &[("a", "1".into()), ("b", "2".into())])
                .await,
            Err(StoreError::WrongType { .. })
        ));
        let fields: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM kv_hash")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(fields, 0);
    }
}
