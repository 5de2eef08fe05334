use std::sync::Arc;

use {
    anyhow::{Context, Result},
    crispy_config::{CrispyConfig, StoreBackend},
    crispy_models::{SessionOptions, Sessions},
    crispy_store::{KvStore, MemoryStore, RedisStore, SqliteStore},
    tracing::info,
};

/// Connect to the store named in the config.
pub async fn open_store(config: &CrispyConfig) -> Result<Arc<dyn KvStore>> {
    let store = &config.store;
    let opened: Arc<dyn KvStore> = match store.backend {
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
        StoreBackend::Sqlite => Arc::new(
            SqliteStore::open(&store.sqlite_path)
                .await
                .with_context(|| format!("opening {}", store.sqlite_path.display()))?,
        ),
        StoreBackend::Redis => Arc::new(
            RedisStore::connect(&store.redis_url)
                .await
                .context("connecting to redis")?,
        ),
    };
    info!(backend = opened.backend(), "store ready");
    Ok(opened)
}

pub fn sessions(config: &CrispyConfig, store: Arc<dyn KvStore>) -> Sessions {
    Sessions::new(store).with_options(SessionOptions {
        legacy_none_literal: config.sessions.legacy_none_literal,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_sqlite_backend() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = CrispyConfig::default();
        config.store.backend = StoreBackend::Sqlite;
        config.store.sqlite_path = dir.path().join("crispy.db");

        let store = open_store(&config).await.unwrap();
        assert_eq!(store.backend(), "sqlite");
        assert!(config.store.sqlite_path.exists());
    }

    #[tokio::test]
    async fn test_sessions_honour_legacy_encoding() {
        let mut config = CrispyConfig::default();
        config.store.backend = StoreBackend::Memory;
        config.sessions.legacy_none_literal = true;

        let store = open_store(&config).await.unwrap();
        let session = sessions(&config, store.clone())
            .create_from(Some("testid"), None)
            .await
            .unwrap();
        assert_eq!(
            store
                .hget(session.key(), "filename")
                .await
                .unwrap()
                .as_deref(),
            Some("None")
        );
    }
}
