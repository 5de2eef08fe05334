//! Config schema types (store backend, session encoding).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrispyConfig {
    pub store: StoreConfig,
    pub sessions: SessionsConfig,
}

/// Which key-value store backs sessions and queues.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local; everything is lost on exit.
    Memory,
    Sqlite,
    #[default]
    Redis,
}

/// Store connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,

    /// Connection URL for the redis backend.
    pub redis_url: String,

    /// Database file for the sqlite backend.
    pub sqlite_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            redis_url: "redis://127.0.0.1:6379/0".into(),
            sqlite_path: PathBuf::from("crispy.db"),
        }
    }
}

/// Session record encoding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    /// Write absent `asid`/`filename` values as the literal `None`, as older
    /// deployments did. Reads accept both spellings either way.
    pub legacy_none_literal: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let cfg: CrispyConfig = toml::from_str(
            r#"
            [store]
            backend = "sqlite"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.store.backend, StoreBackend::Sqlite);
        assert_eq!(cfg.store.sqlite_path, PathBuf::from("crispy.db"));
        assert_eq!(cfg.store.redis_url, "redis://127.0.0.1:6379/0");
        assert!(!cfg.sessions.legacy_none_literal);
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        let res: Result<CrispyConfig, _> = toml::from_str("[store]\nbackend = \"etcd\"\n");
        assert!(res.is_err());
    }
}
