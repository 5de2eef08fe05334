use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

/// Failures reported by a [`crate::KvStore`] backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The key holds a different kind of value than the command expects.
    #[error("WRONGTYPE operation against key `{key}` holding the wrong kind of value")]
    WrongType { key: String },

    #[cfg(feature = "sqlite")]
    #[error("sqlite: {0}")]
    Sqlite(#[from] sqlx::Error),

    #[cfg(feature = "redis")]
    #[error("redis: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("{0}")]
    Backend(String),
}

impl StoreError {
    pub fn wrong_type(key: &str) -> Self {
        Self::WrongType {
            key: key.to_string(),
        }
    }
}
