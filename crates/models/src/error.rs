use {crispy_store::StoreError, thiserror::Error};

use crate::keys::SessionId;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Caller supplied input the operation can't accept.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("no session with ID {0}")]
    NotFound(SessionId),

    /// Any failure of the underlying store, passed through untouched.
    #[error("session store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    /// Records are fully populated at creation; a missing field means the
    /// record was written by something else.
    #[error("{key} has no `{field}` field")]
    MissingField { key: String, field: &'static str },

    #[error("cannot decode `{field}` of {key}: {reason}")]
    Decode {
        key: String,
        field: &'static str,
        reason: String,
    },
}

impl Error {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}
