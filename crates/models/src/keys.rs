//! Store key namespace.
//!
//! Session records: `crispy:session:<39-digit zero-padded id>`.
//! Queues: `crispy:queue:<jobtype>`.

use std::{fmt, str::FromStr};

use serde::{Serialize, Serializer};

use crate::error::{Error, Result};

pub const NAMESPACE: &str = "crispy";

const SESSION_PREFIX: &str = "crispy:session:";

/// Width of `u128::MAX` in decimal.
pub const SESSION_ID_WIDTH: usize = 39;

/// 128-bit session identifier. Displays as a fixed-width decimal string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u128);

impl SessionId {
    /// Store key of the session record.
    pub fn key(&self) -> String {
        format!("{SESSION_PREFIX}{self}")
    }

    /// Parse the identifier back out of a session store key, as handed out
    /// by [`crate::Queue::next`].
    pub fn from_key(key: &str) -> Result<Self> {
        let digits = key
            .strip_prefix(SESSION_PREFIX)
            .ok_or_else(|| Error::invalid(format!("`{key}` is not a session key")))?;
        digits.parse()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:0width$}", self.0, width = SESSION_ID_WIDTH)
    }
}

impl FromStr for SessionId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::invalid(format!("`{s}` is not a session ID")));
        }
        s.parse::<u128>()
            .map(Self)
            .map_err(|e| Error::invalid(format!("`{s}` is not a session ID: {e}")))
    }
}

impl From<u128> for SessionId {
    fn from(id: u128) -> Self {
        Self(id)
    }
}

impl Serialize for SessionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Store key of the queue for `jobtype`.
pub fn queue_key(jobtype: &str) -> String {
    format!("{NAMESPACE}:queue:{jobtype}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_zero_padded() {
        assert_eq!(
            SessionId(0).key(),
            "crispy:session:000000000000000000000000000000000000000"
        );
        assert_eq!(
            SessionId(123456789).key(),
            "crispy:session:000000000000000000000000000000123456789"
        );
    }

    #[test]
    fn test_width_is_fixed_across_range() {
        for id in [0, 1, 10u128.pow(20), u128::MAX / 3, u128::MAX] {
            let rendered = SessionId(id).to_string();
            assert_eq!(rendered.len(), SESSION_ID_WIDTH);
            assert_eq!(rendered.parse::<u128>().unwrap(), id);
        }
        assert_eq!(
            SessionId(u128::MAX).to_string(),
            "340282366920938463463374607431768211455"
        );
    }

    #[test]
    fn test_from_key() {
        let id = SessionId(987654321);
        assert_eq!(SessionId::from_key(&id.key()).unwrap(), id);
        assert!(SessionId::from_key("crispy:queue:test").is_err());
        assert!(SessionId::from_key("crispy:session:").is_err());
        assert!(SessionId::from_key("crispy:session:-12").is_err());
        assert!(SessionId::from_key("crispy:session:99999999999999999999999999999999999999999").is_err());
    }

    #[test]
    fn test_queue_key() {
        assert_eq!(queue_key("test"), "crispy:queue:test");
    }

    #[test]
    fn test_serializes_as_padded_string() {
        let json = serde_json::to_string(&SessionId(42)).unwrap();
        assert_eq!(json, "\"000000000000000000000000000000000000042\"");
    }
}
