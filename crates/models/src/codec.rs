//! Text encodings for session fields.
//!
//! The store only holds strings. Each semantic type gets one encode/decode
//! pair here so the accessors never touch raw store text themselves.

use {
    chrono::{DateTime, NaiveDateTime, Utc},
    serde_json::Value,
};

/// `YYYY-MM-DD HH:MM:SS`, implicitly UTC.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Legacy spelling of an absent optional string.
pub const LEGACY_NONE: &str = "None";

pub fn encode_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

pub fn decode_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| e.to_string())
}

pub fn encode_int(value: i64) -> String {
    value.to_string()
}

pub fn decode_int(raw: &str) -> Result<i64, String> {
    raw.trim().parse().map_err(|e| format!("{raw:?}: {e}"))
}

pub fn encode_size(value: u32) -> String {
    value.to_string()
}

pub fn decode_size(raw: &str) -> Result<u32, String> {
    raw.trim().parse().map_err(|e| format!("{raw:?}: {e}"))
}

/// Booleans are stored as JSON literals (`true` / `false`).
pub fn encode_bool(value: bool) -> String {
    Value::Bool(value).to_string()
}

pub fn decode_bool(raw: &str) -> Result<bool, String> {
    serde_json::from_str(raw).map_err(|e| format!("{raw:?}: {e}"))
}

/// Structured documents are stored as JSON text.
pub fn encode_document(value: &Value) -> String {
    value.to_string()
}

pub fn decode_document(raw: &str) -> Result<Value, String> {
    serde_json::from_str(raw).map_err(|e| e.to_string())
}

/// Absent values are written as the empty string, or as `None` for stores
/// still read by older tooling.
pub fn encode_optional(value: Option<&str>, legacy_none: bool) -> String {
    match value {
        Some(v) => v.to_string(),
        None if legacy_none => LEGACY_NONE.to_string(),
        None => String::new(),
    }
}

/// Missing, empty and `None` all decode as absent.
pub fn decode_optional(raw: Option<String>) -> Option<String> {
    raw.filter(|v| !v.is_empty() && v != LEGACY_NONE)
}

#[cfg(test)]
mod tests {
    use {super::*, chrono::TimeZone, serde_json::json};

    #[test]
    fn test_timestamp_format() {
        let at = Utc.with_ymd_and_hms(2015, 10, 8, 12, 34, 56).unwrap();
        assert_eq!(encode_timestamp(at), "2015-10-08 12:34:56");
        assert_eq!(decode_timestamp("2015-10-08 12:34:56").unwrap(), at);
        assert!(decode_timestamp("2015-10-08T12:34:56Z").is_err());
    }

    #[test]
    fn test_timestamp_drops_subseconds() {
        let at = Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap()
            + chrono::Duration::milliseconds(999);
        assert_eq!(encode_timestamp(at), "2020-01-02 03:04:05");
    }

    #[test]
    fn test_bool_literals() {
        assert_eq!(encode_bool(false), "false");
        assert_eq!(encode_bool(true), "true");
        assert!(decode_bool("true").unwrap());
        assert!(decode_bool("5").is_err());
        assert!(decode_bool("False").is_err());
    }

    #[test]
    fn test_ints() {
        assert_eq!(decode_int("42").unwrap(), 42);
        assert_eq!(decode_int("-3").unwrap(), -3);
        assert!(decode_int("").is_err());
        assert!(decode_size("-1").is_err());
        assert_eq!(decode_size(&encode_size(23)).unwrap(), 23);
    }

    #[test]
    fn test_empty_document() {
        assert_eq!(encode_document(&json!({})), "{}");
        assert_eq!(decode_document("{}").unwrap(), json!({}));
        // Documents written with spaced separators still parse.
        assert_eq!(
            decode_document(r#"{"from": 23, "to": 42}"#).unwrap(),
            json!({"from": 23, "to": 42})
        );
    }

    #[test]
    fn test_optional_strings() {
        assert_eq!(encode_optional(Some("abc"), true), "abc");
        assert_eq!(encode_optional(None, true), "None");
        assert_eq!(encode_optional(None, false), "");

        assert_eq!(decode_optional(None), None);
        assert_eq!(decode_optional(Some(String::new())), None);
        assert_eq!(decode_optional(Some("None".into())), None);
        assert_eq!(decode_optional(Some("x".into())).as_deref(), Some("x"));
    }
}
