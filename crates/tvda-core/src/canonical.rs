//! # Canonical Serialization
//!
//! [`CanonicalBytes`] is the sole construction path for bytes that feed a
//! digest. Evidence payloads and ruling outputs are hashed through it so the
//! same logical content always produces the same bytes.
//!
//! ## Coercion Rules
//!
//! 1. Object keys sorted lexicographically, compact separators.
//! 2. Strings that parse as RFC 3339 are normalized to UTC with `Z`,
//!    truncated to seconds.
//! 3. Non-finite floats are rejected. Finite floats are kept: fault and
//!    confidence scores are fractional by nature, and `serde_json` renders
//!    a given `f64` deterministically.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::CanonicalizationError;

/// Bytes produced exclusively by canonical JSON serialization.
///
/// The inner `Vec<u8>` is private; the only constructor is
/// [`CanonicalBytes::new()`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    /// Construct canonical bytes from any serializable value.
    pub fn new(obj: &impl Serialize) -> Result<Self, CanonicalizationError> {
        let value = serde_json::to_value(obj)?;
        let coerced = coerce_json_value(value)?;
        Ok(Self(serde_json::to_vec(&coerced)?))
    }

    /// Access the canonical bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length of the canonical byte sequence.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the canonical byte sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

fn coerce_json_value(value: Value) -> Result<Value, CanonicalizationError> {
    match value {
        Value::Null | Value::Bool(_) => Ok(value),
        Value::Number(ref n) => {
            if let Some(f) = n.as_f64() {
                if !f.is_finite() {
                    return Err(CanonicalizationError::NonFiniteNumber);
                }
            }
            Ok(value)
        }
        Value::String(s) => Ok(Value::String(normalize_datetime(s))),
        Value::Array(items) => items
            .into_iter()
            .map(coerce_json_value)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(map) => {
            // Collect into a sorted vector so ordering does not depend on
            // serde_json's map feature flags.
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut out = Map::new();
            for (k, v) in entries {
                out.insert(k, coerce_json_value(v)?);
            }
            Ok(Value::Object(out))
        }
    }
}

fn normalize_datetime(s: String) -> String {
    match chrono::DateTime::parse_from_rfc3339(&s) {
        Ok(dt) => dt
            .with_timezone(&chrono::Utc)
            .format("%Y-%m-%dT%H:%M:%SZ")
            .to_string(),
        Err(_) => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keys_are_sorted_and_compact() {
        let cb = CanonicalBytes::new(&json!({"b": 1, "a": {"d": 2, "c": 3}})).unwrap();
        assert_eq!(cb.as_bytes(), br#"{"a":{"c":3,"d":2},"b":1}"#);
    }

    #[test]
    fn datetimes_normalized_to_utc_seconds() {
        let cb = CanonicalBytes::new(&json!({"at": "2026-01-15T17:00:00.123+05:00"})).unwrap();
        assert_eq!(cb.as_bytes(), br#"{"at":"2026-01-15T12:00:00Z"}"#);
    }

    #[test]
    fn finite_floats_are_kept() {
        let cb = CanonicalBytes::new(&json!({"score": 0.46})).unwrap();
        assert_eq!(cb.as_bytes(), br#"{"score":0.46}"#);
    }

    #[test]
    fn plain_strings_untouched() {
        let cb = CanonicalBytes::new(&json!(["login", "2026"])).unwrap();
        assert_eq!(cb.as_bytes(), br#"["login","2026"]"#);
    }

    #[test]
    fn same_content_same_bytes_regardless_of_insertion_order() {
        let mut a = serde_json::Map::new();
        a.insert("z".into(), json!(1));
        a.insert("y".into(), json!(2));
        let mut b = serde_json::Map::new();
        b.insert("y".into(), json!(2));
        b.insert("z".into(), json!(1));
        assert_eq!(
            CanonicalBytes::new(&Value::Object(a)).unwrap(),
            CanonicalBytes::new(&Value::Object(b)).unwrap()
        );
    }
}
