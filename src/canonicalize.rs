//! JSON Canonicalization Scheme (JCS) serialization
//!
//! Implements the RFC 8785 rules the seal depends on: object keys sorted
//! lexicographically, no insignificant whitespace, arrays kept in order,
//! minimal string escaping. The registry hash and the seal master hash are
//! both SHA-256 digests over this output, so the same logical document
//! always hashes identically regardless of how it was built in memory.

use crate::content_hasher::digest_bytes;
use crate::errors::{SealError, SealResult};
use serde::Serialize;
use serde_json::Value;
use std::fmt::Write;

/// Canonicalize a JSON value according to RFC 8785 (JCS)
pub fn canonicalize_json(value: &Value) -> SealResult<String> {
    let mut output = String::new();
    serialize_value(value, &mut output)?;
    Ok(output)
}

/// Serialize any value through `serde_json` and canonicalize the result.
pub fn canonicalize<T: Serialize>(value: &T) -> SealResult<String> {
    let value = serde_json::to_value(value)
        .map_err(|e| SealError::serialization("converting to canonical form", e))?;
    canonicalize_json(&value)
}

/// SHA-256 over the canonical serialization of `value`.
pub fn canonical_digest<T: Serialize>(value: &T) -> SealResult<String> {
    let canonical = canonicalize(value)?;
    Ok(digest_bytes(canonical.as_bytes()))
}

fn serialize_value(value: &Value, output: &mut String) -> SealResult<()> {
    match value {
        Value::Object(map) => serialize_object(map, output)?,
        Value::Array(arr) => serialize_array(arr, output)?,
        Value::String(s) => serialize_string(s, output),
        Value::Number(n) => serialize_number(n, output)?,
        Value::Bool(b) => output.push_str(if *b { "true" } else { "false" }),
        Value::Null => output.push_str("null"),
    }
    Ok(())
}

/// Serialize a JSON object with lexicographically sorted keys
fn serialize_object(map: &serde_json::Map<String, Value>, output: &mut String) -> SealResult<()> {
    output.push('{');

    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();

    for (i, key) in keys.iter().enumerate() {
        if i > 0 {
            output.push(',');
        }
        serialize_string(key, output);
        output.push(':');
        serialize_value(&map[*key], output)?;
    }

    output.push('}');
    Ok(())
}

fn serialize_array(arr: &[Value], output: &mut String) -> SealResult<()> {
    output.push('[');
    for (i, item) in arr.iter().enumerate() {
        if i > 0 {
            output.push(',');
        }
        serialize_value(item, output)?;
    }
    output.push(']');
    Ok(())
}

/// Serialize a JSON string with proper escaping per RFC 8785
fn serialize_string(s: &str, output: &mut String) {
    output.push('"');
    for ch in s.chars() {
        match ch {
            '"' => output.push_str("\\\""),
            '\\' => output.push_str("\\\\"),
            '\u{08}' => output.push_str("\\b"),
            '\u{0C}' => output.push_str("\\f"),
            '\n' => output.push_str("\\n"),
            '\r' => output.push_str("\\r"),
            '\t' => output.push_str("\\t"),
            ch if (ch as u32) < 0x20 => {
                // writing into a String cannot fail
                let _ = write!(output, "\\u{:04x}", ch as u32);
            }
            ch => output.push(ch),
        }
    }
    output.push('"');
}

/// Serialize a JSON number per RFC 8785 (ECMAScript number formatting)
fn serialize_number(num: &serde_json::Number, output: &mut String) -> SealResult<()> {
    if let Some(i) = num.as_i64() {
        output.push_str(&i.to_string());
    } else if let Some(u) = num.as_u64() {
        output.push_str(&u.to_string());
    } else if let Some(f) = num.as_f64() {
        if !f.is_finite() {
            return Err(SealError::config("non-finite number in canonical JSON"));
        }
        if f.fract() == 0.0 && f.abs() < 1e15 {
            output.push_str(&(f as i64).to_string());
        } else {
            output.push_str(&f.to_string());
        }
    } else {
        return Err(SealError::config("invalid number in canonical JSON"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_object_key_sorting() {
        let input = json!({
            "version": 3,
            "moduleOrder": ["b", "a"],
            "declaredModuleCount": 2
        });

        let canonical = canonicalize_json(&input).unwrap();
        assert_eq!(
            canonical,
            r#"{"declaredModuleCount":2,"moduleOrder":["b","a"],"version":3}"#
        );
    }

    #[test]
    fn test_nested_objects() {
        let input = json!({
            "runtime": {
                "version": 1,
                "modules": {"work_claim": "missing", "bank_cgt": "missing"}
            },
            "chain": {}
        });

        let canonical = canonicalize_json(&input).unwrap();
        assert_eq!(
            canonical,
            r#"{"chain":{},"runtime":{"modules":{"bank_cgt":"missing","work_claim":"missing"},"version":1}}"#
        );
    }

    #[test]
    fn test_string_escaping() {
        let input = json!({
            "quotes": "He said \"Hello\"",
            "backslash": "C:\\chain\\src",
            "control": "a\u{0001}b"
        });

        let canonical = canonicalize_json(&input).unwrap();
        assert_eq!(
            canonical,
            r#"{"backslash":"C:\\chain\\src","control":"a\u0001b","quotes":"He said \"Hello\""}"#
        );
    }

    #[test]
    fn test_digest_is_insertion_order_independent() {
        let mut a = serde_json::Map::new();
        a.insert("z".into(), json!(1));
        a.insert("a".into(), json!(2));
        let mut b = serde_json::Map::new();
        b.insert("a".into(), json!(2));
        b.insert("z".into(), json!(1));

        assert_eq!(
            canonical_digest(&Value::Object(a)).unwrap(),
            canonical_digest(&Value::Object(b)).unwrap()
        );
    }

    #[test]
    fn test_whole_floats_render_as_integers() {
        let canonical = canonicalize_json(&json!({"whole": 5.0, "frac": 2.5})).unwrap();
        assert_eq!(canonical, r#"{"frac":2.5,"whole":5}"#);
    }
}
