//! Canonical CBOR encoding for deterministic pulse hashing.
//!
//! This module implements RFC 8949 Core Deterministic Encoding:
//! - Map keys sorted by encoded byte comparison
//! - Integers use smallest valid encoding
//! - Definite lengths only
//! - Floats always as IEEE-754 binary64 (JSON numbers that are not integers)
//!
//! Only `{index, type, payload, parentHash}` are hashed. The timestamp is
//! advisory and not part of the hash.

use ciborium::value::Value;
use serde_json::Value as Json;

use crate::pulse::PulseType;
use crate::types::PulseHash;

/// Hashed field keys (integer keys for compact encoding).
mod keys {
    pub const INDEX: u64 = 0;
    pub const TYPE: u64 = 1;
    pub const PAYLOAD: u64 = 2;
    pub const PARENT_HASH: u64 = 3;
}

/// Encode the hashed fields of a pulse to canonical CBOR bytes.
pub fn canonical_pulse_bytes(
    index: u64,
    kind: &PulseType,
    payload: &Json,
    parent_hash: Option<&PulseHash>,
) -> Vec<u8> {
    let parent = match parent_hash {
        Some(hash) => Value::Bytes(hash.0.to_vec()),
        None => Value::Null,
    };

    let value = Value::Map(vec![
        (Value::Integer(keys::INDEX.into()), Value::Integer(index.into())),
        (
            Value::Integer(keys::TYPE.into()),
            Value::Text(kind.as_str().to_owned()),
        ),
        (Value::Integer(keys::PAYLOAD.into()), json_to_cbor(payload)),
        (Value::Integer(keys::PARENT_HASH.into()), parent),
    ]);

    let mut buf = Vec::new();
    encode_value_to(&mut buf, &value);
    buf
}

/// Convert a JSON value into a CBOR value.
///
/// Integers that fit `u64`/`i64` stay integers; every other number becomes a
/// float, so `1` and `1.0` hash differently, matching how they are persisted.
pub fn json_to_cbor(value: &Json) -> Value {
    match value {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => {
            if let Some(u) = n.as_u64() {
                Value::Integer(u.into())
            } else if let Some(i) = n.as_i64() {
                Value::Integer(i.into())
            } else {
                n.as_f64().map(Value::Float).unwrap_or(Value::Null)
            }
        }
        Json::String(s) => Value::Text(s.clone()),
        Json::Array(items) => Value::Array(items.iter().map(json_to_cbor).collect()),
        Json::Object(map) => Value::Map(
            map.iter()
                .map(|(k, v)| (Value::Text(k.clone()), json_to_cbor(v)))
                .collect(),
        ),
    }
}

/// Recursively encode a CBOR value.
fn encode_value_to(buf: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Integer(i) => encode_integer(buf, *i),
        Value::Bytes(b) => encode_bytes(buf, b),
        Value::Text(s) => encode_text(buf, s),
        Value::Array(arr) => encode_array(buf, arr),
        Value::Map(entries) => encode_map_canonical(buf, entries),
        Value::Bool(b) => buf.push(if *b { 0xf5 } else { 0xf4 }),
        Value::Null => buf.push(0xf6),
        Value::Float(f) => {
            buf.push(0xfb);
            buf.extend_from_slice(&f.to_be_bytes());
        }
        Value::Tag(tag, inner) => {
            encode_uint(buf, 6, *tag);
            encode_value_to(buf, inner);
        }
        // `undefined`; json_to_cbor never produces anything else
        _ => buf.push(0xf7),
    }
}

/// Encode a CBOR integer (major types 0 and 1).
fn encode_integer(buf: &mut Vec<u8>, i: ciborium::value::Integer) {
    let n: i128 = i.into();

    if n >= 0 {
        encode_uint(buf, 0, n as u64);
    } else {
        // CBOR encodes -1 as 0, -2 as 1, etc.
        let abs = (-1 - n) as u64;
        encode_uint(buf, 1, abs);
    }
}

/// Encode an unsigned integer with the given major type.
fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffff_ffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

/// Encode a byte string (major type 2).
fn encode_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    encode_uint(buf, 2, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

/// Encode a text string (major type 3).
fn encode_text(buf: &mut Vec<u8>, s: &str) {
    encode_uint(buf, 3, s.len() as u64);
    buf.extend_from_slice(s.as_bytes());
}

/// Encode an array (major type 4).
fn encode_array(buf: &mut Vec<u8>, arr: &[Value]) {
    encode_uint(buf, 4, arr.len() as u64);
    for item in arr {
        encode_value_to(buf, item);
    }
}

/// Encode a map canonically (major type 5).
///
/// Keys are sorted by their encoded byte comparison.
fn encode_map_canonical(buf: &mut Vec<u8>, entries: &[(Value, Value)]) {
    let mut pairs: Vec<(Vec<u8>, &Value)> = entries
        .iter()
        .map(|(k, v)| {
            let mut key_buf = Vec::new();
            encode_value_to(&mut key_buf, k);
            (key_buf, v)
        })
        .collect();

    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    encode_uint(buf, 5, pairs.len() as u64);
    for (key_bytes, value) in pairs {
        buf.extend_from_slice(&key_bytes);
        encode_value_to(buf, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_canonical_encoding_deterministic() {
        let payload = json!({"a": 1, "b": [true, null, "x"]});
        let b1 = canonical_pulse_bytes(7, &PulseType::API_CALL, &payload, None);
        let b2 = canonical_pulse_bytes(7, &PulseType::API_CALL, &payload, None);
        assert_eq!(b1, b2);
    }

    #[test]
    fn test_payload_key_order_irrelevant() {
        let a: Json = serde_json::from_str(r#"{"zeta": 1, "alpha": {"y": 2, "x": 3}}"#).unwrap();
        let b: Json = serde_json::from_str(r#"{"alpha": {"x": 3, "y": 2}, "zeta": 1}"#).unwrap();
        let kind = PulseType::new("T");
        assert_eq!(
            canonical_pulse_bytes(0, &kind, &a, None),
            canonical_pulse_bytes(0, &kind, &b, None)
        );
    }

    #[test]
    fn test_every_hashed_field_matters() {
        let kind = PulseType::new("T");
        let payload = json!({"a": 1});
        let parent = PulseHash::from_bytes([1; 32]);
        let base = canonical_pulse_bytes(0, &kind, &payload, Some(&parent));

        assert_ne!(base, canonical_pulse_bytes(1, &kind, &payload, Some(&parent)));
        assert_ne!(
            base,
            canonical_pulse_bytes(0, &PulseType::new("U"), &payload, Some(&parent))
        );
        assert_ne!(base, canonical_pulse_bytes(0, &kind, &json!({"a": 2}), Some(&parent)));
        assert_ne!(base, canonical_pulse_bytes(0, &kind, &payload, None));
    }

    #[test]
    fn test_integer_and_float_distinct() {
        let kind = PulseType::new("T");
        assert_ne!(
            canonical_pulse_bytes(0, &kind, &json!(1), None),
            canonical_pulse_bytes(0, &kind, &json!(1.0), None)
        );
    }

    #[test]
    fn test_integer_encoding() {
        let mut buf = Vec::new();

        encode_uint(&mut buf, 0, 0);
        assert_eq!(buf, vec![0x00]);

        buf.clear();
        encode_uint(&mut buf, 0, 23);
        assert_eq!(buf, vec![0x17]);

        buf.clear();
        encode_uint(&mut buf, 0, 24);
        assert_eq!(buf, vec![0x18, 24]);

        buf.clear();
        encode_uint(&mut buf, 0, 256);
        assert_eq!(buf, vec![0x19, 0x01, 0x00]);

        buf.clear();
        encode_integer(&mut buf, (-1i64).into());
        assert_eq!(buf, vec![0x20]);
    }

    #[test]
    fn test_map_key_ordering() {
        let mut buf = Vec::new();
        let entries = vec![
            (Value::Integer(3.into()), Value::Integer(30.into())),
            (Value::Integer(0.into()), Value::Integer(0.into())),
            (Value::Integer(2.into()), Value::Integer(20.into())),
        ];
        encode_map_canonical(&mut buf, &entries);

        assert_eq!(buf[0], 0xa3);
        assert_eq!(buf[1], 0x00); // key 0
        assert_eq!(buf[2], 0x00);
        assert_eq!(buf[3], 0x02); // key 2
        assert_eq!(buf[4], 0x14); // 20 < 24, single byte
        assert_eq!(buf[5], 0x03); // key 3
        assert_eq!(&buf[6..8], &[0x18, 30]);
    }

    proptest! {
        #[test]
        fn integers_decode_with_ciborium(n in any::<i64>()) {
            let mut buf = Vec::new();
            encode_integer(&mut buf, n.into());
            let decoded: Value = ciborium::de::from_reader(buf.as_slice()).unwrap();
            prop_assert_eq!(decoded, Value::Integer(n.into()));
            if (0..24).contains(&n) {
                prop_assert_eq!(buf.len(), 1);
            }
        }
    }
}
