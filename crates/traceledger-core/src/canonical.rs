//! Canonical serialization used everywhere a hash is produced or checked.
//!
//! The same encoding must be used by the worker (computing `content_hash`),
//! the audit service (folding a log into the Merkle tree), and any future
//! verifier (recomputing a hash from an exported audit pack). Object keys are
//! sorted, arrays keep their order, and numbers use `serde_json`'s default
//! formatting — stable, UTF-8, no whitespace.

use serde_json::Value;
use std::collections::BTreeMap;

/// Recursively sort object keys so two equal values always serialize to the
/// same bytes, independent of insertion order.
fn sort_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> =
                map.iter().map(|(k, v)| (k.clone(), sort_value(v))).collect();
            serde_json::to_value(sorted).expect("BTreeMap<String, Value> always serializes")
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_value).collect()),
        other => other.clone(),
    }
}

/// Canonical, hash-stable byte encoding of an arbitrary JSON value.
pub fn canonical_bytes(value: &Value) -> Vec<u8> {
    let sorted = sort_value(value);
    serde_json::to_vec(&sorted).expect("canonicalized value always serializes")
}

/// Blake3-256 digest over the canonical encoding of `value`.
pub fn canonical_hash(value: &Value) -> [u8; 32] {
    *blake3::hash(&canonical_bytes(value)).as_bytes()
}

/// Combine two 32-byte hashes into a parent hash for a Merkle tree, or to
/// link an audit chain entry to its predecessor. Uses a fixed domain prefix
/// so a leaf hash can never be mistaken for an internal node hash.
pub fn combine_hashes(domain: &str, left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(domain.as_bytes());
    hasher.update(left);
    hasher.update(right);
    *hasher.finalize().as_bytes()
}

pub fn hash_to_hex(hash: &[u8; 32]) -> String {
    hex::encode(hash)
}

pub fn hash_from_hex(s: &str) -> Result<[u8; 32], hex::FromHexError> {
    let mut out = [0u8; 32];
    hex::decode_to_slice(s, &mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_order_does_not_affect_hash() {
        let a = json!({"b": 1, "a": 2, "c": {"y": 1, "x": 2}});
        let b = json!({"a": 2, "c": {"x": 2, "y": 1}, "b": 1});
        assert_eq!(canonical_hash(&a), canonical_hash(&b));
    }

    #[test]
    fn array_order_does_affect_hash() {
        let a = json!({"list": [1, 2, 3]});
        let b = json!({"list": [3, 2, 1]});
        assert_ne!(canonical_hash(&a), canonical_hash(&b));
    }

    #[test]
    fn hex_round_trip() {
        let hash = canonical_hash(&json!({"x": 1}));
        let hex = hash_to_hex(&hash);
        assert_eq!(hash_from_hex(&hex).unwrap(), hash);
    }

    #[test]
    fn hex_of_the_wrong_length_is_rejected() {
        assert!(hash_from_hex("abcd").is_err());
        assert!(hash_from_hex(&"ab".repeat(33)).is_err());
    }

    proptest::proptest! {
        #[test]
        fn canonicalization_is_deterministic(a in 0u64..1000, b in 0u64..1000) {
            let v = json!({"a": a, "b": b});
            let h1 = canonical_hash(&v);
            let h2 = canonical_hash(&v);
            proptest::prop_assert_eq!(h1, h2);
        }
    }
}
