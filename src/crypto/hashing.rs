// Content digests for issued salary snapshots.

use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

// Domain separation so a snapshot digest can never equal a digest of other content.
const SNAPSHOT_DOMAIN: &[u8] = b"SITELOG-SALARY-SNAPSHOT";

/// A helper function to sort a JSON object's keys recursively.
/// This is essential for canonical serialization.
fn sort_json_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted_map: BTreeMap<String, Value> = map
                .iter()
                .map(|(k, v)| (k.clone(), sort_json_value(v)))
                .collect();
            Value::Object(sorted_map.into_iter().collect())
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_json_value).collect()),
        _ => value.clone(),
    }
}

/// Serializes `value` with object keys sorted at every level.
pub fn canonical_json(value: &Value) -> Vec<u8> {
    // Serializing a `Value` cannot fail: every key is a string.
    serde_json::to_vec(&sort_json_value(value)).unwrap_or_default()
}

/// Hex SHA-256 of the canonical form of a snapshot body.
pub fn snapshot_digest(value: &Value) -> String {
    snapshot_digest_bytes(&canonical_json(value))
}

/// Hex SHA-256 of stored snapshot bytes, exactly as written.
pub fn snapshot_digest_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(SNAPSHOT_DOMAIN);
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn digest_ignores_key_order() {
        let a = json!({"worker": "w1", "lines": [{"hours": 8, "rate": 20}]});
        let b = json!({"lines": [{"rate": 20, "hours": 8}], "worker": "w1"});
        assert_eq!(snapshot_digest(&a), snapshot_digest(&b));
    }

    #[test]
    fn digest_tracks_array_order_and_values() {
        let a = json!({"lines": [1, 2]});
        let b = json!({"lines": [2, 1]});
        assert_ne!(snapshot_digest(&a), snapshot_digest(&b));
        assert_eq!(snapshot_digest(&a).len(), 64);
    }

    #[test]
    fn digest_of_written_bytes_matches_value_digest() {
        let doc = json!({"net_total": 3000.0 + 95.03 + 410.37 - 123.41, "worker": "w1"});
        let bytes = canonical_json(&doc);
        assert_eq!(snapshot_digest_bytes(&bytes), snapshot_digest(&doc));
        assert_ne!(snapshot_digest_bytes(&bytes), hex::encode(Sha256::digest(&bytes)));
    }
}
