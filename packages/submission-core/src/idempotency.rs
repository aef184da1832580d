//! C1: deterministic idempotency keyer.
//!
//! Preimage is `job_id ":" directory ":" canonical_factors`, hashed with
//! SHA-256. `canonical_factors` is the factor map serialized with sorted
//! keys and no insignificant whitespace, matching
//! `original_source/backend/utils/ids.py::make_idempotency_key`.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Compute the 64-char lowercase hex idempotency key for a (job, directory,
/// factors) triple. `BTreeMap` keeps keys sorted for free; `serde_json`
/// serializes compactly once map order is fixed.
pub fn idempotency_key(
    job_id: &str,
    directory: &str,
    factors: &BTreeMap<String, serde_json::Value>,
) -> String {
    let canonical_factors =
        serde_json::to_string(factors).expect("BTreeMap<String, Value> always serializes");
    let preimage = format!("{job_id}:{directory}:{canonical_factors}");

    let mut hasher = Sha256::new();
    hasher.update(preimage.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factors(pairs: &[(&str, &str)]) -> BTreeMap<String, serde_json::Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), serde_json::json!(v)))
            .collect()
    }

    #[test]
    fn deterministic_across_calls() {
        let f = factors(&[("name", "Acme"), ("dir", "yelp")]);
        assert_eq!(idempotency_key("j1", "yelp", &f), idempotency_key("j1", "yelp", &f));
    }

    #[test]
    fn is_64_char_lowercase_hex() {
        let f = factors(&[("name", "Acme")]);
        let key = idempotency_key("j1", "yelp", &f);
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn insertion_order_does_not_matter() {
        let a = factors(&[("name", "Acme"), ("zip", "55401")]);
        let b = factors(&[("zip", "55401"), ("name", "Acme")]);
        assert_eq!(idempotency_key("j1", "d1", &a), idempotency_key("j1", "d1", &b));
    }

    #[test]
    fn differs_when_factors_differ() {
        let a = factors(&[("name", "Acme")]);
        let b = factors(&[("name", "Acme Inc")]);
        assert_ne!(idempotency_key("j1", "d1", &a), idempotency_key("j1", "d1", &b));
    }

    #[test]
    fn differs_per_job_and_directory() {
        let f = factors(&[("name", "Acme")]);
        assert_ne!(idempotency_key("j1", "d1", &f), idempotency_key("j2", "d1", &f));
        assert_ne!(idempotency_key("j1", "d1", &f), idempotency_key("j1", "d2", &f));
    }
}
