//! The canonical, deterministic JSON codec for all consensus-critical state.
//!
//! Every record written to the state and every payload that is hashed for
//! signing goes through these helpers. Canonical form means: struct fields in
//! declaration order, map keys in sorted order (`serde_json`'s default
//! `BTreeMap`-backed `Value`), integers as JSON numbers only where the type
//! says so, and no insignificant whitespace. Centralizing the codec in the
//! base `types` crate guarantees that two components never disagree on the
//! byte representation of the same record.

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encodes a value into its canonical JSON byte representation.
///
/// Use this for all data written to consensus-critical state or included in
/// a hash for signing or replay protection.
pub fn to_bytes_canonical<T: Serialize>(v: &T) -> Result<Vec<u8>, String> {
    serde_json::to_vec(v).map_err(|e| format!("canonical encode failed: {}", e))
}

/// Decodes a value from its canonical JSON byte representation.
///
/// Fails fast on any decoding error with a descriptive message so that
/// malformed records never propagate into a consensus context.
pub fn from_bytes_canonical<T: DeserializeOwned>(b: &[u8]) -> Result<T, String> {
    serde_json::from_slice(b).map_err(|e| format!("canonical decode failed: {}", e))
}
