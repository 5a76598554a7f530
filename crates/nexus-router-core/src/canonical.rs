// crates/nexus-router-core/src/canonical.rs
// ============================================================================
// Module: Canonical JSON & Digests
// Description: Deterministic JSON serialization and SHA-256 content digests.
// Purpose: Give the event store, bundle export, and redaction a single
//          definition of "canonical JSON" to serialize and compare against.
// Dependencies: serde, serde_json, sha2
// ============================================================================

//! ## Overview
//! Canonical JSON is UTF-8 JSON with lexicographically sorted
//! object keys and no insignificant whitespace. `serde_json::Value` already
//! stores objects in a `BTreeMap`, so `serde_json::to_vec` on a `Value`
//! produces canonical bytes directly; the helpers here exist so callers never
//! have to reason about that fact themselves.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;
use serde_json::Value;
use sha2::Digest;
use sha2::Sha256;

use crate::error::StoreError;

// ============================================================================
// SECTION: Canonicalization
// ============================================================================

/// Serializes `value` to canonical JSON bytes (sorted keys, no whitespace).
///
/// # Errors
///
/// Returns [`StoreError::Serialization`] when `value` cannot be serialized.
pub fn canonical_json_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, StoreError> {
    let as_value = serde_json::to_value(value).map_err(|err| StoreError::Serialization(err.to_string()))?;
    serde_json::to_vec(&as_value).map_err(|err| StoreError::Serialization(err.to_string()))
}

/// Serializes `value` to a canonical JSON string.
///
/// # Errors
///
/// Returns [`StoreError::Serialization`] when `value` cannot be serialized.
pub fn canonical_json_string<T: Serialize + ?Sized>(value: &T) -> Result<String, StoreError> {
    let bytes = canonical_json_bytes(value)?;
    String::from_utf8(bytes).map_err(|err| StoreError::Serialization(err.to_string()))
}

/// Parses canonical JSON bytes back into a `Value`, re-serializes them, and
/// confirms the bytes are unchanged. Used where a stored payload must be
/// proven canonical before it participates in a digest.
///
/// # Errors
///
/// Returns [`StoreError::Corrupt`] when the bytes do not parse, or do not
/// round-trip to themselves.
pub fn require_canonical(bytes: &[u8]) -> Result<Value, StoreError> {
    let value: Value =
        serde_json::from_slice(bytes).map_err(|err| StoreError::Corrupt(err.to_string()))?;
    let re_encoded = canonical_json_bytes(&value)?;
    if re_encoded != bytes {
        return Err(StoreError::Corrupt("payload is not canonical JSON".to_string()));
    }
    Ok(value)
}

// ============================================================================
// SECTION: Digests
// ============================================================================

/// Computes the lowercase hex SHA-256 digest of raw bytes.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    hex_encode(&digest)
}

/// Computes the SHA-256 digest of the canonical JSON of `value`.
///
/// # Errors
///
/// Returns [`StoreError::Serialization`] when `value` cannot be serialized.
pub fn sha256_hex_of<T: Serialize + ?Sized>(value: &T) -> Result<String, StoreError> {
    let bytes = canonical_json_bytes(value)?;
    Ok(sha256_hex(&bytes))
}

/// Encodes bytes as a lowercase hex string.
fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}
