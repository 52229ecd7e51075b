// crates/csig-canary-core/src/core/canonical.rs
// ============================================================================
// Module: Canonical Serializer
// Description: Canonical JSON encoding of signed collection payloads.
// Purpose: Reproduce the exact bytes the collection signer signed upstream.
// Dependencies: serde, serde_jcs, serde_json, sha2
// ============================================================================

//! ## Overview
//! The signed payload is `{"data": [...records], "last_modified": "<ts>"}`
//! encoded with RFC 8785 (JCS) and then ASCII-escaped: every character at or
//! above U+007F becomes a lowercase `\uXXXX` escape, matching the upstream
//! canonical JSON writer byte for byte. Escaping after JCS is sound because
//! non-ASCII characters only occur inside JSON strings.
//!
//! Integers outside the IEEE-754 safe range cannot round-trip through the
//! upstream number model and are rejected rather than silently rounded.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt::Write as _;

use serde::Serialize;
use serde_json::Value;
use sha2::Digest;
use sha2::Sha256;

use crate::core::records::Record;
use crate::core::records::RecordSet;
use crate::core::records::SerializationError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Largest integer magnitude representable exactly as an IEEE-754 double.
pub const MAX_SAFE_INTEGER: u64 = (1 << 53) - 1;

/// First code point that is escaped in canonical output (DEL).
const FIRST_ESCAPED_CODE_POINT: u32 = 0x7f;

// ============================================================================
// SECTION: Payload
// ============================================================================

/// Shape of the signed payload.
#[derive(Serialize)]
struct SignedPayload<'a> {
    /// Merged records in signing order.
    data: &'a [Record],
    /// High-water mark timestamp as a decimal string.
    last_modified: String,
}

// ============================================================================
// SECTION: Canonicalization
// ============================================================================

/// Serializes a record set and its timestamp into the signed byte string.
///
/// The output is a pure function of the ordered records and the timestamp.
///
/// # Errors
///
/// Returns [`SerializationError`] when a record holds a value that has no
/// canonical encoding.
pub fn canonicalize(records: &RecordSet, timestamp: u64) -> Result<Vec<u8>, SerializationError> {
    for (index, record) in records.records().iter().enumerate() {
        for (key, value) in record.fields() {
            check_representable(value, &format!("/data/{index}/{}", escape_pointer(key)))?;
        }
    }
    let payload = SignedPayload {
        data: records.records(),
        last_modified: timestamp.to_string(),
    };
    canonical_json_bytes(&payload)
}

/// Returns canonical, ASCII-escaped JSON bytes for any serializable value.
///
/// # Errors
///
/// Returns [`SerializationError::Canonicalization`] when serialization fails.
pub fn canonical_json_bytes<T: Serialize + ?Sized>(
    value: &T,
) -> Result<Vec<u8>, SerializationError> {
    let text = serde_jcs::to_string(value)
        .map_err(|err| SerializationError::Canonicalization(err.to_string()))?;
    Ok(escape_non_ascii(&text).into_bytes())
}

/// Escapes every character at or above U+007F as lowercase `\uXXXX` units.
fn escape_non_ascii(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut units = [0u16; 2];
    for ch in text.chars() {
        if u32::from(ch) < FIRST_ESCAPED_CODE_POINT {
            out.push(ch);
            continue;
        }
        for unit in &*ch.encode_utf16(&mut units) {
            let _ = write!(out, "\\u{unit:04x}");
        }
    }
    out
}

/// Rejects integers that cannot be represented exactly downstream.
fn check_representable(value: &Value, path: &str) -> Result<(), SerializationError> {
    match value {
        Value::Number(number) => {
            let in_range = match (number.as_u64(), number.as_i64()) {
                (Some(unsigned), _) => unsigned <= MAX_SAFE_INTEGER,
                (None, Some(signed)) => signed.unsigned_abs() <= MAX_SAFE_INTEGER,
                (None, None) => number.as_f64().is_some_and(f64::is_finite),
            };
            if in_range {
                Ok(())
            } else {
                Err(SerializationError::UnrepresentableNumber {
                    path: path.to_string(),
                })
            }
        }
        Value::Array(items) => items
            .iter()
            .enumerate()
            .try_for_each(|(index, item)| check_representable(item, &format!("{path}/{index}"))),
        Value::Object(fields) => fields.iter().try_for_each(|(key, item)| {
            check_representable(item, &format!("{path}/{}", escape_pointer(key)))
        }),
        Value::Null | Value::Bool(_) | Value::String(_) => Ok(()),
    }
}

/// Escapes a key for use inside a JSON pointer.
fn escape_pointer(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

// ============================================================================
// SECTION: Digests
// ============================================================================

/// Returns the lowercase hex SHA-256 digest of the given bytes.
///
/// Used in trace messages so runs can be compared without dumping payloads.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex_encode(&hasher.finalize())
}

/// Encodes bytes as a lowercase hex string.
fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}

// ============================================================================
// SECTION: Tests
// ============================================================================
