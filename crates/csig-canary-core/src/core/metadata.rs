// crates/csig-canary-core/src/core/metadata.rs
// ============================================================================
// Module: Collection Metadata
// Description: Signature block extracted from a collection metadata response.
// Purpose: Expose exactly the fields the verifier needs and nothing else.
// Dependencies: serde_json, thiserror
// ============================================================================

//! ## Overview
//! The metadata endpoint answers `{"data": {"signature": {...}}}`. The canary
//! reads three fields from the signature block: the signer fragment, the
//! signature value, and the x5u chain URL. The fragment is kept raw here; the
//! orchestrator turns it into a [`crate::SignerIdentity`] so the trust domain
//! is always appended.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Metadata response did not carry a usable signature block.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetadataError {
    /// A required string field is absent or not a string.
    #[error("metadata missing string field {0}")]
    MissingField(&'static str),
    /// A required field is present but empty.
    #[error("metadata field {0} is empty")]
    EmptyField(&'static str),
}

// ============================================================================
// SECTION: Metadata
// ============================================================================

/// Signature block of one collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionMetadata {
    /// Signer fragment (`signer_id`), without the trust domain.
    pub signer_fragment: String,
    /// Untagged signature value.
    pub signature: String,
    /// Certificate chain location.
    pub x5u: String,
}

impl CollectionMetadata {
    /// Extracts the signature block from a metadata response body.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError`] when any of the three fields is missing,
    /// non-string, or empty.
    pub fn from_response(body: &Value) -> Result<Self, MetadataError> {
        let signature = body.pointer("/data/signature");
        Ok(Self {
            signer_fragment: required(signature, "signer_id")?,
            signature: required(signature, "signature")?,
            x5u: required(signature, "x5u")?,
        })
    }
}

/// Reads one non-empty string field from the signature block.
fn required(block: Option<&Value>, field: &'static str) -> Result<String, MetadataError> {
    let value = block
        .and_then(|block| block.get(field))
        .and_then(Value::as_str)
        .ok_or(MetadataError::MissingField(field))?;
    if value.is_empty() {
        return Err(MetadataError::EmptyField(field));
    }
    Ok(value.to_string())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
