// crates/csig-canary-core/src/core/identifiers.rs
// ============================================================================
// Module: Canary Identifiers
// Description: Opaque identifiers for buckets, collections, signers, and roots.
// Purpose: Provide strongly typed, serializable IDs with stable string forms.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Buckets and collections are opaque path segments served by the settings
//! server. Signer identities are never taken verbatim from server metadata:
//! they are rebuilt from a metadata fragment plus the fixed trust domain.
//! Trust-root fingerprints are pinned SHA-256 digests in colon-separated hex.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Trust domain appended to every metadata-supplied signer fragment.
pub const CONTENT_SIGNATURE_TRUST_DOMAIN: &str = "content-signature.mozilla.org";

/// Maximum length of a signer fragment (one DNS label).
const MAX_SIGNER_FRAGMENT_LENGTH: usize = 63;

/// Number of digest bytes in a pinned SHA-256 fingerprint.
const FINGERPRINT_BYTES: usize = 32;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when constructing validated identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    /// Bucket/collection path segment is empty or contains separators.
    #[error("invalid path segment: {0:?}")]
    InvalidSegment(String),
    /// Signer fragment from metadata is not a single DNS label.
    #[error("invalid signer fragment: {0:?}")]
    InvalidSignerFragment(String),
    /// Fingerprint is not 32 colon-separated hex bytes.
    #[error("invalid trust root fingerprint: {0:?}")]
    InvalidFingerprint(String),
}

// ============================================================================
// SECTION: Path Segments
// ============================================================================

/// Validates a single URL path segment used for buckets and collections.
fn validate_segment(value: &str) -> Result<(), IdentifierError> {
    let valid = !value.is_empty()
        && value.chars().all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_'));
    if valid { Ok(()) } else { Err(IdentifierError::InvalidSegment(value.to_string())) }
}

/// Settings bucket identifier (for example `security-state`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BucketId(String);

impl BucketId {
    /// Creates a validated bucket identifier.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError::InvalidSegment`] when the value is not a
    /// plain path segment.
    pub fn new(id: impl Into<String>) -> Result<Self, IdentifierError> {
        let id = id.into();
        validate_segment(&id)?;
        Ok(Self(id))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BucketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Settings collection identifier (for example `onecrl`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionId(String);

impl CollectionId {
    /// Creates a validated collection identifier.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError::InvalidSegment`] when the value is not a
    /// plain path segment.
    pub fn new(id: impl Into<String>) -> Result<Self, IdentifierError> {
        let id = id.into();
        validate_segment(&id)?;
        Ok(Self(id))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// SECTION: Signer Identity
// ============================================================================

/// Expected end-entity subject for a content signature.
///
/// # Invariants
/// - Always `<fragment>.content-signature.mozilla.org`; the fragment is a
///   single DNS label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SignerIdentity(String);

impl SignerIdentity {
    /// Rebuilds the signer identity from a metadata-supplied fragment.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError::InvalidSignerFragment`] when the fragment is
    /// empty, too long, or contains anything beyond `[A-Za-z0-9-]`.
    pub fn from_fragment(fragment: &str) -> Result<Self, IdentifierError> {
        let valid = !fragment.is_empty()
            && fragment.len() <= MAX_SIGNER_FRAGMENT_LENGTH
            && !fragment.starts_with('-')
            && !fragment.ends_with('-')
            && fragment.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '-');
        if !valid {
            return Err(IdentifierError::InvalidSignerFragment(fragment.to_string()));
        }
        Ok(Self(format!("{fragment}.{CONTENT_SIGNATURE_TRUST_DOMAIN}")))
    }

    /// Builds an identity from a compiled-in fragment.
    pub(crate) fn from_static_fragment(fragment: &'static str) -> Self {
        Self(format!("{fragment}.{CONTENT_SIGNATURE_TRUST_DOMAIN}"))
    }

    /// Returns the full identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SignerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// SECTION: Trust Root Fingerprint
// ============================================================================

/// Pinned SHA-256 fingerprint of a content-signing root certificate.
///
/// # Invariants
/// - 32 uppercase hex byte pairs separated by `:`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TrustRootFingerprint(String);

impl TrustRootFingerprint {
    /// Parses a fingerprint, normalizing hex digits to uppercase.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError::InvalidFingerprint`] when the value is not
    /// 32 colon-separated hex bytes.
    pub fn parse(value: &str) -> Result<Self, IdentifierError> {
        let parts: Vec<&str> = value.split(':').collect();
        let valid = parts.len() == FINGERPRINT_BYTES
            && parts.iter().all(|part| part.len() == 2 && part.chars().all(|ch| ch.is_ascii_hexdigit()));
        if !valid {
            return Err(IdentifierError::InvalidFingerprint(value.to_string()));
        }
        Ok(Self(value.to_ascii_uppercase()))
    }

    /// Wraps a compiled-in fingerprint constant.
    pub(crate) fn from_static(value: &'static str) -> Self {
        Self(value.to_string())
    }

    /// Returns the fingerprint as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrustRootFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// SECTION: Collection Scope
// ============================================================================

/// A `bucket/collection` pair addressed on the settings server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CollectionScope {
    /// Bucket holding the collection.
    pub bucket: BucketId,
    /// Collection name within the bucket.
    pub collection: CollectionId,
}

impl CollectionScope {
    /// Parses a `bucket/collection` path.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError::InvalidSegment`] when the path does not have
    /// exactly two valid segments.
    pub fn parse(path: &str) -> Result<Self, IdentifierError> {
        let trimmed = path.trim();
        let mut parts = trimmed.split('/');
        let (Some(bucket), Some(collection), None) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(IdentifierError::InvalidSegment(trimmed.to_string()));
        };
        Ok(Self {
            bucket: BucketId::new(bucket)?,
            collection: CollectionId::new(collection)?,
        })
    }
}

impl fmt::Display for CollectionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.collection)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
