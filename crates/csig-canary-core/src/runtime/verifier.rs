// crates/csig-canary-core/src/runtime/verifier.rs
// ============================================================================
// Module: Signature Verifier Adapter
// Description: Uniform call contract around the black-box verification primitive.
// Purpose: Own algorithm tagging, bounded waits, and raised-error capture.
// Dependencies: tokio, crate::interfaces
// ============================================================================

//! ## Overview
//! Callers hand the adapter an untagged signature; the adapter prefixes the
//! algorithm identifier, bounds the call with a timeout, and keeps the two
//! failure shapes apart: `Ok(false)` means the signature did not validate,
//! `Err(VerificationError)` means the primitive raised.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::core::fixture::ContentSignatureFixture;
use crate::core::identifiers::CollectionScope;
use crate::core::identifiers::SignerIdentity;
use crate::core::identifiers::TrustRootFingerprint;
use crate::core::telemetry::TelemetryRecorder;
use crate::interfaces::ContentSignaturePrimitive;
use crate::interfaces::PrimitiveRequest;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Algorithm tag for ECDSA over P-384 with SHA-384.
pub const SIGNATURE_ALGORITHM_PREFIX: &str = "p384ecdsa=";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// The primitive raised, or did not answer in time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("content signature verification failed for {}: {cause}", scope_label(.bucket.as_deref(), .collection.as_deref()))]
pub struct VerificationError {
    /// Bucket of the target, when verifying a collection.
    pub bucket: Option<String>,
    /// Collection of the target, when verifying a collection.
    pub collection: Option<String>,
    /// Underlying cause.
    pub cause: String,
}

/// Renders the optional scope for error messages.
fn scope_label(bucket: Option<&str>, collection: Option<&str>) -> String {
    match (bucket, collection) {
        (Some(bucket), Some(collection)) => format!("{bucket}/{collection}"),
        _ => "fixture".to_string(),
    }
}

// ============================================================================
// SECTION: Inputs
// ============================================================================

/// One signed payload and everything needed to check it.
#[derive(Debug, Clone, Copy)]
pub struct SignedContent<'a> {
    /// Exact bytes that were signed.
    pub data: &'a [u8],
    /// Untagged signature value.
    pub signature: &'a str,
    /// PEM certificate chain.
    pub certificate_chain: &'a str,
    /// Expected signer identity.
    pub signer: &'a SignerIdentity,
    /// Pinned trust root.
    pub trust_root: &'a TrustRootFingerprint,
}

impl<'a> SignedContent<'a> {
    /// Borrows the embedded fixture as signed content.
    #[must_use]
    pub fn from_fixture(fixture: &'a ContentSignatureFixture) -> Self {
        Self {
            data: fixture.collection_data,
            signature: fixture.signature,
            certificate_chain: &fixture.certificate_chain,
            signer: &fixture.signer,
            trust_root: &fixture.trust_root,
        }
    }
}

// ============================================================================
// SECTION: Adapter
// ============================================================================

/// Adapter over a [`ContentSignaturePrimitive`].
#[derive(Clone)]
pub struct SignatureVerifier {
    /// Black-box primitive.
    primitive: Arc<dyn ContentSignaturePrimitive>,
    /// Bound on a single primitive call.
    timeout: Duration,
}

impl SignatureVerifier {
    /// Wraps a primitive with a per-call timeout.
    #[must_use]
    pub fn new(primitive: Arc<dyn ContentSignaturePrimitive>, timeout: Duration) -> Self {
        Self {
            primitive,
            timeout,
        }
    }

    /// Prefixes the algorithm identifier unless it is already present.
    #[must_use]
    pub fn tag_signature(signature: &str) -> String {
        if signature.starts_with(SIGNATURE_ALGORITHM_PREFIX) {
            signature.to_string()
        } else {
            format!("{SIGNATURE_ALGORITHM_PREFIX}{signature}")
        }
    }

    /// Verifies signed content.
    ///
    /// # Errors
    ///
    /// Returns [`VerificationError`] when the primitive raises or the bounded
    /// wait elapses. A signature that simply does not validate is `Ok(false)`.
    pub async fn verify(
        &self,
        content: SignedContent<'_>,
        scope: Option<&CollectionScope>,
        telemetry: &TelemetryRecorder,
    ) -> Result<bool, VerificationError> {
        let tagged = Self::tag_signature(content.signature);
        let request = PrimitiveRequest {
            input: content.data,
            signature: &tagged,
            certificate_chain: content.certificate_chain,
            signer: content.signer,
            trust_root: content.trust_root,
        };
        let call = self.primitive.verify_content_signature(request, telemetry);
        let cause = match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(verified)) => return Ok(verified),
            Ok(Err(err)) => err.to_string(),
            Err(_) => format!("verification timed out after {} ms", self.timeout.as_millis()),
        };
        Err(VerificationError {
            bucket: scope.map(|scope| scope.bucket.to_string()),
            collection: scope.map(|scope| scope.collection.to_string()),
            cause,
        })
    }

    /// Verifies the embedded fixture.
    ///
    /// # Errors
    ///
    /// Returns [`VerificationError`] when the primitive raises.
    pub async fn verify_fixture(
        &self,
        fixture: &ContentSignatureFixture,
        telemetry: &TelemetryRecorder,
    ) -> Result<bool, VerificationError> {
        self.verify(SignedContent::from_fixture(fixture), None, telemetry).await
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
