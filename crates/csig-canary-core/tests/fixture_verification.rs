// crates/csig-canary-core/tests/fixture_verification.rs
// ============================================================================
// Module: Fixture Verification Tests
// Description: Embedded fixture self-check through the verification adapter.
// ============================================================================
//! ## Overview
//! The fixture must verify against a primitive that knows it, must fail on a
//! single tampered byte, and must surface a raising or stalled primitive as
//! an error rather than a `false` verdict.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::RecordedPrimitive;
use csig_canary_core::ContentSignatureFixture;
use csig_canary_core::ContentSignaturePrimitive;
use csig_canary_core::SignatureVerifier;
use csig_canary_core::SignedContent;
use csig_canary_core::TelemetryRecorder;
use csig_canary_core::fixture::FIXTURE_SIGNATURE;

fn verifier(primitive: &Arc<RecordedPrimitive>) -> SignatureVerifier {
    SignatureVerifier::new(
        Arc::clone(primitive) as Arc<dyn ContentSignaturePrimitive>,
        Duration::from_secs(1),
    )
}

#[tokio::test]
async fn embedded_fixture_verifies() {
    let primitive = Arc::new(RecordedPrimitive::accepting_fixture());
    let telemetry = TelemetryRecorder::new();
    let fixture = ContentSignatureFixture::embedded();

    let verified = verifier(&primitive).verify_fixture(&fixture, &telemetry).await.unwrap();

    assert!(verified);
    let calls = primitive.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, fixture.collection_data);
    assert_eq!(calls[0].1, format!("p384ecdsa={FIXTURE_SIGNATURE}"));
    assert_eq!(telemetry.snapshot().pretty().unwrap(), "verification: valid (error: none)");
}

#[tokio::test]
async fn tampered_byte_fails_verification() {
    let primitive = Arc::new(RecordedPrimitive::accepting_fixture());
    let telemetry = TelemetryRecorder::new();
    let fixture = ContentSignatureFixture::embedded();
    let mut tampered = fixture.collection_data.to_vec();
    let last = tampered.len() - 2;
    tampered[last] ^= 0x01;
    let content = SignedContent {
        data: &tampered,
        ..SignedContent::from_fixture(&fixture)
    };

    let verified = verifier(&primitive).verify(content, None, &telemetry).await.unwrap();

    assert!(!verified);
    assert_eq!(telemetry.snapshot().pretty().unwrap(), "verification: invalid (error: invalid)");
}

#[tokio::test]
async fn wrong_signer_fails_verification() {
    let primitive = Arc::new(RecordedPrimitive::accepting_fixture());
    let telemetry = TelemetryRecorder::new();
    let fixture = ContentSignatureFixture::embedded();
    let signer = csig_canary_core::SignerIdentity::from_fragment("remote-settings").unwrap();
    let content = SignedContent {
        signer: &signer,
        ..SignedContent::from_fixture(&fixture)
    };

    assert!(!verifier(&primitive).verify(content, None, &telemetry).await.unwrap());
}

#[tokio::test]
async fn raising_primitive_is_an_error_not_a_verdict() {
    let primitive = Arc::new(RecordedPrimitive::accepting_fixture());
    primitive.raise_on(FIXTURE_SIGNATURE);
    let telemetry = TelemetryRecorder::new();
    let fixture = ContentSignatureFixture::embedded();

    let err = verifier(&primitive).verify_fixture(&fixture, &telemetry).await.unwrap_err();

    assert_eq!(err.bucket, None);
    assert_eq!(err.collection, None);
    assert!(err.cause.contains("InvalidSignatureError"));
    assert!(err.to_string().contains("fixture"));
}

#[tokio::test(start_paused = true)]
async fn stalled_primitive_times_out() {
    let primitive = Arc::new(RecordedPrimitive::accepting_fixture());
    primitive.set_delay(Duration::from_secs(30));
    let telemetry = TelemetryRecorder::new();
    let fixture = ContentSignatureFixture::embedded();

    let err = verifier(&primitive).verify_fixture(&fixture, &telemetry).await.unwrap_err();

    assert_eq!(err.cause, "verification timed out after 1000 ms");
}
