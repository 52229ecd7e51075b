// crates/csig-canary-core/tests/common/mod.rs
// ============================================================================
// Module: Common Test Utilities
// Description: Recorded collaborators for csig-canary-core integration tests.
// Purpose: Stand in for the verifier host, settings server, and installer.
// Dependencies: csig-canary-core, serde_json, tokio
// ============================================================================

//! ## Overview
//! The recorded primitive accepts exactly the registered
//! `(sha256(input), tagged signature, signer, root)` tuples and records
//! telemetry the way the real verifier does: code `0` on success, code `1`
//! plus an error entry keyed by the trust root otherwise. The fake transport
//! serves canned responses by URL and logs every request.

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]
#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use csig_canary_core::AddonInstaller;
use csig_canary_core::AuditEvent;
use csig_canary_core::AuditSink;
use csig_canary_core::CanaryServices;
use csig_canary_core::CollectionTransport;
use csig_canary_core::ContentSignatureFixture;
use csig_canary_core::ContentSignaturePrimitive;
use csig_canary_core::FetchRequest;
use csig_canary_core::FetchResponse;
use csig_canary_core::InstallError;
use csig_canary_core::MemorySettingsStore;
use csig_canary_core::PrimitiveError;
use csig_canary_core::PrimitiveRequest;
use csig_canary_core::RecordSet;
use csig_canary_core::SIGNATURE_ALGORITHM_PREFIX;
use csig_canary_core::SignedState;
use csig_canary_core::TelemetryRecorder;
use csig_canary_core::TransportError;
use csig_canary_core::canonicalize;
use csig_canary_core::sha256_hex;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Recorded Primitive
// ============================================================================

/// Registered verification tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Accepted {
    /// SHA-256 of the signed input.
    digest: String,
    /// Tagged signature.
    signature: String,
    /// Signer identity.
    signer: String,
    /// Trust root fingerprint.
    root: String,
}

/// Verification primitive double driven by registered tuples.
#[derive(Default)]
pub struct RecordedPrimitive {
    /// Tuples that verify.
    accepted: Mutex<HashSet<Accepted>>,
    /// Signatures that make the primitive raise.
    raising: Mutex<HashSet<String>>,
    /// Artificial latency per call.
    delay: Mutex<Option<Duration>>,
    /// Requests seen, as (input, tagged signature).
    calls: Mutex<Vec<(Vec<u8>, String)>>,
}

impl RecordedPrimitive {
    /// Creates a primitive that accepts nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a primitive that accepts the embedded fixture.
    pub fn accepting_fixture() -> Self {
        let primitive = Self::new();
        let fixture = ContentSignatureFixture::embedded();
        primitive.accept(
            fixture.collection_data,
            fixture.signature,
            fixture.signer.as_str(),
            fixture.trust_root.as_str(),
        );
        primitive
    }

    /// Registers a tuple that verifies; `signature` is untagged.
    pub fn accept(&self, input: &[u8], signature: &str, signer: &str, root: &str) {
        self.accepted.lock().unwrap().insert(Accepted {
            digest: sha256_hex(input),
            signature: format!("{SIGNATURE_ALGORITHM_PREFIX}{signature}"),
            signer: signer.to_string(),
            root: root.to_string(),
        });
    }

    /// Makes calls with this untagged signature raise.
    pub fn raise_on(&self, signature: &str) {
        self.raising.lock().unwrap().insert(format!("{SIGNATURE_ALGORITHM_PREFIX}{signature}"));
    }

    /// Delays every call.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Returns the requests seen so far.
    pub fn calls(&self) -> Vec<(Vec<u8>, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContentSignaturePrimitive for RecordedPrimitive {
    async fn verify_content_signature(
        &self,
        request: PrimitiveRequest<'_>,
        telemetry: &TelemetryRecorder,
    ) -> Result<bool, PrimitiveError> {
        self.calls.lock().unwrap().push((request.input.to_vec(), request.signature.to_string()));
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.raising.lock().unwrap().contains(request.signature) {
            return Err(PrimitiveError::Raised("InvalidSignatureError".to_string()));
        }
        let candidate = Accepted {
            digest: sha256_hex(request.input),
            signature: request.signature.to_string(),
            signer: request.signer.as_str().to_string(),
            root: request.trust_root.as_str().to_string(),
        };
        if self.accepted.lock().unwrap().contains(&candidate) {
            telemetry.record_verification(0);
            Ok(true)
        } else {
            telemetry.record_verification(1);
            telemetry.record_error(request.trust_root.as_str(), 1);
            Ok(false)
        }
    }
}

/// Primitive that records two outcomes per call.
pub struct DoubleCountingPrimitive;

#[async_trait]
impl ContentSignaturePrimitive for DoubleCountingPrimitive {
    async fn verify_content_signature(
        &self,
        _request: PrimitiveRequest<'_>,
        telemetry: &TelemetryRecorder,
    ) -> Result<bool, PrimitiveError> {
        telemetry.record_verification(0);
        telemetry.record_verification(0);
        Ok(true)
    }
}

// ============================================================================
// SECTION: Fake Transport
// ============================================================================

/// Transport serving canned responses keyed by URL.
#[derive(Default)]
pub struct FakeTransport {
    /// Responses by URL.
    responses: Mutex<HashMap<String, FetchResponse>>,
    /// URLs that never answer.
    hanging: Mutex<HashSet<String>>,
    /// Requests seen.
    requests: Mutex<Vec<FetchRequest>>,
}

impl FakeTransport {
    /// Creates an empty transport; unknown URLs answer 404.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves a JSON body with status 200.
    pub fn serve_json(&self, url: &str, body: &Value) {
        self.serve(url, 200, body.to_string().into_bytes());
    }

    /// Serves a text body with status 200.
    pub fn serve_text(&self, url: &str, body: &str) {
        self.serve(url, 200, body.as_bytes().to_vec());
    }

    /// Serves an arbitrary status and body.
    pub fn serve(&self, url: &str, status: u16, body: Vec<u8>) {
        self.responses.lock().unwrap().insert(url.to_string(), FetchResponse {
            status,
            body,
        });
    }

    /// Makes a URL hang forever.
    pub fn hang(&self, url: &str) {
        self.hanging.lock().unwrap().insert(url.to_string());
    }

    /// Returns the requests seen so far.
    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CollectionTransport for FakeTransport {
    async fn get(&self, request: FetchRequest) -> Result<FetchResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        let hangs = self.hanging.lock().unwrap().contains(&request.url);
        if hangs {
            std::future::pending::<()>().await;
        }
        let response = self.responses.lock().unwrap().get(&request.url).cloned();
        Ok(response.unwrap_or(FetchResponse {
            status: 404,
            body: Vec::new(),
        }))
    }
}

// ============================================================================
// SECTION: Fake Installer
// ============================================================================

/// Installer answering canned outcomes keyed by URL.
#[derive(Default)]
pub struct FakeInstaller {
    /// Outcomes by URL.
    outcomes: Mutex<HashMap<String, Result<SignedState, InstallError>>>,
    /// Per-URL latency.
    delays: Mutex<HashMap<String, Duration>>,
    /// Installs seen, as (url, `dev_root`).
    installs: Mutex<Vec<(String, bool)>>,
}

impl FakeInstaller {
    /// Creates an installer; unknown URLs are unavailable.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an installer whose fixtures behave correctly.
    pub fn with_good_fixtures() -> Self {
        let installer = Self::new();
        installer.set(csig_canary_core::fixture::SIGNED_ADDON_FIXTURE_URL, Ok(SignedState::Signed));
        installer.set(
            csig_canary_core::fixture::UNSIGNED_ADDON_FIXTURE_URL,
            Err(InstallError::Rejected {
                code: csig_canary_core::ERROR_SIGNEDSTATE_REQUIRED,
            }),
        );
        installer
    }

    /// Sets the outcome for a URL.
    pub fn set(&self, url: &str, outcome: Result<SignedState, InstallError>) {
        self.outcomes.lock().unwrap().insert(url.to_string(), outcome);
    }

    /// Delays installs of a URL.
    pub fn delay(&self, url: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(url.to_string(), delay);
    }

    /// Returns the installs seen so far.
    pub fn installs(&self) -> Vec<(String, bool)> {
        self.installs.lock().unwrap().clone()
    }
}

#[async_trait]
impl AddonInstaller for FakeInstaller {
    async fn install(&self, url: &str, dev_root: bool) -> Result<SignedState, InstallError> {
        self.installs.lock().unwrap().push((url.to_string(), dev_root));
        let delay = self.delays.lock().unwrap().get(url).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.outcomes
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or_else(|| Err(InstallError::Unavailable(format!("no outcome for {url}"))))
    }
}

// ============================================================================
// SECTION: Audit Capture
// ============================================================================

/// Audit sink that keeps every event.
#[derive(Default)]
pub struct CapturingAuditSink {
    /// Recorded events.
    events: Mutex<Vec<AuditEvent>>,
}

impl CapturingAuditSink {
    /// Returns the recorded events.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl AuditSink for CapturingAuditSink {
    fn record(&self, event: &AuditEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

// ============================================================================
// SECTION: Collection Fixtures
// ============================================================================

/// Production settings server used by collection helpers.
pub const PROD_SERVER: &str = "https://firefox.settings.services.mozilla.com/v1";

/// Production trust root.
pub const PROD_ROOT: &str = csig_canary_core::environment::HASH_PROD;

/// Builds a records response body.
pub fn records_body(records: &Value) -> Value {
    json!({ "data": records })
}

/// Serves metadata, records, and chain for one collection on `server`.
///
/// Returns the canonical bytes the orchestrator will sign for these records.
pub fn serve_collection(
    transport: &FakeTransport,
    server: &str,
    scope: &str,
    signer_fragment: &str,
    signature: &str,
    records: &Value,
) -> Vec<u8> {
    let (bucket, collection) = scope.split_once('/').unwrap();
    let metadata_url = format!("{server}/buckets/{bucket}/collections/{collection}");
    let x5u = format!("https://cdn.example.test/chains/{collection}.pem");
    transport.serve_json(
        &metadata_url,
        &json!({
            "data": {
                "id": collection,
                "signature": {
                    "signer_id": signer_fragment,
                    "signature": signature,
                    "x5u": x5u,
                }
            }
        }),
    );
    let body = records_body(records);
    transport.serve_json(&format!("{metadata_url}/records"), &body);
    transport.serve_text(&x5u, "-----BEGIN CERTIFICATE-----\nchain\n-----END CERTIFICATE-----\n");
    let set = RecordSet::from_response(&body).unwrap();
    canonicalize(&set, set.max_last_modified().unwrap()).unwrap()
}

/// Bundles collaborators into run services.
pub fn services(
    transport: Arc<FakeTransport>,
    primitive: Arc<dyn ContentSignaturePrimitive>,
    installer: Option<Arc<FakeInstaller>>,
) -> (CanaryServices, Arc<MemorySettingsStore>, Arc<CapturingAuditSink>) {
    let settings = Arc::new(MemorySettingsStore::new());
    let audit = Arc::new(CapturingAuditSink::default());
    let services = CanaryServices {
        transport,
        primitive,
        settings: Arc::clone(&settings) as Arc<dyn csig_canary_core::SettingsStore>,
        audit: Arc::clone(&audit) as Arc<dyn AuditSink>,
        installer: installer.map(|installer| installer as Arc<dyn AddonInstaller>),
    };
    (services, settings, audit)
}
