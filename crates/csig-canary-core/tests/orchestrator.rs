// crates/csig-canary-core/tests/orchestrator.rs
// ============================================================================
// Module: Verification Orchestrator Tests
// Description: End-to-end content-signature runs against fake collaborators.
// ============================================================================
//! ## Overview
//! Runs drive the real orchestrator through `execute` with a fake transport,
//! a recorded primitive, and an in-memory settings store. Assertions cover
//! result ordering, error folding per stage, bounded waits, and the message
//! trail contract.

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
use std::sync::Mutex;
use std::time::Duration;

use common::CapturingAuditSink;
use common::DoubleCountingPrimitive;
use common::FakeTransport;
use common::PROD_ROOT;
use common::PROD_SERVER;
use common::RecordedPrimitive;
use common::serve_collection;
use common::services;
use csig_canary_core::AuditSink;
use csig_canary_core::CollectionScope;
use csig_canary_core::CollectionTransport;
use csig_canary_core::ContentSignaturePrimitive;
use csig_canary_core::EnvironmentKey;
use csig_canary_core::FetchRequest;
use csig_canary_core::MemorySettingsStore;
use csig_canary_core::MergeMode;
use csig_canary_core::OrchestratorConfig;
use csig_canary_core::RecordSet;
use csig_canary_core::SettingValue;
use csig_canary_core::SettingsStore;
use csig_canary_core::SignatureVerifier;
use csig_canary_core::TargetErrorKind;
use csig_canary_core::TargetStage;
use csig_canary_core::VerificationOrchestrator;
use csig_canary_core::VerificationTarget;
use csig_canary_core::canonicalize;
use csig_canary_core::execute;
use csig_canary_core::reconcile;
use csig_canary_core::run;
use csig_canary_core::settings::LOG_LEVEL_KEY;
use csig_canary_core::settings::SETTINGS_SERVER_KEY;
use csig_canary_core::sha256_hex;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Helpers
// ============================================================================

const ONECRL_SIGNER: &str = "onecrl.content-signature.mozilla.org";

fn onecrl_records() -> Value {
    json!([
        { "id": "a", "last_modified": 1500, "serialNumber": "AQ==" },
        { "id": "b", "last_modified": 1700, "serialNumber": "Ag==" },
    ])
}

fn cfr_records() -> Value {
    json!([{ "id": "cfr-1", "last_modified": 42, "enabled": true }])
}

fn config() -> OrchestratorConfig {
    OrchestratorConfig {
        step_timeout: Duration::from_secs(1),
        ..OrchestratorConfig::default()
    }
}

fn args(collections: &str) -> Value {
    json!({ "env": "prod", "collections": collections })
}

// ============================================================================
// SECTION: Ordered Results
// ============================================================================

#[tokio::test]
async fn mixed_verdicts_keep_input_order_and_fail_the_run() {
    let transport = Arc::new(FakeTransport::new());
    let primitive = Arc::new(RecordedPrimitive::accepting_fixture());
    let onecrl = serve_collection(
        &transport,
        PROD_SERVER,
        "security-state/onecrl",
        "onecrl",
        "sig-onecrl",
        &onecrl_records(),
    );
    serve_collection(&transport, PROD_SERVER, "main/cfr", "remote-settings", "sig-cfr", &cfr_records());
    primitive.accept(&onecrl, "sig-onecrl", ONECRL_SIGNER, PROD_ROOT);
    let (services, _, _) = services(Arc::clone(&transport), primitive, None);

    let report = execute(&args("security-state/onecrl, main/cfr"), &services, config()).await;

    assert!(!report.success);
    let detail = report.result;
    assert!(detail.fixture_verified);
    assert_eq!(detail.error, None);
    let results = detail.results.unwrap();
    assert_eq!(results.len(), 2);
    assert!(results[0].verified);
    assert_eq!(results[0].error, None);
    assert!(!results[1].verified);
    assert_eq!(results[1].error, None);
    assert_eq!(
        results[1].messages.last().unwrap(),
        "telemetry results: verification: invalid (error: invalid)"
    );
    assert_eq!(detail.messages, vec![
        "verified fixture with result: true".to_string(),
        format!("switched environment to prod ({PROD_SERVER})"),
        "testing 2 collections".to_string(),
    ]);
}

#[tokio::test]
async fn all_verified_targets_make_the_run_succeed() {
    let transport = Arc::new(FakeTransport::new());
    let primitive = Arc::new(RecordedPrimitive::accepting_fixture());
    let onecrl = serve_collection(
        &transport,
        PROD_SERVER,
        "security-state/onecrl",
        "onecrl",
        "sig-onecrl",
        &onecrl_records(),
    );
    primitive.accept(&onecrl, "sig-onecrl", ONECRL_SIGNER, PROD_ROOT);
    let (services, settings, _) = services(Arc::clone(&transport), primitive, None);

    let report = execute(&args("security-state/onecrl"), &services, config()).await;

    assert!(report.success);
    assert_eq!(
        settings.get(SETTINGS_SERVER_KEY).unwrap(),
        Some(SettingValue::Str(PROD_SERVER.to_string()))
    );
    let serialized = serde_json::to_value(&report).unwrap();
    assert_eq!(serialized["success"], json!(true));
    assert_eq!(serialized["result"]["origin"], json!("run_test"));
    assert_eq!(serialized["result"]["results"][0]["verified"], json!(true));
    assert_eq!(serialized["result"]["results"][0]["error"], Value::Null);
}

#[tokio::test]
async fn trail_lists_every_stage_in_order() {
    let transport = Arc::new(FakeTransport::new());
    let primitive = Arc::new(RecordedPrimitive::accepting_fixture());
    let signed = serve_collection(
        &transport,
        PROD_SERVER,
        "security-state/onecrl",
        "onecrl",
        "sig-onecrl",
        &onecrl_records(),
    );
    primitive.accept(&signed, "sig-onecrl", ONECRL_SIGNER, PROD_ROOT);
    let (services, _, _) = services(Arc::clone(&transport), Arc::clone(&primitive) as Arc<dyn ContentSignaturePrimitive>, None);

    let report = execute(&args("security-state/onecrl"), &services, config()).await;

    let metadata_url = format!("{PROD_SERVER}/buckets/security-state/collections/onecrl");
    let results = report.result.results.unwrap();
    assert_eq!(results[0].messages, vec![
        format!("fetched metadata {metadata_url}"),
        format!("fetched records {metadata_url}/records"),
        format!("testing security-state/onecrl with signer {ONECRL_SIGNER}"),
        "fetched X5U https://cdn.example.test/chains/onecrl.pem".to_string(),
        format!(
            "canonicalized 2 records at 1700 into {} bytes (sha256 {})",
            signed.len(),
            sha256_hex(&signed)
        ),
        "verified content signature for security-state/onecrl with result: true".to_string(),
        "telemetry results: verification: valid (error: none)".to_string(),
    ]);
    let requests = transport.requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[0], FetchRequest::following(metadata_url.clone()));
    assert_eq!(requests[1], FetchRequest::direct(format!("{metadata_url}/records")));
    assert!(!requests[2].follow_redirects);
    let calls = primitive.calls();
    assert_eq!(calls.last().unwrap().1, "p384ecdsa=sig-onecrl");
}

// ============================================================================
// SECTION: Error Folding
// ============================================================================

#[tokio::test]
async fn missing_collection_is_folded_into_its_result() {
    let transport = Arc::new(FakeTransport::new());
    let primitive = Arc::new(RecordedPrimitive::accepting_fixture());
    let cfr =
        serve_collection(&transport, PROD_SERVER, "main/cfr", "remote-settings", "sig-cfr", &cfr_records());
    primitive.accept(&cfr, "sig-cfr", "remote-settings.content-signature.mozilla.org", PROD_ROOT);
    let (services, _, _) = services(Arc::clone(&transport), primitive, None);

    let report = execute(&args("security-state/missing,main/cfr"), &services, config()).await;

    assert!(!report.success);
    let results = report.result.results.unwrap();
    let failed = &results[0];
    assert!(!failed.verified);
    let error = failed.error.as_ref().unwrap();
    assert_eq!(error.bucket, "security-state");
    assert_eq!(error.collection, "missing");
    assert_eq!(error.stage, TargetStage::FetchingMetadata);
    assert_eq!(error.kind, TargetErrorKind::Transport);
    assert!(error.cause.contains("404"));
    assert_eq!(failed.messages[0], "got error with details:");
    assert_eq!(failed.messages[1], "Error with security-state/missing");
    let trail: Value = serde_json::from_str(&failed.messages[2]).unwrap();
    assert_eq!(trail["bucket"], json!("security-state"));
    assert_eq!(trail["collection"], json!("missing"));
    assert_eq!(trail["error"], json!(error.cause));
    assert!(results[1].verified);
}

#[tokio::test]
async fn raising_primitive_is_reported_with_verifying_stage() {
    let transport = Arc::new(FakeTransport::new());
    let primitive = Arc::new(RecordedPrimitive::accepting_fixture());
    serve_collection(
        &transport,
        PROD_SERVER,
        "security-state/onecrl",
        "onecrl",
        "sig-raise",
        &onecrl_records(),
    );
    primitive.raise_on("sig-raise");
    let (services, _, _) = services(Arc::clone(&transport), primitive, None);

    let report = execute(&args("security-state/onecrl"), &services, config()).await;

    let results = report.result.results.unwrap();
    let error = results[0].error.as_ref().unwrap();
    assert_eq!(error.stage, TargetStage::Verifying);
    assert_eq!(error.kind, TargetErrorKind::Verification);
    assert!(error.cause.contains("InvalidSignatureError"));
    assert!(!results[0].verified);
}

#[tokio::test]
async fn redirected_records_fetch_is_a_transport_error() {
    let transport = Arc::new(FakeTransport::new());
    let primitive = Arc::new(RecordedPrimitive::accepting_fixture());
    serve_collection(
        &transport,
        PROD_SERVER,
        "security-state/onecrl",
        "onecrl",
        "sig-onecrl",
        &onecrl_records(),
    );
    let records_url = format!("{PROD_SERVER}/buckets/security-state/collections/onecrl/records");
    transport.serve(&records_url, 302, Vec::new());
    let (services, _, _) = services(Arc::clone(&transport), primitive, None);

    let report = execute(&args("security-state/onecrl"), &services, config()).await;

    let results = report.result.results.unwrap();
    let error = results[0].error.as_ref().unwrap();
    assert_eq!(error.stage, TargetStage::FetchingRecords);
    assert_eq!(error.kind, TargetErrorKind::Transport);
    assert!(error.cause.contains("redirected"));
}

#[tokio::test]
async fn malformed_metadata_is_a_metadata_error() {
    let transport = Arc::new(FakeTransport::new());
    let primitive = Arc::new(RecordedPrimitive::accepting_fixture());
    let metadata_url = format!("{PROD_SERVER}/buckets/main/collections/cfr");
    transport.serve_json(&metadata_url, &json!({ "data": { "id": "cfr" } }));
    let (services, _, _) = services(Arc::clone(&transport), primitive, None);

    let report = execute(&args("main/cfr"), &services, config()).await;

    let results = report.result.results.unwrap();
    let error = results[0].error.as_ref().unwrap();
    assert_eq!(error.stage, TargetStage::FetchingMetadata);
    assert_eq!(error.kind, TargetErrorKind::Metadata);
    assert_eq!(results[0].messages[0], format!("fetched metadata {metadata_url}"));
}

#[tokio::test]
async fn invalid_signer_fragment_is_rejected() {
    let transport = Arc::new(FakeTransport::new());
    let primitive = Arc::new(RecordedPrimitive::accepting_fixture());
    serve_collection(&transport, PROD_SERVER, "main/cfr", "evil.example.com", "sig", &cfr_records());
    let (services, _, _) = services(Arc::clone(&transport), Arc::clone(&primitive) as Arc<dyn ContentSignaturePrimitive>, None);

    let report = execute(&args("main/cfr"), &services, config()).await;

    let results = report.result.results.unwrap();
    let error = results[0].error.as_ref().unwrap();
    assert_eq!(error.kind, TargetErrorKind::Metadata);
    assert_eq!(error.stage, TargetStage::FetchingMetadata);
    assert_eq!(primitive.calls().len(), 1);
    let records_url = format!("{PROD_SERVER}/buckets/main/collections/cfr/records");
    assert!(transport.requests().iter().all(|request| request.url != records_url));
}

#[tokio::test(start_paused = true)]
async fn stalled_fetch_times_out_and_later_targets_still_run() {
    let transport = Arc::new(FakeTransport::new());
    let primitive = Arc::new(RecordedPrimitive::accepting_fixture());
    serve_collection(
        &transport,
        PROD_SERVER,
        "security-state/onecrl",
        "onecrl",
        "sig-onecrl",
        &onecrl_records(),
    );
    let cfr =
        serve_collection(&transport, PROD_SERVER, "main/cfr", "remote-settings", "sig-cfr", &cfr_records());
    primitive.accept(&cfr, "sig-cfr", "remote-settings.content-signature.mozilla.org", PROD_ROOT);
    let records_url = format!("{PROD_SERVER}/buckets/security-state/collections/onecrl/records");
    transport.hang(&records_url);
    let (services, _, _) = services(Arc::clone(&transport), primitive, None);

    let report = execute(&args("security-state/onecrl,main/cfr"), &services, config()).await;

    let results = report.result.results.unwrap();
    let error = results[0].error.as_ref().unwrap();
    assert_eq!(error.kind, TargetErrorKind::Transport);
    assert_eq!(error.cause, format!("request to {records_url} timed out after 1000 ms"));
    assert!(results[1].verified);
}

#[tokio::test]
async fn double_counting_primitive_is_a_telemetry_error() {
    let transport = Arc::new(FakeTransport::new());
    serve_collection(
        &transport,
        PROD_SERVER,
        "security-state/onecrl",
        "onecrl",
        "sig-onecrl",
        &onecrl_records(),
    );
    let (services, _, _) = services(Arc::clone(&transport), Arc::new(DoubleCountingPrimitive), None);

    let report = execute(&args("security-state/onecrl"), &services, config()).await;

    assert!(!report.success);
    let results = report.result.results.unwrap();
    let error = results[0].error.as_ref().unwrap();
    assert_eq!(error.kind, TargetErrorKind::Telemetry);
    assert!(!results[0].verified);
}

// ============================================================================
// SECTION: Run Gating
// ============================================================================

#[tokio::test]
async fn failed_fixture_aborts_before_any_fetch() {
    let transport = Arc::new(FakeTransport::new());
    let (services, _, _) = services(Arc::clone(&transport), Arc::new(RecordedPrimitive::new()), None);

    let report = execute(&args("security-state/onecrl"), &services, config()).await;

    assert!(!report.success);
    assert!(!report.result.fixture_verified);
    assert_eq!(report.result.error.as_deref(), Some("fixture self-check failed"));
    assert_eq!(report.result.results, None);
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn raising_fixture_aborts_the_run() {
    let transport = Arc::new(FakeTransport::new());
    let primitive = Arc::new(RecordedPrimitive::new());
    primitive.raise_on(csig_canary_core::fixture::FIXTURE_SIGNATURE);
    let (services, _, _) = services(Arc::clone(&transport), primitive, None);

    let report = execute(&args("security-state/onecrl"), &services, config()).await;

    assert_eq!(report.result.error.as_deref(), Some("fixture self-check raised"));
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn unknown_environment_aborts_before_the_fixture() {
    let transport = Arc::new(FakeTransport::new());
    let primitive = Arc::new(RecordedPrimitive::accepting_fixture());
    let (services, _, audit) = services(Arc::clone(&transport), Arc::clone(&primitive) as Arc<dyn ContentSignaturePrimitive>, None);

    let args = json!({ "env": "nightly", "collections": "main/cfr" });
    let report = execute(&args, &services, config()).await;

    assert!(!report.success);
    assert_eq!(report.result.error.as_deref(), Some("unknown environment: \"nightly\""));
    assert!(primitive.calls().is_empty());
    assert!(transport.requests().is_empty());
    assert_eq!(audit.events().last().unwrap().event, "run_finished");
}

#[tokio::test]
async fn malformed_arguments_abort_the_run() {
    let transport = Arc::new(FakeTransport::new());
    let (services, _, _) =
        services(Arc::clone(&transport), Arc::new(RecordedPrimitive::accepting_fixture()), None);

    let report = execute(&json!({ "env": "prod" }), &services, config()).await;

    assert!(!report.success);
    assert_eq!(
        report.result.error.as_deref(),
        Some("run arguments need collections or xpi_urls")
    );
}

#[tokio::test]
async fn run_reports_exactly_once() {
    let transport = Arc::new(FakeTransport::new());
    let (services, _, _) =
        services(Arc::clone(&transport), Arc::new(RecordedPrimitive::accepting_fixture()), None);
    let calls = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&calls);

    run(&args("main/cfr"), &services, config(), move |success, detail| {
        sink.lock().unwrap().push((success, detail.results.map(|results| results.len())));
    })
    .await;

    assert_eq!(calls.lock().unwrap().as_slice(), &[(false, Some(1))]);
}

// ============================================================================
// SECTION: Orchestrator Direct
// ============================================================================

fn orchestrator(
    transport: &Arc<FakeTransport>,
    primitive: Arc<dyn ContentSignaturePrimitive>,
    config: OrchestratorConfig,
) -> (VerificationOrchestrator, Arc<MemorySettingsStore>, Arc<CapturingAuditSink>) {
    let settings = Arc::new(MemorySettingsStore::new());
    let audit = Arc::new(CapturingAuditSink::default());
    let verifier = SignatureVerifier::new(primitive, config.step_timeout);
    let orchestrator = VerificationOrchestrator::new(
        Arc::clone(transport) as Arc<dyn CollectionTransport>,
        verifier,
        Arc::clone(&settings) as Arc<dyn SettingsStore>,
        Arc::clone(&audit) as Arc<dyn AuditSink>,
        config,
    );
    (orchestrator, settings, audit)
}

#[tokio::test]
async fn reconcile_mode_signs_the_merged_view() {
    let transport = Arc::new(FakeTransport::new());
    let primitive = Arc::new(RecordedPrimitive::new());
    let remote = json!([
        { "id": "a", "last_modified": 1800, "serialNumber": "updated" },
        { "id": "c", "last_modified": 1900, "deleted": true },
    ]);
    serve_collection(
        &transport,
        PROD_SERVER,
        "security-state/onecrl",
        "onecrl",
        "sig-merged",
        &remote,
    );
    let local = RecordSet::from_response(&json!({ "data": [
        { "id": "a", "last_modified": 1500, "_status": "synced" },
        { "id": "b", "last_modified": 1600, "_status": "synced" },
        { "id": "c", "last_modified": 1700 },
    ] }))
    .unwrap();
    let remote_set = RecordSet::from_response(&json!({ "data": remote })).unwrap();
    let merged = reconcile(&local, &remote_set).unwrap();
    let expected = canonicalize(&merged.records, merged.timestamp).unwrap();
    primitive.accept(&expected, "sig-merged", ONECRL_SIGNER, PROD_ROOT);

    let config = OrchestratorConfig {
        merge_mode: MergeMode::Reconcile,
        ..config()
    };
    let (mut orchestrator, _, _) = orchestrator(&transport, Arc::clone(&primitive) as Arc<dyn ContentSignaturePrimitive>, config);
    let target = VerificationTarget {
        local,
        ..VerificationTarget::new(
            CollectionScope::parse("security-state/onecrl").unwrap(),
            EnvironmentKey::parse("prod").unwrap(),
        )
    };

    let result = orchestrator.verify_target(&target).await;

    assert!(result.verified, "{:?}", result.messages);
    assert_eq!(merged.records.len(), 2);
    assert_eq!(merged.timestamp, 1800);
    assert!(result.messages.iter().any(|message| message.starts_with("canonicalized 2 records at 1800")));
}

#[tokio::test]
async fn reconcile_mode_keeps_remote_order_without_local_records() {
    let transport = Arc::new(FakeTransport::new());
    let primitive = Arc::new(RecordedPrimitive::new());
    let remote = json!([
        { "id": "b", "last_modified": 2 },
        { "id": "a", "last_modified": 1 },
        { "last_modified": 1, "note": "no id" },
    ]);
    let served = serve_collection(
        &transport,
        PROD_SERVER,
        "security-state/onecrl",
        "onecrl",
        "sig-served",
        &remote,
    );
    primitive.accept(&served, "sig-served", ONECRL_SIGNER, PROD_ROOT);
    let config = OrchestratorConfig {
        merge_mode: MergeMode::Reconcile,
        ..config()
    };
    let (mut orchestrator, _, _) =
        orchestrator(&transport, Arc::clone(&primitive) as Arc<dyn ContentSignaturePrimitive>, config);
    let target = VerificationTarget::new(
        CollectionScope::parse("security-state/onecrl").unwrap(),
        EnvironmentKey::parse("prod").unwrap(),
    );

    let result = orchestrator.verify_target(&target).await;

    assert!(result.verified, "{:?}", result.messages);
    assert_eq!(result.error, None);
    let (input, _) = primitive.calls().last().cloned().unwrap();
    assert_eq!(input, served);
}

#[tokio::test]
async fn debug_mode_sets_log_level_and_emits_stage_events() {
    let transport = Arc::new(FakeTransport::new());
    let primitive = Arc::new(RecordedPrimitive::accepting_fixture());
    serve_collection(&transport, PROD_SERVER, "main/cfr", "remote-settings", "sig-cfr", &cfr_records());
    let config = OrchestratorConfig {
        debug: true,
        ..config()
    };
    let (mut orchestrator, settings, audit) = orchestrator(&transport, primitive, config);
    let target = VerificationTarget::new(
        CollectionScope::parse("main/cfr").unwrap(),
        EnvironmentKey::parse("stage-preview").unwrap(),
    );

    let results = orchestrator.verify_targets(std::slice::from_ref(&target)).await;

    assert_eq!(results.len(), 1);
    assert_eq!(settings.get(LOG_LEVEL_KEY).unwrap(), Some(SettingValue::Str("debug".to_string())));
    assert_eq!(orchestrator.active_environment().unwrap().buckets.default_bucket, "main-preview");
    let stages: Vec<TargetStage> = audit
        .events()
        .iter()
        .filter(|event| event.event == "target_stage")
        .filter_map(|event| event.stage)
        .collect();
    assert_eq!(stages.first(), Some(&TargetStage::ConfiguringEnvironment));
    assert!(stages.contains(&TargetStage::FetchingMetadata));
    // Stage server has nothing served, so the run stops at metadata.
    assert!(!stages.contains(&TargetStage::Verifying));
}

#[tokio::test]
async fn fixture_check_clears_previous_telemetry() {
    let transport = Arc::new(FakeTransport::new());
    let primitive = Arc::new(RecordedPrimitive::accepting_fixture());
    let (mut orchestrator, _, _) = orchestrator(&transport, primitive, config());
    orchestrator.telemetry().record_verification(1);

    assert!(orchestrator.verify_fixture().await.unwrap());

    let snapshot = orchestrator.telemetry().snapshot();
    assert!(snapshot.check_exclusive().is_ok());
    assert_eq!(snapshot.pretty().unwrap(), "verification: valid (error: none)");
}
