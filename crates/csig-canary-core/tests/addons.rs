// crates/csig-canary-core/tests/addons.rs
// ============================================================================
// Module: Addon Harness Tests
// Description: Fixture gating and concurrent install verification.
// ============================================================================
//! ## Overview
//! Addon runs must refuse to test anything when the signed or unsigned
//! fixture misbehaves, must select the signing root per environment, and must
//! report install results in input order even when installs finish out of
//! order.

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

use common::FakeInstaller;
use common::FakeTransport;
use common::RecordedPrimitive;
use common::services;
use csig_canary_core::AddonResult;
use csig_canary_core::ERROR_SIGNEDSTATE_REQUIRED;
use csig_canary_core::FixtureDetails;
use csig_canary_core::InstallError;
use csig_canary_core::OrchestratorConfig;
use csig_canary_core::SettingValue;
use csig_canary_core::SettingsStore;
use csig_canary_core::SignedState;
use csig_canary_core::execute;
use csig_canary_core::fixture::SIGNED_ADDON_FIXTURE_URL;
use csig_canary_core::fixture::UNSIGNED_ADDON_FIXTURE_URL;
use csig_canary_core::settings::ADDON_DEV_ROOT_KEY;
use serde_json::json;

const SLOW_XPI: &str = "https://addons.example.test/slow.xpi";
const FAST_XPI: &str = "https://addons.example.test/fast.xpi";
const UNSIGNED_XPI: &str = "https://addons.example.test/unsigned.xpi";

fn config() -> OrchestratorConfig {
    OrchestratorConfig {
        step_timeout: Duration::from_secs(5),
        ..OrchestratorConfig::default()
    }
}

#[tokio::test(start_paused = true)]
async fn installs_run_concurrently_and_report_in_input_order() {
    let installer = Arc::new(FakeInstaller::with_good_fixtures());
    installer.set(SLOW_XPI, Ok(SignedState::Signed));
    installer.delay(SLOW_XPI, Duration::from_secs(3));
    installer.set(FAST_XPI, Ok(SignedState::Signed));
    installer.set(UNSIGNED_XPI, Err(InstallError::Rejected {
        code: ERROR_SIGNEDSTATE_REQUIRED,
    }));
    let (services, settings, _) = services(
        Arc::new(FakeTransport::new()),
        Arc::new(RecordedPrimitive::new()),
        Some(Arc::clone(&installer)),
    );
    let args = json!({
        "env": "stage",
        "xpi_urls": [SLOW_XPI, FAST_XPI, UNSIGNED_XPI],
    });

    let started = tokio::time::Instant::now();
    let report = execute(&args, &services, config()).await;

    assert!(started.elapsed() < Duration::from_secs(4));
    assert!(!report.success);
    let detail = report.result;
    assert!(detail.fixture_verified);
    assert_eq!(detail.fixture_verified_details, Some(FixtureDetails {
        signed: true,
        unsigned: true,
    }));
    assert_eq!(detail.result_details.unwrap(), vec![
        AddonResult {
            result: true,
            url: SLOW_XPI.to_string(),
        },
        AddonResult {
            result: true,
            url: FAST_XPI.to_string(),
        },
        AddonResult {
            result: false,
            url: UNSIGNED_XPI.to_string(),
        },
    ]);
    assert!(detail.messages.contains(&"testing 3 XPIs".to_string()));
    assert!(detail.messages.contains(&"verified installs for 2 of 3 provided addons".to_string()));
    assert_eq!(settings.get(ADDON_DEV_ROOT_KEY).unwrap(), Some(SettingValue::Bool(true)));
    let installs = installer.installs();
    assert!(installs.contains(&(SIGNED_ADDON_FIXTURE_URL.to_string(), false)));
    assert!(installs.contains(&(FAST_XPI.to_string(), true)));
}

#[tokio::test]
async fn all_signed_installs_succeed_in_prod() {
    let installer = Arc::new(FakeInstaller::with_good_fixtures());
    installer.set(FAST_XPI, Ok(SignedState::Signed));
    let (services, settings, _) = services(
        Arc::new(FakeTransport::new()),
        Arc::new(RecordedPrimitive::new()),
        Some(Arc::clone(&installer)),
    );
    let args = json!({ "env": { "autograph_env": "prod" }, "xpi_urls": FAST_XPI });

    let report = execute(&args, &services, config()).await;

    assert!(report.success);
    assert_eq!(settings.get(ADDON_DEV_ROOT_KEY).unwrap(), Some(SettingValue::Bool(false)));
    let serialized = serde_json::to_value(&report).unwrap();
    assert_eq!(serialized["result"]["result_details"][0]["url"], json!(FAST_XPI));
    assert_eq!(serialized["result"]["fixture_verified_details"]["unsigned"], json!(true));
    assert!(serialized["result"].get("results").is_none());
}

#[tokio::test]
async fn misbehaving_unsigned_fixture_aborts_the_run() {
    let installer = Arc::new(FakeInstaller::with_good_fixtures());
    installer.set(UNSIGNED_ADDON_FIXTURE_URL, Ok(SignedState::Missing));
    installer.set(FAST_XPI, Ok(SignedState::Signed));
    let (services, _, _) = services(
        Arc::new(FakeTransport::new()),
        Arc::new(RecordedPrimitive::new()),
        Some(Arc::clone(&installer)),
    );
    let args = json!({ "env": "prod", "xpi_urls": FAST_XPI });

    let report = execute(&args, &services, config()).await;

    assert!(!report.success);
    let detail = report.result;
    assert!(!detail.fixture_verified);
    assert_eq!(detail.fixture_verified_details, Some(FixtureDetails {
        signed: true,
        unsigned: false,
    }));
    assert_eq!(detail.result_details, None);
    assert!(detail.messages.contains(&"unsigned addon test failed".to_string()));
    assert!(!installer.installs().iter().any(|(url, _)| url == FAST_XPI));
}

#[tokio::test]
async fn unsigned_fixture_must_fail_with_signing_error() {
    let installer = Arc::new(FakeInstaller::with_good_fixtures());
    installer.set(
        UNSIGNED_ADDON_FIXTURE_URL,
        Err(InstallError::Unavailable("network down".to_string())),
    );
    let (services, _, _) = services(
        Arc::new(FakeTransport::new()),
        Arc::new(RecordedPrimitive::new()),
        Some(installer),
    );

    let report = execute(&json!({ "env": "prod", "xpi_urls": FAST_XPI }), &services, config()).await;

    assert!(!report.success);
    assert_eq!(report.result.fixture_verified_details.map(|details| details.unsigned), Some(false));
}

#[tokio::test]
async fn non_addon_environment_aborts_after_fixtures() {
    let installer = Arc::new(FakeInstaller::with_good_fixtures());
    let (services, _, _) = services(
        Arc::new(FakeTransport::new()),
        Arc::new(RecordedPrimitive::new()),
        Some(installer),
    );

    let report =
        execute(&json!({ "env": "local", "xpi_urls": FAST_XPI }), &services, config()).await;

    assert!(!report.success);
    assert!(report.result.fixture_verified);
    assert_eq!(report.result.error.as_deref(), Some("unknown environment: \"local\""));
}

#[tokio::test(start_paused = true)]
async fn stalled_install_times_out() {
    let installer = Arc::new(FakeInstaller::with_good_fixtures());
    installer.set(SLOW_XPI, Ok(SignedState::Signed));
    installer.delay(SLOW_XPI, Duration::from_secs(60));
    let (services, _, _) = services(
        Arc::new(FakeTransport::new()),
        Arc::new(RecordedPrimitive::new()),
        Some(installer),
    );

    let report = execute(&json!({ "env": "prod", "xpi_urls": SLOW_XPI }), &services, config()).await;

    assert!(!report.success);
    let detail = report.result;
    assert!(!detail.result_details.unwrap()[0].result);
    assert!(detail.messages.iter().any(|message| message.contains("timed out after 5000 ms")));
}

#[tokio::test]
async fn missing_installer_aborts_addon_runs() {
    let (services, _, _) =
        services(Arc::new(FakeTransport::new()), Arc::new(RecordedPrimitive::new()), None);

    let report = execute(&json!({ "env": "prod", "xpi_urls": FAST_XPI }), &services, config()).await;

    assert!(!report.success);
    assert_eq!(report.result.error.as_deref(), Some("no addon installer configured"));
}
