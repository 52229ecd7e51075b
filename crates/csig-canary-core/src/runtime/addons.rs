// crates/csig-canary-core/src/runtime/addons.rs
// ============================================================================
// Module: Addon Signature Harness
// Description: Fixture-gated, concurrent addon install verification.
// Purpose: Check that signed XPIs install as signed in a chosen environment.
// Dependencies: tokio, serde_json, crate::interfaces
// ============================================================================

//! ## Overview
//! The harness first installs one known-signed and one known-unsigned fixture
//! XPI: the signed one must report [`SignedState::Signed`] and the unsigned
//! one must be rejected with [`ERROR_SIGNEDSTATE_REQUIRED`]. Only then does it
//! select the addon environment and install every requested URL concurrently.
//! Results are reported in input order regardless of completion order.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinSet;

use crate::core::environment::BaseEnvironment;
use crate::core::environment::EnvironmentKey;
use crate::core::environment::UnknownEnvironmentError;
use crate::core::fixture::SIGNED_ADDON_FIXTURE_URL;
use crate::core::fixture::UNSIGNED_ADDON_FIXTURE_URL;
use crate::core::report::AddonResult;
use crate::core::report::FixtureDetails;
use crate::core::report::RunDetail;
use crate::core::settings::ADDON_DEV_ROOT_KEY;
use crate::core::settings::SettingChange;
use crate::core::settings::SettingValue;
use crate::interfaces::AddonInstaller;
use crate::interfaces::AuditEvent;
use crate::interfaces::AuditLevel;
use crate::interfaces::AuditSink;
use crate::interfaces::ERROR_SIGNEDSTATE_REQUIRED;
use crate::interfaces::InstallError;
use crate::interfaces::SettingsError;
use crate::interfaces::SettingsStore;
use crate::interfaces::SignedState;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Addon environment selection failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddonEnvironmentError {
    /// Environment is not an addon environment.
    #[error(transparent)]
    Unknown(#[from] UnknownEnvironmentError),
    /// Settings store refused the change.
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

// ============================================================================
// SECTION: Environment
// ============================================================================

/// Returns the dev-root setting for an addon environment.
///
/// # Errors
///
/// Returns [`UnknownEnvironmentError`] for anything but `prod` and `stage`.
pub fn addon_dev_root(environment: &str) -> Result<bool, UnknownEnvironmentError> {
    match EnvironmentKey::parse(environment) {
        Ok(EnvironmentKey {
            base: BaseEnvironment::Prod,
            preview: false,
        }) => Ok(false),
        Ok(EnvironmentKey {
            base: BaseEnvironment::Stage,
            preview: false,
        }) => Ok(true),
        _ => Err(UnknownEnvironmentError(environment.to_string())),
    }
}

// ============================================================================
// SECTION: Harness
// ============================================================================

/// One install attempt and the trace it produced.
struct InstallCheck {
    /// Whether the install matched expectations.
    passed: bool,
    /// Trace lines for this attempt.
    messages: Vec<String>,
}

/// Runs addon fixture checks and install verification.
pub struct AddonHarness {
    /// Addon installer collaborator.
    installer: Arc<dyn AddonInstaller>,
    /// Host settings surface.
    settings: Arc<dyn SettingsStore>,
    /// Audit event sink.
    audit: Arc<dyn AuditSink>,
    /// Bound on each install.
    step_timeout: Duration,
}

impl AddonHarness {
    /// Creates a harness.
    #[must_use]
    pub fn new(
        installer: Arc<dyn AddonInstaller>,
        settings: Arc<dyn SettingsStore>,
        audit: Arc<dyn AuditSink>,
        step_timeout: Duration,
    ) -> Self {
        Self {
            installer,
            settings,
            audit,
            step_timeout,
        }
    }

    /// Applies the addon environment and returns its dev-root value.
    ///
    /// # Errors
    ///
    /// Returns [`AddonEnvironmentError`] for unknown environments or a
    /// refused settings change.
    pub fn switch_environment(&self, environment: &str) -> Result<bool, AddonEnvironmentError> {
        let dev_root = addon_dev_root(environment)?;
        self.settings.apply(&[SettingChange::set_bool(ADDON_DEV_ROOT_KEY, dev_root)])?;
        Ok(dev_root)
    }

    /// Installs both fixtures and reports which expectation held.
    pub async fn verify_fixtures(&self, messages: &mut Vec<String>) -> FixtureDetails {
        let dev_root = self.current_dev_root();
        messages.push(format!(
            "installing fixtures {SIGNED_ADDON_FIXTURE_URL} {UNSIGNED_ADDON_FIXTURE_URL}"
        ));
        let (signed, unsigned) = tokio::join!(
            check_install(
                Arc::clone(&self.installer),
                SIGNED_ADDON_FIXTURE_URL.to_string(),
                dev_root,
                true,
                self.step_timeout,
            ),
            check_install(
                Arc::clone(&self.installer),
                UNSIGNED_ADDON_FIXTURE_URL.to_string(),
                dev_root,
                false,
                self.step_timeout,
            ),
        );
        messages.extend(signed.messages);
        messages.extend(unsigned.messages);
        if !unsigned.passed {
            messages.push("unsigned addon test failed".to_string());
        }
        if !signed.passed {
            messages.push("signed addon test failed".to_string());
        }
        FixtureDetails {
            signed: signed.passed,
            unsigned: unsigned.passed,
        }
    }

    /// Installs every URL concurrently; results follow input order.
    pub async fn install_all(
        &self,
        urls: &[String],
        dev_root: bool,
        messages: &mut Vec<String>,
    ) -> Vec<AddonResult> {
        let mut tasks = JoinSet::new();
        for (index, url) in urls.iter().enumerate() {
            let installer = Arc::clone(&self.installer);
            let url = url.clone();
            let timeout = self.step_timeout;
            tasks.spawn(async move {
                (index, check_install(installer, url, dev_root, true, timeout).await)
            });
        }
        let mut checks: Vec<Option<InstallCheck>> = urls.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            if let Ok((index, check)) = joined
                && let Some(slot) = checks.get_mut(index)
            {
                *slot = Some(check);
            }
        }
        urls.iter()
            .zip(checks)
            .map(|(url, check)| {
                let check = check.unwrap_or_else(|| InstallCheck {
                    passed: false,
                    messages: vec![format!("install task for {url} did not complete")],
                });
                messages.extend(check.messages);
                AddonResult {
                    result: check.passed,
                    url: url.clone(),
                }
            })
            .collect()
    }

    /// Runs the complete addon flow and returns the run detail.
    pub async fn run(&self, environment: &str, urls: &[String]) -> RunDetail {
        let mut messages = Vec::new();
        let fixture = self.verify_fixtures(&mut messages).await;
        let details = serde_json::to_string(&fixture).unwrap_or_default();
        messages.push(format!("verified fixtures {} with details: {details}", fixture.passed()));
        self.record("addon_fixtures", format!("fixtures passed: {}", fixture.passed()));
        if !fixture.passed() {
            return aborted(
                "addon fixture self-check failed".to_string(),
                messages,
                fixture,
            );
        }
        let dev_root = match self.switch_environment(environment) {
            Ok(dev_root) => dev_root,
            Err(err) => return aborted(err.to_string(), messages, fixture),
        };
        messages.push(format!("testing {} XPIs", urls.len()));
        let results = self.install_all(urls, dev_root, &mut messages).await;
        let verified = results.iter().filter(|result| result.result).count();
        messages.push(format!("verified installs for {verified} of {} provided addons", urls.len()));
        self.record("addon_installs", format!("{verified} of {} installs verified", urls.len()));
        RunDetail::addons(results, messages, fixture)
    }

    /// Reads the current dev-root setting, defaulting to the release root.
    fn current_dev_root(&self) -> bool {
        matches!(self.settings.get(ADDON_DEV_ROOT_KEY), Ok(Some(SettingValue::Bool(true))))
    }

    /// Records an info audit event.
    fn record(&self, event: &'static str, message: String) {
        self.audit.record(&AuditEvent::new(event, AuditLevel::Info, None, None, message));
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds an aborted addon detail that still carries fixture outcomes.
fn aborted(error: String, messages: Vec<String>, fixture: FixtureDetails) -> RunDetail {
    let mut detail = RunDetail::aborted(error, messages, fixture.passed());
    detail.fixture_verified_details = Some(fixture);
    detail
}

/// Installs one XPI and compares the outcome with the expectation.
///
/// An install expected to pass must report a signed state of `signed`. An
/// install expected to fail must be rejected with `signedStateRequired`.
async fn check_install(
    installer: Arc<dyn AddonInstaller>,
    url: String,
    dev_root: bool,
    should_pass: bool,
    timeout: Duration,
) -> InstallCheck {
    let outcome = tokio::time::timeout(timeout, installer.install(&url, dev_root))
        .await
        .unwrap_or_else(|_| {
            Err(InstallError::Unavailable(format!(
                "install timed out after {} ms",
                timeout.as_millis()
            )))
        });
    let mut messages = Vec::new();
    let passed = match (should_pass, outcome) {
        (true, Ok(state)) => {
            messages.push(format!("Expected to verify {url}; comparing signedState"));
            state == SignedState::Signed
        }
        (true, Err(err)) => {
            messages.push(format!("{url} should pass but has thrown: {err}"));
            false
        }
        (false, Ok(_)) => {
            messages.push(format!("{url} not expected to verify"));
            false
        }
        (false, Err(InstallError::Rejected {
            code,
        })) => code == ERROR_SIGNEDSTATE_REQUIRED,
        (false, Err(err)) => {
            messages.push(format!("{url} failed without a signing error: {err}"));
            false
        }
    };
    InstallCheck {
        passed,
        messages,
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
