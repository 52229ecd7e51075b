// crates/csig-canary-core/src/runtime/entry.rs
// ============================================================================
// Module: Run Entry Point
// Description: Inbound `run(args, callback)` dispatch for both run variants.
// Purpose: Gate every run on shared setup and report exactly once.
// Dependencies: serde_json, crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! A run normalizes its arguments, resolves the environment, verifies the
//! embedded fixture, activates the environment, and only then touches remote
//! targets. Any failure before the first target is fatal for the whole run:
//! the report carries `success=false` and a top-level `error`, and no target
//! is attempted. The callback fires exactly once.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde_json::Value;

use crate::core::environment::EnvironmentKey;
use crate::core::identifiers::CollectionScope;
use crate::core::report::RunDetail;
use crate::core::report::RunReport;
use crate::interfaces::AddonInstaller;
use crate::interfaces::AuditEvent;
use crate::interfaces::AuditLevel;
use crate::interfaces::AuditSink;
use crate::interfaces::CollectionTransport;
use crate::interfaces::ContentSignaturePrimitive;
use crate::interfaces::SettingsStore;
use crate::runtime::addons::AddonHarness;
use crate::runtime::args::RunRequest;
use crate::runtime::args::normalize_args;
use crate::runtime::orchestrator::OrchestratorConfig;
use crate::runtime::orchestrator::VerificationOrchestrator;
use crate::runtime::orchestrator::VerificationTarget;
use crate::runtime::verifier::SignatureVerifier;

// ============================================================================
// SECTION: Services
// ============================================================================

/// Collaborators wired into a run.
#[derive(Clone)]
pub struct CanaryServices {
    /// HTTP transport.
    pub transport: Arc<dyn CollectionTransport>,
    /// Black-box verification primitive.
    pub primitive: Arc<dyn ContentSignaturePrimitive>,
    /// Host settings store.
    pub settings: Arc<dyn SettingsStore>,
    /// Audit sink.
    pub audit: Arc<dyn AuditSink>,
    /// Addon installer, required only for addon runs.
    pub installer: Option<Arc<dyn AddonInstaller>>,
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// Executes a run and hands the verdict to `report` exactly once.
pub async fn run<F>(args: &Value, services: &CanaryServices, config: OrchestratorConfig, report: F)
where
    F: FnOnce(bool, RunDetail),
{
    let outcome = execute(args, services, config).await;
    report(outcome.success, outcome.result);
}

/// Executes a run and returns the final report.
pub async fn execute(
    args: &Value,
    services: &CanaryServices,
    config: OrchestratorConfig,
) -> RunReport {
    let detail = match normalize_args(args) {
        Ok(RunRequest::ContentSignature {
            environment,
            targets,
        }) => run_content_signature(&environment, targets, services, config).await,
        Ok(RunRequest::Addon {
            environment,
            xpi_urls,
        }) => run_addons(&environment, &xpi_urls, services, config).await,
        Err(err) => RunDetail::aborted(err.to_string(), Vec::new(), false),
    };
    let success = detail.success();
    services.audit.record(&AuditEvent::new(
        "run_finished",
        AuditLevel::Info,
        None,
        None,
        format!("run finished with success={success}"),
    ));
    RunReport {
        success,
        result: detail,
    }
}

/// Content-signature variant: fixture gate, then every target in order.
async fn run_content_signature(
    environment: &str,
    scopes: Vec<CollectionScope>,
    services: &CanaryServices,
    config: OrchestratorConfig,
) -> RunDetail {
    let mut messages = Vec::new();
    let key = match EnvironmentKey::parse(environment) {
        Ok(key) => key,
        Err(err) => return RunDetail::aborted(err.to_string(), messages, false),
    };
    let verifier = SignatureVerifier::new(Arc::clone(&services.primitive), config.verify_timeout);
    let mut orchestrator = VerificationOrchestrator::new(
        Arc::clone(&services.transport),
        verifier,
        Arc::clone(&services.settings),
        Arc::clone(&services.audit),
        config,
    );

    let fixture_verified = match orchestrator.verify_fixture().await {
        Ok(verified) => verified,
        Err(err) => {
            messages.push(format!("fixture verification raised: {err}"));
            return RunDetail::aborted("fixture self-check raised", messages, false);
        }
    };
    messages.push(format!("verified fixture with result: {fixture_verified}"));
    if !fixture_verified {
        return RunDetail::aborted("fixture self-check failed", messages, false);
    }

    match orchestrator.switch_environment(key) {
        Ok(env) => messages.push(format!("switched environment to {} ({})", env.key, env.server_url)),
        Err(err) => return RunDetail::aborted(err.to_string(), messages, fixture_verified),
    }

    let targets: Vec<VerificationTarget> =
        scopes.into_iter().map(|scope| VerificationTarget::new(scope, key)).collect();
    messages.push(format!("testing {} collections", targets.len()));
    let results = orchestrator.verify_targets(&targets).await;
    RunDetail::content_signature(results, messages, fixture_verified)
}

/// Addon variant: requires an installer collaborator.
async fn run_addons(
    environment: &str,
    urls: &[String],
    services: &CanaryServices,
    config: OrchestratorConfig,
) -> RunDetail {
    let Some(installer) = services.installer.as_ref() else {
        return RunDetail::aborted("no addon installer configured", Vec::new(), false);
    };
    let harness = AddonHarness::new(
        Arc::clone(installer),
        Arc::clone(&services.settings),
        Arc::clone(&services.audit),
        config.step_timeout,
    );
    harness.run(environment, urls).await
}
