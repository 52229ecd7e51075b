// crates/csig-canary-core/src/runtime/orchestrator.rs
// ============================================================================
// Module: Verification Orchestrator
// Description: Per-target fetch, merge, canonicalize, verify, classify pipeline.
// Purpose: Turn collection targets into ordered, diagnosable verification results.
// Dependencies: serde_json, tokio, crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! Each target runs the stages `ConfiguringEnvironment -> FetchingMetadata ->
//! FetchingRecords -> FetchingCertificateChain -> Merging -> Canonicalizing ->
//! Verifying -> Done` strictly in order. Every stage appends to the target's
//! message trail as it completes; the trail is part of the result contract.
//!
//! The orchestrator owns the active [`EnvironmentConfig`] and the
//! [`TelemetryRecorder`]. All operations take `&mut self`, so an environment
//! switch can never overlap an in-flight fetch and telemetry always covers
//! exactly one attempt. Targets run sequentially and results keep input order.
//!
//! Target-local failures are folded into that target's result; they never
//! abort the remaining targets. Nothing is retried.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use serde_json::json;

use crate::core::canonical::canonicalize;
use crate::core::canonical::sha256_hex;
use crate::core::environment::EnvironmentConfig;
use crate::core::environment::EnvironmentKey;
use crate::core::fixture::ContentSignatureFixture;
use crate::core::identifiers::CollectionScope;
use crate::core::identifiers::SignerIdentity;
use crate::core::merge::MergeMode;
use crate::core::merge::MergedRecords;
use crate::core::merge::merge;
use crate::core::merge::reconcile;
use crate::core::metadata::CollectionMetadata;
use crate::core::records::RecordSet;
use crate::core::records::SerializationError;
use crate::core::report::TargetErrorDetail;
use crate::core::report::TargetErrorKind;
use crate::core::report::TargetStage;
use crate::core::report::VerificationResult;
use crate::core::settings::LOG_LEVEL_KEY;
use crate::core::settings::SettingChange;
use crate::core::telemetry::TelemetryRecorder;
use crate::interfaces::AuditEvent;
use crate::interfaces::AuditLevel;
use crate::interfaces::AuditSink;
use crate::interfaces::CollectionTransport;
use crate::interfaces::FetchRequest;
use crate::interfaces::FetchResponse;
use crate::interfaces::SettingsError;
use crate::interfaces::SettingsStore;
use crate::interfaces::TransportError;
use crate::runtime::verifier::SignatureVerifier;
use crate::runtime::verifier::SignedContent;
use crate::runtime::verifier::VerificationError;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Default bound on one transport call.
pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(5);

/// Default bound on one verification primitive call.
pub const DEFAULT_VERIFY_TIMEOUT: Duration = Duration::from_secs(5);

/// Orchestrator tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Bound on each fetch and each addon install.
    pub step_timeout: Duration,
    /// Bound on each verification primitive call.
    pub verify_timeout: Duration,
    /// How local and remote records are combined.
    pub merge_mode: MergeMode,
    /// Emits per-stage debug events and sets the settings log level.
    pub debug: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            step_timeout: DEFAULT_STEP_TIMEOUT,
            verify_timeout: DEFAULT_VERIFY_TIMEOUT,
            merge_mode: MergeMode::Remote,
            debug: false,
        }
    }
}

// ============================================================================
// SECTION: Targets
// ============================================================================

/// One unit of orchestrator work.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationTarget {
    /// Collection to verify.
    pub scope: CollectionScope,
    /// Environment to verify it in.
    pub environment: EnvironmentKey,
    /// Locally held records, used only in reconcile mode.
    pub local: RecordSet,
}

impl VerificationTarget {
    /// Builds a target with no local records.
    #[must_use]
    pub fn new(scope: CollectionScope, environment: EnvironmentKey) -> Self {
        Self {
            scope,
            environment,
            local: RecordSet::default(),
        }
    }
}

/// Stage-tagged failure raised inside one target.
struct StageFailure {
    /// Stage that failed.
    stage: TargetStage,
    /// Failure category.
    kind: TargetErrorKind,
    /// Underlying cause.
    cause: String,
}

impl StageFailure {
    /// Builds a failure from any displayable error.
    fn new(stage: TargetStage, kind: TargetErrorKind, cause: impl ToString) -> Self {
        Self {
            stage,
            kind,
            cause: cause.to_string(),
        }
    }
}

// ============================================================================
// SECTION: Orchestrator
// ============================================================================

/// Runs verification targets against one active environment at a time.
pub struct VerificationOrchestrator {
    /// Fetches metadata, records, and chains.
    transport: Arc<dyn CollectionTransport>,
    /// Verification adapter.
    verifier: SignatureVerifier,
    /// Host settings surface.
    settings: Arc<dyn SettingsStore>,
    /// Audit event sink.
    audit: Arc<dyn AuditSink>,
    /// Verifier outcome counters, cleared per attempt.
    telemetry: TelemetryRecorder,
    /// Active environment, replaced whole on switch.
    active: Option<Arc<EnvironmentConfig>>,
    /// Tuning.
    config: OrchestratorConfig,
}

impl VerificationOrchestrator {
    /// Creates an orchestrator with no active environment.
    #[must_use]
    pub fn new(
        transport: Arc<dyn CollectionTransport>,
        verifier: SignatureVerifier,
        settings: Arc<dyn SettingsStore>,
        audit: Arc<dyn AuditSink>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            transport,
            verifier,
            settings,
            audit,
            telemetry: TelemetryRecorder::new(),
            active: None,
            config,
        }
    }

    /// Returns the active environment, if any.
    #[must_use]
    pub fn active_environment(&self) -> Option<&EnvironmentConfig> {
        self.active.as_deref()
    }

    /// Returns the telemetry recorder owned by this orchestrator.
    #[must_use]
    pub const fn telemetry(&self) -> &TelemetryRecorder {
        &self.telemetry
    }

    /// Activates an environment.
    ///
    /// The settings batch is applied first; the active configuration is only
    /// replaced once the store accepted it.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] when the store refuses the batch.
    pub fn switch_environment(
        &mut self,
        key: EnvironmentKey,
    ) -> Result<Arc<EnvironmentConfig>, SettingsError> {
        let next = Arc::new(EnvironmentConfig::for_key(key));
        let mut changes = next.settings_changes();
        if self.config.debug {
            changes.push(SettingChange::set_str(LOG_LEVEL_KEY, "debug"));
        }
        self.settings.apply(&changes)?;
        self.active = Some(Arc::clone(&next));
        self.audit.record(&AuditEvent::new(
            "environment_switched",
            AuditLevel::Info,
            None,
            None,
            format!("switched environment to {} ({})", next.key, next.server_url),
        ));
        Ok(next)
    }

    /// Verifies the embedded fixture with cleared telemetry.
    ///
    /// # Errors
    ///
    /// Returns [`VerificationError`] when the primitive raises.
    pub async fn verify_fixture(&mut self) -> Result<bool, VerificationError> {
        let fixture = ContentSignatureFixture::embedded();
        self.telemetry.clear();
        let verified = self.verifier.verify_fixture(&fixture, &self.telemetry).await;
        self.audit.record(&AuditEvent::new(
            "fixture_verified",
            AuditLevel::Info,
            None,
            None,
            match &verified {
                Ok(value) => format!("fixture verified: {value}"),
                Err(err) => format!("fixture raised: {err}"),
            },
        ));
        verified
    }

    /// Verifies targets one after another, in input order.
    pub async fn verify_targets(
        &mut self,
        targets: &[VerificationTarget],
    ) -> Vec<VerificationResult> {
        let mut results = Vec::with_capacity(targets.len());
        for target in targets {
            results.push(self.verify_target(target).await);
        }
        results
    }

    /// Verifies one target; failures are folded into the result.
    pub async fn verify_target(&mut self, target: &VerificationTarget) -> VerificationResult {
        let mut messages = Vec::new();
        self.audit.record(&AuditEvent::new(
            "target_started",
            AuditLevel::Info,
            Some(&target.scope),
            Some(TargetStage::Idle),
            format!("verifying {} in {}", target.scope, target.environment),
        ));
        let outcome = self.run_stages(target, &mut messages).await;
        let result = match outcome {
            Ok(verified) => VerificationResult::verdict(verified, messages),
            Err(failure) => {
                let detail =
                    TargetErrorDetail::new(&target.scope, failure.stage, failure.kind, failure.cause);
                append_error_trail(&mut messages, &detail);
                VerificationResult::errored(messages, detail)
            }
        };
        self.audit.record(&AuditEvent::new(
            "target_finished",
            AuditLevel::Info,
            Some(&target.scope),
            Some(TargetStage::Done),
            format!(
                "{} verified={} errored={}",
                target.scope,
                result.verified,
                result.error.is_some()
            ),
        ));
        result
    }

    /// Runs every stage for one target, appending trace messages in order.
    async fn run_stages(
        &mut self,
        target: &VerificationTarget,
        messages: &mut Vec<String>,
    ) -> Result<bool, StageFailure> {
        let scope = &target.scope;

        self.enter(scope, TargetStage::ConfiguringEnvironment);
        self.telemetry.clear();
        let env = self.switch_environment(target.environment).map_err(|err| {
            StageFailure::new(TargetStage::ConfiguringEnvironment, TargetErrorKind::Settings, err)
        })?;

        self.enter(scope, TargetStage::FetchingMetadata);
        let metadata_url = env.metadata_url(scope);
        let metadata_body = self
            .fetch_json(FetchRequest::following(metadata_url.clone()))
            .await
            .map_err(|err| transport_failure(TargetStage::FetchingMetadata, &err))?;
        messages.push(format!("fetched metadata {metadata_url}"));
        let metadata = CollectionMetadata::from_response(&metadata_body).map_err(|err| {
            StageFailure::new(TargetStage::FetchingMetadata, TargetErrorKind::Metadata, err)
        })?;
        let signer = SignerIdentity::from_fragment(&metadata.signer_fragment).map_err(|err| {
            StageFailure::new(TargetStage::FetchingMetadata, TargetErrorKind::Metadata, err)
        })?;

        self.enter(scope, TargetStage::FetchingRecords);
        let records_url = env.records_url(scope);
        let records_body = self
            .fetch_json(FetchRequest::direct(records_url.clone()))
            .await
            .map_err(|err| transport_failure(TargetStage::FetchingRecords, &err))?;
        messages.push(format!("fetched records {records_url}"));
        let remote = RecordSet::from_response(&records_body).map_err(|err| {
            StageFailure::new(TargetStage::FetchingRecords, TargetErrorKind::Serialization, err)
        })?;
        messages.push(format!("testing {scope} with signer {signer}"));

        self.enter(scope, TargetStage::FetchingCertificateChain);
        let chain = self
            .fetch(FetchRequest::direct(metadata.x5u.clone()))
            .await
            .and_then(|response| response.text(&metadata.x5u))
            .map_err(|err| transport_failure(TargetStage::FetchingCertificateChain, &err))?;
        messages.push(format!("fetched X5U {}", metadata.x5u));

        self.enter(scope, TargetStage::Merging);
        let merged = self.merge_records(&target.local, &remote).map_err(|err| {
            StageFailure::new(TargetStage::Merging, TargetErrorKind::Serialization, err)
        })?;

        self.enter(scope, TargetStage::Canonicalizing);
        let signed = canonicalize(&merged.records, merged.timestamp).map_err(|err| {
            StageFailure::new(TargetStage::Canonicalizing, TargetErrorKind::Serialization, err)
        })?;
        messages.push(format!(
            "canonicalized {} records at {} into {} bytes (sha256 {})",
            merged.records.len(),
            merged.timestamp,
            signed.len(),
            sha256_hex(&signed)
        ));

        self.enter(scope, TargetStage::Verifying);
        let content = SignedContent {
            data: &signed,
            signature: &metadata.signature,
            certificate_chain: &chain,
            signer: &signer,
            trust_root: &env.trust_root,
        };
        let verified =
            self.verifier.verify(content, Some(scope), &self.telemetry).await.map_err(|err| {
                StageFailure::new(TargetStage::Verifying, TargetErrorKind::Verification, err)
            })?;
        messages.push(format!("verified content signature for {scope} with result: {verified}"));

        let snapshot = self.telemetry.snapshot();
        snapshot.check_exclusive().map_err(|err| {
            StageFailure::new(TargetStage::Verifying, TargetErrorKind::Telemetry, err)
        })?;
        let pretty = snapshot.pretty().map_err(|err| {
            StageFailure::new(TargetStage::Verifying, TargetErrorKind::Telemetry, err)
        })?;
        messages.push(format!("telemetry results: {pretty}"));

        self.enter(scope, TargetStage::Done);
        Ok(verified)
    }

    /// Combines local and remote records per the configured mode.
    ///
    /// An empty local set always yields the remote records as served.
    fn merge_records(
        &self,
        local: &RecordSet,
        remote: &RecordSet,
    ) -> Result<MergedRecords, SerializationError> {
        match self.config.merge_mode {
            MergeMode::Remote => merge(&RecordSet::default(), remote),
            MergeMode::Reconcile if local.is_empty() => merge(local, remote),
            MergeMode::Reconcile => reconcile(local, remote),
        }
    }

    /// Issues one bounded fetch and applies the status policy.
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, TransportError> {
        let url = request.url.clone();
        let response = bounded(self.config.step_timeout, &url, self.transport.get(request)).await?;
        response.ensure_success(&url)
    }

    /// Issues one bounded fetch and decodes the body as JSON.
    async fn fetch_json(&self, request: FetchRequest) -> Result<Value, TransportError> {
        let url = request.url.clone();
        self.fetch(request).await?.json(&url)
    }

    /// Emits a debug stage-transition event.
    fn enter(&self, scope: &CollectionScope, stage: TargetStage) {
        if self.config.debug {
            self.audit.record(&AuditEvent::new(
                "target_stage",
                AuditLevel::Debug,
                Some(scope),
                Some(stage),
                format!("{scope} entered {stage}"),
            ));
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Bounds a transport call, mapping an elapsed wait to a transport error.
async fn bounded<F>(timeout: Duration, url: &str, call: F) -> Result<FetchResponse, TransportError>
where
    F: Future<Output = Result<FetchResponse, TransportError>> + Send,
{
    tokio::time::timeout(timeout, call).await.unwrap_or_else(|_| {
        Err(TransportError::Timeout {
            url: url.to_string(),
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        })
    })
}

/// Maps a transport error to a stage failure.
fn transport_failure(stage: TargetStage, err: &TransportError) -> StageFailure {
    let kind = match err {
        TransportError::Decode {
            ..
        } => TargetErrorKind::Metadata,
        _ => TargetErrorKind::Transport,
    };
    StageFailure::new(stage, kind, err)
}

/// Appends the diagnostic trail for a raised target error.
fn append_error_trail(messages: &mut Vec<String>, detail: &TargetErrorDetail) {
    messages.push("got error with details:".to_string());
    messages.push(format!("Error with {}/{}", detail.bucket, detail.collection));
    messages.push(
        json!({
            "bucket": detail.bucket,
            "collection": detail.collection,
            "error": detail.cause,
        })
        .to_string(),
    );
}
