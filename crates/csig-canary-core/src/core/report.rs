// crates/csig-canary-core/src/core/report.rs
// ============================================================================
// Module: Canary Reports
// Description: Per-target results and the aggregate run detail.
// Purpose: Define the report shapes handed to the inbound callback.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Reports are created fresh per target and are immutable once returned. A
//! target that raised carries a structured [`TargetErrorDetail`]; a target
//! whose signature simply did not validate carries `error: null`. The two
//! shapes stay distinct all the way to the serialized report.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Serialize;

use crate::core::identifiers::CollectionScope;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Origin label carried by every run detail.
pub const RUN_ORIGIN: &str = "run_test";

// ============================================================================
// SECTION: Target Stages
// ============================================================================

/// Per-target pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetStage {
    /// Not started.
    Idle,
    /// Applying the environment configuration.
    ConfiguringEnvironment,
    /// Fetching collection metadata.
    FetchingMetadata,
    /// Fetching the record list.
    FetchingRecords,
    /// Fetching the x5u certificate chain.
    FetchingCertificateChain,
    /// Merging local and remote records.
    Merging,
    /// Producing the signed bytes.
    Canonicalizing,
    /// Invoking the verifier.
    Verifying,
    /// Finished, verified or errored.
    Done,
}

impl TargetStage {
    /// Returns the stable stage label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::ConfiguringEnvironment => "configuring_environment",
            Self::FetchingMetadata => "fetching_metadata",
            Self::FetchingRecords => "fetching_records",
            Self::FetchingCertificateChain => "fetching_certificate_chain",
            Self::Merging => "merging",
            Self::Canonicalizing => "canonicalizing",
            Self::Verifying => "verifying",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for TargetStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Target Errors
// ============================================================================

/// Category of a target-local failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetErrorKind {
    /// Fetch failed, timed out, or returned a non-success status.
    Transport,
    /// Metadata or chain response was malformed.
    Metadata,
    /// Records could not be merged or canonicalized.
    Serialization,
    /// The settings store rejected the environment switch.
    Settings,
    /// The verification primitive raised.
    Verification,
    /// Telemetry was non-exclusive or held an unknown code.
    Telemetry,
}

/// Structured detail for a target that raised instead of returning a verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetErrorDetail {
    /// Bucket of the failing target.
    pub bucket: String,
    /// Collection of the failing target.
    pub collection: String,
    /// Stage the failure happened in.
    pub stage: TargetStage,
    /// Failure category.
    pub kind: TargetErrorKind,
    /// Underlying cause.
    pub cause: String,
}

impl TargetErrorDetail {
    /// Builds a detail for a target scope.
    #[must_use]
    pub fn new(
        scope: &CollectionScope,
        stage: TargetStage,
        kind: TargetErrorKind,
        cause: impl Into<String>,
    ) -> Self {
        Self {
            bucket: scope.bucket.to_string(),
            collection: scope.collection.to_string(),
            stage,
            kind,
            cause: cause.into(),
        }
    }
}

// ============================================================================
// SECTION: Target Results
// ============================================================================

/// Outcome of one verification target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationResult {
    /// Whether the signature validated.
    pub verified: bool,
    /// Step trace in execution order.
    pub messages: Vec<String>,
    /// Present only when a step raised.
    pub error: Option<TargetErrorDetail>,
}

impl VerificationResult {
    /// Builds a non-exceptional verdict.
    #[must_use]
    pub const fn verdict(verified: bool, messages: Vec<String>) -> Self {
        Self {
            verified,
            messages,
            error: None,
        }
    }

    /// Builds an errored result.
    #[must_use]
    pub const fn errored(messages: Vec<String>, error: TargetErrorDetail) -> Self {
        Self {
            verified: false,
            messages,
            error: Some(error),
        }
    }
}

/// Outcome of one addon install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddonResult {
    /// Whether the install verified as signed.
    pub result: bool,
    /// XPI URL that was installed.
    pub url: String,
}

/// Outcome of the addon fixture self-check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FixtureDetails {
    /// Signed fixture installed as signed.
    pub signed: bool,
    /// Unsigned fixture was rejected for lacking a signature.
    pub unsigned: bool,
}

impl FixtureDetails {
    /// Returns true when both fixture checks passed.
    #[must_use]
    pub const fn passed(self) -> bool {
        self.signed && self.unsigned
    }
}

// ============================================================================
// SECTION: Run Detail
// ============================================================================

/// Detail object passed to the report callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunDetail {
    /// Always [`RUN_ORIGIN`].
    pub origin: &'static str,
    /// Content-signature target results, in input order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<VerificationResult>>,
    /// Addon install results, in input order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_details: Option<Vec<AddonResult>>,
    /// Run-level trace.
    pub messages: Vec<String>,
    /// Whether the embedded fixture self-check passed.
    pub fixture_verified: bool,
    /// Per-fixture outcome for addon runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixture_verified_details: Option<FixtureDetails>,
    /// Shared-setup failure, when the run aborted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunDetail {
    /// Detail for a completed content-signature run.
    #[must_use]
    pub const fn content_signature(
        results: Vec<VerificationResult>,
        messages: Vec<String>,
        fixture_verified: bool,
    ) -> Self {
        Self {
            origin: RUN_ORIGIN,
            results: Some(results),
            result_details: None,
            messages,
            fixture_verified,
            fixture_verified_details: None,
            error: None,
        }
    }

    /// Detail for a completed addon run.
    #[must_use]
    pub const fn addons(
        result_details: Vec<AddonResult>,
        messages: Vec<String>,
        fixture: FixtureDetails,
    ) -> Self {
        Self {
            origin: RUN_ORIGIN,
            results: None,
            result_details: Some(result_details),
            messages,
            fixture_verified: fixture.passed(),
            fixture_verified_details: Some(fixture),
            error: None,
        }
    }

    /// Detail for a run aborted during shared setup.
    #[must_use]
    pub fn aborted(error: impl Into<String>, messages: Vec<String>, fixture_verified: bool) -> Self {
        Self {
            origin: RUN_ORIGIN,
            results: None,
            result_details: None,
            messages,
            fixture_verified,
            fixture_verified_details: None,
            error: Some(error.into()),
        }
    }

    /// Returns the aggregate verdict carried by this detail.
    ///
    /// A run passes only when it did not abort, the fixture verified, and
    /// every target (or install) verified.
    #[must_use]
    pub fn success(&self) -> bool {
        if self.error.is_some() || !self.fixture_verified {
            return false;
        }
        let targets_ok =
            self.results.as_ref().is_none_or(|results| results.iter().all(|r| r.verified));
        let installs_ok =
            self.result_details.as_ref().is_none_or(|details| details.iter().all(|d| d.result));
        targets_ok && installs_ok
    }
}

/// Final report as printed by the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Aggregate verdict.
    pub success: bool,
    /// Run detail.
    pub result: RunDetail,
}

// ============================================================================
// SECTION: Tests
// ============================================================================
