// crates/csig-canary-core/src/core/telemetry.rs
// ============================================================================
// Module: Telemetry Classifier
// Description: Verification outcome histograms and their named statuses.
// Purpose: Map opaque verifier outcome codes to stable, comparable statuses.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! The verification primitive reports its outcome as counts in two
//! histograms: a plain verification-status histogram and an error histogram
//! keyed by certificate/application identity. Both use the same ten codes.
//!
//! [`TelemetryRecorder`] is an explicit resource owned by one orchestrator and
//! handed to the primitive per attempt. Callers must [`TelemetryRecorder::clear`]
//! before every attempt they want to measure; the classifier assumes at most
//! one outcome per histogram and [`TelemetrySnapshot::check_exclusive`] makes a
//! violation visible instead of absorbing it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Mutex;
use std::sync::PoisonError;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Status Codes
// ============================================================================

/// Named status of a content signature verification attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SignatureStatus {
    /// No outcome was recorded.
    None,
    /// Code 0.
    Valid,
    /// Code 1.
    Invalid,
    /// Code 2.
    NoCertChain,
    /// Code 3.
    CreateContextFailedWithOtherError,
    /// Code 4.
    ExpiredCert,
    /// Code 5.
    CertNotValidYet,
    /// Code 6.
    BuildCertChainFailed,
    /// Code 7.
    EeCertForWrongHost,
    /// Code 8.
    ExtractKeyError,
    /// Code 9.
    VfyContextError,
}

impl SignatureStatus {
    /// Maps a histogram code to its status, if the code is known.
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        let status = match code {
            "0" => Self::Valid,
            "1" => Self::Invalid,
            "2" => Self::NoCertChain,
            "3" => Self::CreateContextFailedWithOtherError,
            "4" => Self::ExpiredCert,
            "5" => Self::CertNotValidYet,
            "6" => Self::BuildCertChainFailed,
            "7" => Self::EeCertForWrongHost,
            "8" => Self::ExtractKeyError,
            "9" => Self::VfyContextError,
            _ => return None,
        };
        Some(status)
    }

    /// Returns the stable status label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Valid => "valid",
            Self::Invalid => "invalid",
            Self::NoCertChain => "noCertChain",
            Self::CreateContextFailedWithOtherError => "createContextFailedWithOtherError",
            Self::ExpiredCert => "expiredCert",
            Self::CertNotValidYet => "certNotValidYet",
            Self::BuildCertChainFailed => "buildCertChainFailed",
            Self::EeCertForWrongHost => "eeCertForWrongHost",
            Self::ExtractKeyError => "extractKeyError",
            Self::VfyContextError => "vfyContextError",
        }
    }
}

impl fmt::Display for SignatureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// A histogram held a count of one for a code outside the status table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown telemetry status code: {0}")]
pub struct UnknownStatusCodeError(pub String);

/// Telemetry contract violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TelemetryError {
    /// A histogram recorded more than one outcome for one attempt.
    #[error("{histogram} histogram recorded {total} outcomes for one attempt")]
    NonExclusive {
        /// Histogram name.
        histogram: &'static str,
        /// Total count observed.
        total: u64,
    },
    /// Classification hit an unknown code.
    #[error(transparent)]
    UnknownStatusCode(#[from] UnknownStatusCodeError),
}

// ============================================================================
// SECTION: Snapshots
// ============================================================================

/// Histogram snapshot: outcome code to count.
pub type HistogramSnapshot = BTreeMap<String, u64>;

/// Keyed histogram snapshot: identity to histogram.
pub type KeyedHistogramSnapshot = BTreeMap<String, HistogramSnapshot>;

/// Both histograms captured after one attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TelemetrySnapshot {
    /// Verification status histogram.
    pub verifications: HistogramSnapshot,
    /// Error histogram keyed by identity.
    pub errors: KeyedHistogramSnapshot,
}

impl TelemetrySnapshot {
    /// Checks that each histogram recorded at most one outcome.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::NonExclusive`] for the first histogram whose
    /// counts sum to more than one.
    pub fn check_exclusive(&self) -> Result<(), TelemetryError> {
        let verifications: u64 = self.verifications.values().sum();
        if verifications > 1 {
            return Err(TelemetryError::NonExclusive {
                histogram: "verification",
                total: verifications,
            });
        }
        let errors: u64 = self.errors.values().flat_map(BTreeMap::values).sum();
        if errors > 1 {
            return Err(TelemetryError::NonExclusive {
                histogram: "error",
                total: errors,
            });
        }
        Ok(())
    }

    /// Renders `verification: <status> (error: <status>)`.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownStatusCodeError`] when either histogram holds an
    /// unknown code.
    pub fn pretty(&self) -> Result<String, UnknownStatusCodeError> {
        let verification = classify(&self.verifications)?;
        let error = classify_keyed_errors(&self.errors)?;
        Ok(format!("verification: {verification} (error: {error})"))
    }
}

// ============================================================================
// SECTION: Classification
// ============================================================================

/// Returns the status of the first code whose count is exactly one.
///
/// # Errors
///
/// Returns [`UnknownStatusCodeError`] when that code is not in the table.
pub fn classify(snapshot: &HistogramSnapshot) -> Result<SignatureStatus, UnknownStatusCodeError> {
    let Some((code, _)) = snapshot.iter().find(|(_, count)| **count == 1) else {
        return Ok(SignatureStatus::None);
    };
    SignatureStatus::from_code(code).ok_or_else(|| UnknownStatusCodeError(code.clone()))
}

/// Classifies the first populated identity of a keyed error histogram.
///
/// Only one identity is expected per attempt, so iteration order carries no
/// meaning. An empty mapping classifies as [`SignatureStatus::None`].
///
/// # Errors
///
/// Returns [`UnknownStatusCodeError`] when the histogram holds an unknown code.
pub fn classify_keyed_errors(
    snapshot: &KeyedHistogramSnapshot,
) -> Result<SignatureStatus, UnknownStatusCodeError> {
    snapshot.values().next().map_or(Ok(SignatureStatus::None), classify)
}

// ============================================================================
// SECTION: Recorder
// ============================================================================

/// Accumulates verifier outcome counts for one attempt at a time.
#[derive(Debug, Default)]
pub struct TelemetryRecorder {
    /// Histogram state.
    state: Mutex<TelemetrySnapshot>,
}

impl TelemetryRecorder {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a verification status code.
    pub fn record_verification(&self, code: u32) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        *state.verifications.entry(code.to_string()).or_insert(0) += 1;
    }

    /// Records an error code against an identity.
    pub fn record_error(&self, identity: &str, code: u32) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let histogram = state.errors.entry(identity.to_string()).or_default();
        *histogram.entry(code.to_string()).or_insert(0) += 1;
    }

    /// Resets both histograms.
    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        *state = TelemetrySnapshot::default();
    }

    /// Returns a copy of both histograms.
    #[must_use]
    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}
