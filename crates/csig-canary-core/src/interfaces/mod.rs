// crates/csig-canary-core/src/interfaces/mod.rs
// ============================================================================
// Module: Canary Interfaces
// Description: Collaborator contracts for transport, verification, and hosts.
// Purpose: Keep the pipeline independent of HTTP clients and verifier hosts.
// Dependencies: async-trait, serde, thiserror, crate::core
// ============================================================================

//! ## Overview
//! Every external collaborator sits behind a trait here: the HTTP transport,
//! the black-box content-signature primitive, the host settings store, the
//! addon installer, and the audit sink. Implementations must fail closed and
//! must never retry on their own; the orchestrator bounds every wait.
//!
//! Security posture: transport responses and metadata are untrusted input.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::identifiers::CollectionScope;
use crate::core::identifiers::SignerIdentity;
use crate::core::identifiers::TrustRootFingerprint;
use crate::core::report::TargetStage;
use crate::core::settings::SettingChange;
use crate::core::settings::SettingValue;
use crate::core::telemetry::TelemetryRecorder;

// ============================================================================
// SECTION: Collection Transport
// ============================================================================

/// One GET request issued by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Absolute URL.
    pub url: String,
    /// Whether the transport may follow redirects.
    pub follow_redirects: bool,
}

impl FetchRequest {
    /// Request that follows redirects (metadata endpoint).
    #[must_use]
    pub fn following(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            follow_redirects: true,
        }
    }

    /// Request that must not follow redirects.
    #[must_use]
    pub fn direct(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            follow_redirects: false,
        }
    }
}

/// Raw response returned by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body bytes.
    pub body: Vec<u8>,
}

impl FetchResponse {
    /// Fails unless the status is 2xx; 3xx statuses are reported as redirects.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Redirect`] or [`TransportError::Status`].
    pub fn ensure_success(self, url: &str) -> Result<Self, TransportError> {
        match self.status {
            200..=299 => Ok(self),
            300..=399 => Err(TransportError::Redirect {
                url: url.to_string(),
                status: self.status,
            }),
            status => Err(TransportError::Status {
                url: url.to_string(),
                status,
            }),
        }
    }

    /// Decodes the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Decode`] when the body is not valid JSON.
    pub fn json(&self, url: &str) -> Result<Value, TransportError> {
        serde_json::from_slice(&self.body).map_err(|err| TransportError::Decode {
            url: url.to_string(),
            reason: err.to_string(),
        })
    }

    /// Decodes the body as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Decode`] when the body is not UTF-8.
    pub fn text(&self, url: &str) -> Result<String, TransportError> {
        String::from_utf8(self.body.clone()).map_err(|err| TransportError::Decode {
            url: url.to_string(),
            reason: err.to_string(),
        })
    }
}

/// Transport failures. None of them are retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// URL could not be parsed or uses a disallowed scheme.
    #[error("invalid url {url}: {reason}")]
    InvalidUrl {
        /// Offending URL.
        url: String,
        /// Parse or policy failure.
        reason: String,
    },
    /// Connection or protocol failure.
    #[error("request to {url} failed: {reason}")]
    Request {
        /// Requested URL.
        url: String,
        /// Underlying failure.
        reason: String,
    },
    /// Non-success status.
    #[error("request to {url} returned status {status}")]
    Status {
        /// Requested URL.
        url: String,
        /// HTTP status.
        status: u16,
    },
    /// Redirect on a request that must not follow redirects.
    #[error("request to {url} was redirected ({status})")]
    Redirect {
        /// Requested URL.
        url: String,
        /// Redirect status.
        status: u16,
    },
    /// Body exceeded the configured limit.
    #[error("response from {url} exceeds {limit} bytes")]
    TooLarge {
        /// Requested URL.
        url: String,
        /// Maximum accepted bytes.
        limit: usize,
    },
    /// Body could not be decoded.
    #[error("response from {url} could not be decoded: {reason}")]
    Decode {
        /// Requested URL.
        url: String,
        /// Decoder failure.
        reason: String,
    },
    /// The bounded wait elapsed.
    #[error("request to {url} timed out after {timeout_ms} ms")]
    Timeout {
        /// Requested URL.
        url: String,
        /// Wait bound in milliseconds.
        timeout_ms: u64,
    },
}

/// Fetches collection metadata, records, and certificate chains.
#[async_trait]
pub trait CollectionTransport: Send + Sync {
    /// Issues one GET request.
    ///
    /// Implementations return the raw status; status policy is applied by the
    /// caller through [`FetchResponse::ensure_success`].
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when no response could be obtained.
    async fn get(&self, request: FetchRequest) -> Result<FetchResponse, TransportError>;
}

// ============================================================================
// SECTION: Verification Primitive
// ============================================================================

/// Arguments handed to the black-box verification primitive.
#[derive(Debug, Clone, Copy)]
pub struct PrimitiveRequest<'a> {
    /// Exact bytes that were signed.
    pub input: &'a [u8],
    /// Algorithm-tagged signature (`p384ecdsa=...`).
    pub signature: &'a str,
    /// PEM certificate chain, end-entity first.
    pub certificate_chain: &'a str,
    /// Expected end-entity subject.
    pub signer: &'a SignerIdentity,
    /// Root the chain must terminate at.
    pub trust_root: &'a TrustRootFingerprint,
}

/// The primitive raised instead of returning a verdict.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrimitiveError {
    /// The primitive raised an exception.
    #[error("verifier raised: {0}")]
    Raised(String),
    /// The primitive could not be reached or answered garbage.
    #[error("verifier unavailable: {0}")]
    Unavailable(String),
}

/// Black-box content-signature verifier.
///
/// The primitive validates chain, trust root, validity window, signer subject,
/// and the signature itself, and records exactly one outcome per call into the
/// supplied telemetry recorder.
#[async_trait]
pub trait ContentSignaturePrimitive: Send + Sync {
    /// Verifies one signature.
    ///
    /// # Errors
    ///
    /// Returns [`PrimitiveError`] when the primitive raised rather than
    /// returning a boolean.
    async fn verify_content_signature(
        &self,
        request: PrimitiveRequest<'_>,
        telemetry: &TelemetryRecorder,
    ) -> Result<bool, PrimitiveError>;
}

// ============================================================================
// SECTION: Settings Store
// ============================================================================

/// Settings store failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    /// Store backend is unavailable.
    #[error("settings store unavailable: {0}")]
    Unavailable(String),
    /// Store refused a change.
    #[error("settings store rejected {key}: {reason}")]
    Rejected {
        /// Offending key.
        key: String,
        /// Rejection reason.
        reason: String,
    },
}

/// Snapshot of selected preference keys.
pub type SettingsSnapshot = BTreeMap<String, Option<SettingValue>>;

/// Host key-value configuration surface.
pub trait SettingsStore: Send + Sync {
    /// Reads one key.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] when the store cannot be read.
    fn get(&self, key: &str) -> Result<Option<SettingValue>, SettingsError>;

    /// Applies a batch of changes as one unit.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] when any change is refused; no change from
    /// the batch may be visible in that case.
    fn apply(&self, changes: &[SettingChange]) -> Result<(), SettingsError>;

    /// Reads several keys.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] when the store cannot be read.
    fn snapshot(&self, keys: &[&str]) -> Result<SettingsSnapshot, SettingsError> {
        keys.iter().map(|key| Ok(((*key).to_string(), self.get(key)?))).collect()
    }
}

// ============================================================================
// SECTION: Addon Installer
// ============================================================================

/// Addon install error code for a missing required signature.
pub const ERROR_SIGNEDSTATE_REQUIRED: i32 = -5;

/// Signed state reported for an installed addon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignedState {
    /// Signature is broken (-2).
    Broken,
    /// Signing state unknown (-1).
    Unknown,
    /// No signature (0).
    Missing,
    /// Preliminarily reviewed (1).
    Preliminary,
    /// Fully signed (2).
    Signed,
    /// System addon (3).
    System,
    /// Privileged addon (4).
    Privileged,
}

impl SignedState {
    /// Maps an installer code to a signed state.
    #[must_use]
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            -2 => Some(Self::Broken),
            -1 => Some(Self::Unknown),
            0 => Some(Self::Missing),
            1 => Some(Self::Preliminary),
            2 => Some(Self::Signed),
            3 => Some(Self::System),
            4 => Some(Self::Privileged),
            _ => None,
        }
    }

    /// Returns the installer code.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Broken => -2,
            Self::Unknown => -1,
            Self::Missing => 0,
            Self::Preliminary => 1,
            Self::Signed => 2,
            Self::System => 3,
            Self::Privileged => 4,
        }
    }
}

/// Addon install failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstallError {
    /// Installer rejected the addon with an error code.
    #[error("install rejected with code {code}")]
    Rejected {
        /// Installer error code.
        code: i32,
    },
    /// Installer could not be run or answered garbage.
    #[error("installer unavailable: {0}")]
    Unavailable(String),
}

/// Installs an XPI and reports its signed state.
#[async_trait]
pub trait AddonInstaller: Send + Sync {
    /// Installs one XPI.
    ///
    /// `dev_root` selects whether signatures chain to the development root.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError`] when the install fails.
    async fn install(&self, url: &str, dev_root: bool) -> Result<SignedState, InstallError>;
}

// ============================================================================
// SECTION: Audit
// ============================================================================

/// Audit event level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditLevel {
    /// Always emitted.
    Info,
    /// Emitted only when debug logging is on.
    Debug,
}

/// Structured canary audit event.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Event level.
    pub level: AuditLevel,
    /// `bucket/collection` when the event concerns one target.
    pub target: Option<String>,
    /// Pipeline stage when applicable.
    pub stage: Option<TargetStage>,
    /// Human-readable message.
    pub message: String,
}

impl AuditEvent {
    /// Builds an event stamped with the current time.
    #[must_use]
    pub fn new(
        event: &'static str,
        level: AuditLevel,
        target: Option<&CollectionScope>,
        stage: Option<TargetStage>,
        message: impl Into<String>,
    ) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        Self {
            event,
            timestamp_ms,
            level,
            target: target.map(ToString::to_string),
            stage,
            message: message.into(),
        }
    }
}

/// Audit sink for canary events.
pub trait AuditSink: Send + Sync {
    /// Records one event.
    fn record(&self, event: &AuditEvent);
}
