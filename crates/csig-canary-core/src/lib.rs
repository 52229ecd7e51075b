// crates/csig-canary-core/src/lib.rs
// ============================================================================
// Module: Content Signature Canary Core
// Description: Canonicalization, merge, verification, and classification pipeline.
// Purpose: Decide exactly which bytes were signed and whether they verify.
// Dependencies: async-trait, serde, serde_json, serde_jcs, sha2, thiserror, tokio
// ============================================================================

//! ## Overview
//! The canary fetches a signed settings collection, reconstructs the byte
//! string that was signed upstream, asks a black-box primitive to verify it
//! against a pinned trust root, and classifies the primitive's telemetry into
//! stable statuses. Network transport, the verification primitive, the
//! settings store, and the addon installer are collaborators behind traits in
//! [`interfaces`]; this crate only orchestrates them.
//!
//! Invariants:
//! - Signer identities are always rebuilt from a fragment plus the fixed trust
//!   domain.
//! - Exactly one environment configuration is active per orchestrator, and it
//!   is replaced whole.
//! - A failing fixture self-check fails the whole run.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::core::*;
pub use interfaces::AddonInstaller;
pub use interfaces::AuditEvent;
pub use interfaces::AuditLevel;
pub use interfaces::AuditSink;
pub use interfaces::CollectionTransport;
pub use interfaces::ContentSignaturePrimitive;
pub use interfaces::ERROR_SIGNEDSTATE_REQUIRED;
pub use interfaces::FetchRequest;
pub use interfaces::FetchResponse;
pub use interfaces::InstallError;
pub use interfaces::PrimitiveError;
pub use interfaces::PrimitiveRequest;
pub use interfaces::SettingsError;
pub use interfaces::SettingsSnapshot;
pub use interfaces::SettingsStore;
pub use interfaces::SignedState;
pub use interfaces::TransportError;
pub use runtime::addons::AddonEnvironmentError;
pub use runtime::addons::AddonHarness;
pub use runtime::addons::addon_dev_root;
pub use runtime::args::ArgsError;
pub use runtime::args::RunRequest;
pub use runtime::args::normalize_args;
pub use runtime::audit::FileAuditSink;
pub use runtime::audit::NoopAuditSink;
pub use runtime::audit::StderrAuditSink;
pub use runtime::entry::CanaryServices;
pub use runtime::entry::execute;
pub use runtime::entry::run;
pub use runtime::orchestrator::DEFAULT_STEP_TIMEOUT;
pub use runtime::orchestrator::DEFAULT_VERIFY_TIMEOUT;
pub use runtime::orchestrator::OrchestratorConfig;
pub use runtime::orchestrator::VerificationOrchestrator;
pub use runtime::orchestrator::VerificationTarget;
pub use runtime::settings::MemorySettingsStore;
pub use runtime::settings::worker_info;
pub use runtime::verifier::SIGNATURE_ALGORITHM_PREFIX;
pub use runtime::verifier::SignatureVerifier;
pub use runtime::verifier::SignedContent;
pub use runtime::verifier::VerificationError;
