// crates/csig-canary-core/src/runtime/mod.rs
// ============================================================================
// Module: Canary Runtime
// Description: Orchestration over the collaborator interfaces.
// Purpose: Drive fixture checks, environment switches, and target verification.
// Dependencies: tokio, crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! The runtime owns everything with a lifecycle: the active environment, the
//! telemetry recorder, bounded waits, and the exactly-once report callback.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod addons;
pub mod args;
pub mod audit;
pub mod entry;
pub mod orchestrator;
pub mod settings;
pub mod verifier;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use addons::AddonEnvironmentError;
pub use addons::AddonHarness;
pub use addons::addon_dev_root;
pub use args::ArgsError;
pub use args::RunRequest;
pub use args::normalize_args;
pub use audit::FileAuditSink;
pub use audit::NoopAuditSink;
pub use audit::StderrAuditSink;
pub use entry::CanaryServices;
pub use entry::execute;
pub use entry::run;
pub use orchestrator::DEFAULT_STEP_TIMEOUT;
pub use orchestrator::DEFAULT_VERIFY_TIMEOUT;
pub use orchestrator::OrchestratorConfig;
pub use orchestrator::VerificationOrchestrator;
pub use orchestrator::VerificationTarget;
pub use settings::MemorySettingsStore;
pub use settings::worker_info;
pub use verifier::SIGNATURE_ALGORITHM_PREFIX;
pub use verifier::SignatureVerifier;
pub use verifier::SignedContent;
pub use verifier::VerificationError;
