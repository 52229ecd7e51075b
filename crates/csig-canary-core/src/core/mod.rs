// crates/csig-canary-core/src/core/mod.rs
// ============================================================================
// Module: Canary Core Model
// Description: Pure data model and deterministic pipeline stages.
// Purpose: Group the components that take no external configuration.
// Dependencies: serde, serde_json, serde_jcs, sha2, thiserror
// ============================================================================

//! ## Overview
//! Serializer, merger, and classifier are pure functions of their inputs. Only
//! the environment resolver knows about servers and trust roots, and it hands
//! back immutable configurations rather than touching shared state.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod canonical;
pub mod environment;
pub mod fixture;
pub mod identifiers;
pub mod merge;
pub mod metadata;
pub mod records;
pub mod report;
pub mod settings;
pub mod telemetry;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use canonical::MAX_SAFE_INTEGER;
pub use canonical::canonical_json_bytes;
pub use canonical::canonicalize;
pub use canonical::sha256_hex;
pub use environment::BaseEnvironment;
pub use environment::BucketNames;
pub use environment::EnvironmentConfig;
pub use environment::EnvironmentKey;
pub use environment::UnknownEnvironmentError;
pub use environment::resolve;
pub use fixture::ContentSignatureFixture;
pub use identifiers::BucketId;
pub use identifiers::CollectionId;
pub use identifiers::CollectionScope;
pub use identifiers::IdentifierError;
pub use identifiers::SignerIdentity;
pub use identifiers::TrustRootFingerprint;
pub use merge::MergeMode;
pub use merge::MergedRecords;
pub use merge::merge;
pub use merge::reconcile;
pub use metadata::CollectionMetadata;
pub use metadata::MetadataError;
pub use records::Record;
pub use records::RecordSet;
pub use records::SerializationError;
pub use report::AddonResult;
pub use report::FixtureDetails;
pub use report::RunDetail;
pub use report::RunReport;
pub use report::TargetErrorDetail;
pub use report::TargetErrorKind;
pub use report::TargetStage;
pub use report::VerificationResult;
pub use settings::SettingChange;
pub use settings::SettingValue;
pub use telemetry::HistogramSnapshot;
pub use telemetry::KeyedHistogramSnapshot;
pub use telemetry::SignatureStatus;
pub use telemetry::TelemetryError;
pub use telemetry::TelemetryRecorder;
pub use telemetry::TelemetrySnapshot;
pub use telemetry::UnknownStatusCodeError;
pub use telemetry::classify;
pub use telemetry::classify_keyed_errors;
