// crates/csig-canary-providers/src/lib.rs
// ============================================================================
// Module: Canary Providers
// Description: Concrete collaborators for the content-signature canary.
// Purpose: Connect the core orchestrator to HTTP and to out-of-process tools.
// Dependencies: csig-canary-core, reqwest, tokio, serde_json
// ============================================================================

//! ## Overview
//! This crate implements the collaborator traits declared by
//! `csig-canary-core`:
//! - [`HttpTransport`] issues bounded GET requests with `reqwest`, following
//!   redirects only when the request asks for it.
//! - [`ExternalVerifier`] and [`ExternalInstaller`] drive a child process
//!   that speaks one JSON object on stdin and one on stdout.
//!
//! Invariants:
//! - Response bodies are capped by `max_response_bytes`; oversized bodies fail.
//! - Child processes are killed when their future is dropped.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod external;
pub mod http;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use external::ExternalCommand;
pub use external::ExternalInstaller;
pub use external::ExternalVerifier;
pub use http::HttpTransport;
pub use http::HttpTransportConfig;
