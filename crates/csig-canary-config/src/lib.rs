// crates/csig-canary-config/src/lib.rs
// ============================================================================
// Module: Canary Config Library
// Description: Config model, loading, and validation for the canary.
// Purpose: Single source of truth for csig-canary.toml semantics.
// Dependencies: csig-canary-core, serde, toml, url
// ============================================================================

//! ## Overview
//! `csig-canary-config` defines the configuration model for the
//! content-signature canary. Loading is size- and path-limited, parsing is
//! strict (unknown keys fail), and validation fails closed. Driver-style
//! environment variables override the file after parsing and before
//! validation.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
