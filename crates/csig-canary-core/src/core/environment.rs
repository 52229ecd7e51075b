// crates/csig-canary-core/src/core/environment.rs
// ============================================================================
// Module: Environment Resolver
// Description: Logical environment keys mapped to pinned server configurations.
// Purpose: Select server URL, trust root, and bucket names as one unit.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! An environment key is `prod`, `stage`, or `local` (aliases `production`
//! and `staging`), optionally suffixed with `-preview`. The base name selects
//! the server and pinned trust root; the preview qualifier independently
//! selects the `-preview` bucket names. Unknown base names fail: there is no
//! default trust root to fall back to.
//!
//! Resolved configurations are immutable. Switching environments means
//! building a new [`EnvironmentConfig`] and replacing the active one whole.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde::Serializer;
use thiserror::Error;

use crate::core::identifiers::CollectionScope;
use crate::core::identifiers::TrustRootFingerprint;
use crate::core::settings::BLOCKLIST_BUCKET_KEY;
use crate::core::settings::DEFAULT_BUCKET_KEY;
use crate::core::settings::LOAD_DUMP_KEY;
use crate::core::settings::PINNING_BUCKET_KEY;
use crate::core::settings::PUSH_SERVER_KEY;
use crate::core::settings::ROOT_HASH_KEY;
use crate::core::settings::SETTINGS_SERVER_KEY;
use crate::core::settings::SettingChange;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Production settings server.
pub const SERVER_PROD: &str = "https://firefox.settings.services.mozilla.com/v1";
/// Staging settings server.
pub const SERVER_STAGE: &str = "https://settings.stage.mozaws.net/v1";
/// Local development settings server.
pub const SERVER_LOCAL: &str = "http://localhost:8888/v1";
/// Production content-signing root fingerprint.
pub const HASH_PROD: &str = "97:E8:BA:9C:F1:2F:B3:DE:53:CC:42:A4:E6:57:7E:D6:4D:F4:93:C2:47:B4:14:FE:A0:36:81:8D:38:23:56:0E";
/// Staging content-signing root fingerprint.
pub const HASH_STAGE: &str = "3C:01:44:6A:BE:90:36:CE:A9:A0:9A:CA:A3:A5:20:AC:62:8F:20:A7:AE:32:CE:86:1C:B2:EF:B7:0F:A0:C7:45";
/// Local development content-signing root fingerprint.
pub const HASH_LOCAL: &str = "5E:36:F2:14:DE:82:3F:8B:29:96:89:23:5F:03:41:AC:AF:A0:75:AF:82:CB:4C:D4:30:7C:3D:B3:43:39:2A:FE";
/// Staging push (megaphone) server.
pub const MEGAPHONE_STAGE: &str = "https://autopush.stage.mozaws.net";

/// Qualifier selecting preview buckets.
const PREVIEW_SUFFIX: &str = "-preview";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Environment key did not name a known base environment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown environment: {0:?}")]
pub struct UnknownEnvironmentError(pub String);

// ============================================================================
// SECTION: Environment Keys
// ============================================================================

/// Base environment selecting server and trust root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseEnvironment {
    /// Production.
    Prod,
    /// Staging.
    Stage,
    /// Local development server.
    Local,
}

impl BaseEnvironment {
    /// Returns the canonical label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Prod => "prod",
            Self::Stage => "stage",
            Self::Local => "local",
        }
    }
}

/// Parsed environment key: base environment plus preview qualifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnvironmentKey {
    /// Base environment.
    pub base: BaseEnvironment,
    /// Whether preview buckets are selected.
    pub preview: bool,
}

impl EnvironmentKey {
    /// Parses `(prod|stage|local)(-preview)?`, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownEnvironmentError`] for any other base name.
    pub fn parse(value: &str) -> Result<Self, UnknownEnvironmentError> {
        let normalized = value.trim().to_ascii_lowercase();
        let (base_name, preview) = normalized
            .strip_suffix(PREVIEW_SUFFIX)
            .map_or((normalized.as_str(), false), |base| (base, true));
        let base = match base_name {
            "prod" | "production" => BaseEnvironment::Prod,
            "stage" | "staging" => BaseEnvironment::Stage,
            "local" => BaseEnvironment::Local,
            _ => return Err(UnknownEnvironmentError(value.to_string())),
        };
        Ok(Self {
            base,
            preview,
        })
    }
}

impl FromStr for EnvironmentKey {
    type Err = UnknownEnvironmentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl fmt::Display for EnvironmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.base.as_str())?;
        if self.preview {
            f.write_str(PREVIEW_SUFFIX)?;
        }
        Ok(())
    }
}

impl Serialize for EnvironmentKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ============================================================================
// SECTION: Environment Configuration
// ============================================================================

/// Dataset bucket names for one environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketNames {
    /// Default (`main`) bucket.
    pub default_bucket: String,
    /// Blocklist bucket.
    pub blocklist_bucket: String,
    /// Pinning bucket.
    pub pinning_bucket: String,
}

impl BucketNames {
    /// Returns the bucket names for the preview qualifier.
    fn for_preview(preview: bool) -> Self {
        let suffix = if preview { PREVIEW_SUFFIX } else { "" };
        Self {
            default_bucket: format!("main{suffix}"),
            blocklist_bucket: format!("blocklists{suffix}"),
            pinning_bucket: format!("pinning{suffix}"),
        }
    }
}

/// Immutable configuration bundle for one environment.
///
/// # Invariants
/// - Server URL, trust root, and bucket names always come from the same key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvironmentConfig {
    /// Key this configuration was resolved from.
    pub key: EnvironmentKey,
    /// Settings server base URL (no trailing slash).
    pub server_url: String,
    /// Pinned trust root the certificate chain must terminate at.
    pub trust_root: TrustRootFingerprint,
    /// Dataset bucket names.
    pub buckets: BucketNames,
    /// Push server URL; `None` clears the preference.
    pub push_server_url: Option<String>,
    /// Dump loading override; `None` clears the preference.
    pub load_dump: Option<bool>,
}

impl EnvironmentConfig {
    /// Builds the configuration for a parsed key.
    #[must_use]
    pub fn for_key(key: EnvironmentKey) -> Self {
        let (server_url, trust_root, push_server_url, load_dump) = match key.base {
            BaseEnvironment::Prod => (SERVER_PROD, HASH_PROD, None, None),
            BaseEnvironment::Stage => (SERVER_STAGE, HASH_STAGE, Some(MEGAPHONE_STAGE), Some(false)),
            BaseEnvironment::Local => (SERVER_LOCAL, HASH_LOCAL, None, Some(false)),
        };
        Self {
            key,
            server_url: server_url.to_string(),
            trust_root: TrustRootFingerprint::from_static(trust_root),
            buckets: BucketNames::for_preview(key.preview),
            push_server_url: push_server_url.map(str::to_string),
            load_dump,
        }
    }

    /// Returns the full settings batch that activates this environment.
    #[must_use]
    pub fn settings_changes(&self) -> Vec<SettingChange> {
        vec![
            SettingChange::set_str(SETTINGS_SERVER_KEY, self.server_url.clone()),
            SettingChange::set_str(ROOT_HASH_KEY, self.trust_root.as_str()),
            self.push_server_url.as_ref().map_or_else(
                || SettingChange::clear(PUSH_SERVER_KEY),
                |url| SettingChange::set_str(PUSH_SERVER_KEY, url.clone()),
            ),
            self.load_dump.map_or_else(
                || SettingChange::clear(LOAD_DUMP_KEY),
                |value| SettingChange::set_bool(LOAD_DUMP_KEY, value),
            ),
            SettingChange::set_str(DEFAULT_BUCKET_KEY, self.buckets.default_bucket.clone()),
            SettingChange::set_str(BLOCKLIST_BUCKET_KEY, self.buckets.blocklist_bucket.clone()),
            SettingChange::set_str(PINNING_BUCKET_KEY, self.buckets.pinning_bucket.clone()),
        ]
    }

    /// Returns the collection metadata URL.
    #[must_use]
    pub fn metadata_url(&self, scope: &CollectionScope) -> String {
        format!("{}/buckets/{}/collections/{}", self.server_url, scope.bucket, scope.collection)
    }

    /// Returns the collection records URL.
    #[must_use]
    pub fn records_url(&self, scope: &CollectionScope) -> String {
        format!("{}/records", self.metadata_url(scope))
    }
}

/// Resolves an environment key string into its configuration.
///
/// # Errors
///
/// Returns [`UnknownEnvironmentError`] when the base name is not recognized.
pub fn resolve(environment_key: &str) -> Result<EnvironmentConfig, UnknownEnvironmentError> {
    EnvironmentKey::parse(environment_key).map(EnvironmentConfig::for_key)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions are permitted.")]

    use super::*;

    #[test]
    fn pinned_fingerprints_are_well_formed() {
        for hash in [HASH_PROD, HASH_STAGE, HASH_LOCAL] {
            let parsed = TrustRootFingerprint::parse(hash).unwrap();
            assert_eq!(parsed.as_str(), hash);
        }
    }

    #[test]
    fn key_display_round_trips() {
        for label in ["prod", "stage-preview", "local", "local-preview"] {
            assert_eq!(EnvironmentKey::parse(label).unwrap().to_string(), label);
        }
    }
}
