// crates/csig-canary-core/src/core/settings.rs
// ============================================================================
// Module: Canary Settings Model
// Description: Preference keys and values written by environment switches.
// Purpose: Name the external configuration surface read by the verifier host.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Settings are external mutable configuration owned by the verifier host. The
//! canary only reads and writes them through [`crate::SettingsStore`], always
//! as whole batches of [`SettingChange`] values.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Keys
// ============================================================================

/// Settings server base URL.
pub const SETTINGS_SERVER_KEY: &str = "services.settings.server";
/// Pinned content-signature root fingerprint.
pub const ROOT_HASH_KEY: &str = "security.content.signature.root_hash";
/// Push service (megaphone/autopush) URL.
pub const PUSH_SERVER_KEY: &str = "dom.push.serverURL";
/// Whether packaged dumps may be loaded.
pub const LOAD_DUMP_KEY: &str = "services.settings.load_dump";
/// Default (`main`) bucket name.
pub const DEFAULT_BUCKET_KEY: &str = "services.settings.default_bucket";
/// Blocklist bucket name.
pub const BLOCKLIST_BUCKET_KEY: &str = "services.blocklist.bucket";
/// Pinning bucket name.
pub const PINNING_BUCKET_KEY: &str = "services.blocklist.pinning.bucket";
/// Settings client log level.
pub const LOG_LEVEL_KEY: &str = "services.settings.loglevel";
/// `OneCRL` signer override, reported for diagnostics only.
pub const ONECRL_SIGNER_KEY: &str = "services.settings.security.onecrl.signer";
/// Whether addon signatures chain to the development root.
pub const ADDON_DEV_ROOT_KEY: &str = "xpinstall.signatures.dev-root";
/// Addon signature enforcement policy, reported for diagnostics only.
pub const ADDON_SIGNATURE_POLICY_KEY: &str = "security.signed_app_signatures.policy";

/// Keys reported by worker info for content-signature runs.
pub const CONTENT_SIGNATURE_INFO_KEYS: &[&str] = &[
    SETTINGS_SERVER_KEY,
    ROOT_HASH_KEY,
    ONECRL_SIGNER_KEY,
    DEFAULT_BUCKET_KEY,
    BLOCKLIST_BUCKET_KEY,
    PINNING_BUCKET_KEY,
    PUSH_SERVER_KEY,
];

/// Keys reported by worker info for addon runs.
pub const ADDON_INFO_KEYS: &[&str] = &[ADDON_DEV_ROOT_KEY, ADDON_SIGNATURE_POLICY_KEY];

// ============================================================================
// SECTION: Values
// ============================================================================

/// A preference value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    /// String preference.
    Str(String),
    /// Boolean preference.
    Bool(bool),
}

/// One write in a settings batch; `value: None` clears the key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingChange {
    /// Preference key.
    pub key: &'static str,
    /// New value, or `None` to clear the user value.
    pub value: Option<SettingValue>,
}

impl SettingChange {
    /// Sets a string preference.
    #[must_use]
    pub fn set_str(key: &'static str, value: impl Into<String>) -> Self {
        Self {
            key,
            value: Some(SettingValue::Str(value.into())),
        }
    }

    /// Sets a boolean preference.
    #[must_use]
    pub const fn set_bool(key: &'static str, value: bool) -> Self {
        Self {
            key,
            value: Some(SettingValue::Bool(value)),
        }
    }

    /// Clears a preference.
    #[must_use]
    pub const fn clear(key: &'static str) -> Self {
        Self {
            key,
            value: None,
        }
    }
}
