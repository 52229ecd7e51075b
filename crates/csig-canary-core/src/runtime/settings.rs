// crates/csig-canary-core/src/runtime/settings.rs
// ============================================================================
// Module: In-Memory Settings Store
// Description: Mutex-guarded preference map and worker-info snapshots.
// Purpose: Provide a host settings surface for the CLI and for tests.
// Dependencies: crate::interfaces
// ============================================================================

//! ## Overview
//! [`MemorySettingsStore`] applies each batch under a single lock, so readers
//! see either the previous environment or the next one, never a mix.
//! [`worker_info`] snapshots the diagnostic keys for failure reports.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::PoisonError;

use crate::core::settings::SettingChange;
use crate::core::settings::SettingValue;
use crate::interfaces::SettingsError;
use crate::interfaces::SettingsSnapshot;
use crate::interfaces::SettingsStore;

// ============================================================================
// SECTION: Memory Store
// ============================================================================

/// Settings store backed by an in-process map.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    /// Current user values.
    values: Mutex<BTreeMap<String, SettingValue>>,
}

impl MemorySettingsStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn get(&self, key: &str) -> Result<Option<SettingValue>, SettingsError> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(values.get(key).cloned())
    }

    fn apply(&self, changes: &[SettingChange]) -> Result<(), SettingsError> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        for change in changes {
            match &change.value {
                Some(value) => {
                    values.insert(change.key.to_string(), value.clone());
                }
                None => {
                    values.remove(change.key);
                }
            }
        }
        Ok(())
    }

    fn snapshot(&self, keys: &[&str]) -> Result<SettingsSnapshot, SettingsError> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(keys.iter().map(|key| ((*key).to_string(), values.get(*key).cloned())).collect())
    }
}

// ============================================================================
// SECTION: Worker Info
// ============================================================================

/// Snapshots the diagnostic preference keys.
///
/// # Errors
///
/// Returns [`SettingsError`] when the store cannot be read.
pub fn worker_info(
    settings: &dyn SettingsStore,
    keys: &[&str],
) -> Result<SettingsSnapshot, SettingsError> {
    settings.snapshot(keys)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
