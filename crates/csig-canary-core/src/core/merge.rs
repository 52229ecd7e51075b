// crates/csig-canary-core/src/core/merge.rs
// ============================================================================
// Module: Record Merger
// Description: Local/remote record reconciliation for signature checks.
// Purpose: Produce the ordered record set and high-water timestamp to sign.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Remote records are authoritative. Two modes exist because call sites
//! disagree on whether a local set is threaded through at all:
//! - [`merge`] with an empty local set returns the remote set exactly as
//!   given (the canary's common case).
//! - [`reconcile`] keys both sets by `id`, lets remote records replace local
//!   ones, drops remote tombstones, strips local-only fields, and sorts by `id`.
//!
//! The timestamp is always derived from the merged records, never from the
//! wall clock.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::core::records::Record;
use crate::core::records::RecordSet;
use crate::core::records::SerializationError;

// ============================================================================
// SECTION: Types
// ============================================================================

/// How the orchestrator combines local and remote records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeMode {
    /// Sign the remote records in server order.
    #[default]
    Remote,
    /// Reconcile by `id` and sign in `id` order.
    Reconcile,
}

/// Merged record set plus its high-water timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedRecords {
    /// Records in signing order.
    pub records: RecordSet,
    /// Maximum `last_modified` across `records`, or 0 when empty.
    pub timestamp: u64,
}

// ============================================================================
// SECTION: Merge
// ============================================================================

/// Merges local and remote records with remote precedence.
///
/// An empty local set yields the remote set unchanged; otherwise the sets are
/// fully reconciled.
///
/// # Errors
///
/// Returns [`SerializationError`] when a record lacks a valid timestamp or,
/// when reconciling, a string `id`.
pub fn merge(local: &RecordSet, remote: &RecordSet) -> Result<MergedRecords, SerializationError> {
    if local.is_empty() {
        let timestamp = remote.max_last_modified()?;
        return Ok(MergedRecords {
            records: remote.clone(),
            timestamp,
        });
    }
    reconcile(local, remote)
}

/// Reconciles local and remote records by `id`.
///
/// # Errors
///
/// Returns [`SerializationError::MissingId`] when any record has no string
/// `id`, or [`SerializationError::InvalidLastModified`] when a surviving
/// record has no valid timestamp.
pub fn reconcile(
    local: &RecordSet,
    remote: &RecordSet,
) -> Result<MergedRecords, SerializationError> {
    let mut by_id: BTreeMap<String, Record> = BTreeMap::new();
    for (index, record) in local.records().iter().enumerate() {
        let id = record_id(record, index)?;
        by_id.insert(id, record.clone());
    }
    for (index, record) in remote.records().iter().enumerate() {
        let id = record_id(record, local.len() + index)?;
        if record.is_deleted() {
            by_id.remove(&id);
        } else {
            by_id.insert(id, record.clone());
        }
    }
    let records: RecordSet =
        by_id.into_values().map(Record::without_local_fields).collect::<Vec<_>>().into();
    let timestamp = records.max_last_modified()?;
    Ok(MergedRecords {
        records,
        timestamp,
    })
}

/// Returns the owned `id` of a record or a positional error.
fn record_id(record: &Record, index: usize) -> Result<String, SerializationError> {
    record.id().map(str::to_string).ok_or(SerializationError::MissingId {
        index,
    })
}
