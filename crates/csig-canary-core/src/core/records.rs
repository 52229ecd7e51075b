// crates/csig-canary-core/src/core/records.rs
// ============================================================================
// Module: Canary Records
// Description: Record and record-set model for signed collections.
// Purpose: Carry opaque server records with their required timestamp field.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! A [`Record`] is an opaque JSON object. The only field the canary inspects is
//! `last_modified` (required unsigned integer) and, during reconciliation, the
//! string `id`. Everything else passes through untouched into the canonical
//! payload.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Field Names
// ============================================================================

/// Record timestamp field.
pub const LAST_MODIFIED_FIELD: &str = "last_modified";
/// Record identity field used for reconciliation.
pub const ID_FIELD: &str = "id";
/// Tombstone marker on remote records.
pub const DELETED_FIELD: &str = "deleted";
/// Local sync-status field that never takes part in the signed payload.
pub const LOCAL_STATUS_FIELD: &str = "_status";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when a record set cannot be canonicalized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SerializationError {
    /// A record entry is not a JSON object.
    #[error("record at index {index} is not an object")]
    NotAnObject {
        /// Position of the offending record.
        index: usize,
    },
    /// A record lacks an unsigned integer `last_modified`.
    #[error("record {record} has no unsigned integer last_modified")]
    InvalidLastModified {
        /// Record id when available, otherwise its position.
        record: String,
    },
    /// Reconciliation needs a string `id` on every record.
    #[error("record at index {index} has no string id")]
    MissingId {
        /// Position of the offending record.
        index: usize,
    },
    /// A number cannot be represented exactly in the canonical encoding.
    #[error("value at {path} is outside the canonical integer range")]
    UnrepresentableNumber {
        /// JSON pointer to the offending value.
        path: String,
    },
    /// The canonical encoder rejected the payload.
    #[error("failed to canonicalize json: {0}")]
    Canonicalization(String),
}

// ============================================================================
// SECTION: Record
// ============================================================================

/// One settings record: an opaque JSON object with a `last_modified` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    /// Wraps an existing JSON object.
    #[must_use]
    pub const fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Builds a record from an arbitrary JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`SerializationError::NotAnObject`] when the value is not an
    /// object.
    pub fn from_value(value: Value, index: usize) -> Result<Self, SerializationError> {
        match value {
            Value::Object(fields) => Ok(Self(fields)),
            _ => Err(SerializationError::NotAnObject {
                index,
            }),
        }
    }

    /// Returns the record `id` when it is a string.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.0.get(ID_FIELD).and_then(Value::as_str)
    }

    /// Returns the record's `last_modified` timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`SerializationError::InvalidLastModified`] when the field is
    /// missing or not an unsigned integer.
    pub fn last_modified(&self) -> Result<u64, SerializationError> {
        self.0.get(LAST_MODIFIED_FIELD).and_then(Value::as_u64).ok_or_else(|| {
            SerializationError::InvalidLastModified {
                record: self.id().unwrap_or("<no id>").to_string(),
            }
        })
    }

    /// Returns true when the record is a remote tombstone.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.0.get(DELETED_FIELD).and_then(Value::as_bool).unwrap_or(false)
    }

    /// Returns the record without local-only fields.
    #[must_use]
    pub fn without_local_fields(mut self) -> Self {
        self.0.remove(LOCAL_STATUS_FIELD);
        self
    }

    /// Returns the underlying JSON object.
    #[must_use]
    pub const fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

// ============================================================================
// SECTION: Record Set
// ============================================================================

/// Ordered sequence of records as served by the `/records` endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordSet(Vec<Record>);

impl RecordSet {
    /// Creates a record set from records in their given order.
    #[must_use]
    pub const fn new(records: Vec<Record>) -> Self {
        Self(records)
    }

    /// Parses the `data` array of a `/records` response body.
    ///
    /// # Errors
    ///
    /// Returns [`SerializationError`] when `data` is missing or contains
    /// non-object entries.
    pub fn from_response(body: &Value) -> Result<Self, SerializationError> {
        let Some(Value::Array(items)) = body.get("data") else {
            return Err(SerializationError::Canonicalization(
                "records response has no data array".to_string(),
            ));
        };
        items
            .iter()
            .cloned()
            .enumerate()
            .map(|(index, item)| Record::from_value(item, index))
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    /// Returns the records in order.
    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.0
    }

    /// Returns the number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true when the set has no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the maximum `last_modified` across the set, or 0 when empty.
    ///
    /// # Errors
    ///
    /// Returns [`SerializationError::InvalidLastModified`] when any record
    /// lacks a valid timestamp.
    pub fn max_last_modified(&self) -> Result<u64, SerializationError> {
        self.0.iter().try_fold(0, |max, record| Ok(max.max(record.last_modified()?)))
    }
}

impl From<Vec<Record>> for RecordSet {
    fn from(records: Vec<Record>) -> Self {
        Self(records)
    }
}
