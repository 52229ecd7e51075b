// crates/csig-canary-core/src/runtime/audit.rs
// ============================================================================
// Module: Canary Audit Sinks
// Description: JSON-line sinks for canary audit events.
// Purpose: Route run and stage events without a logging framework dependency.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! Sinks serialize [`AuditEvent`] values as one JSON object per line. Audit
//! output never changes a verdict: a failed file write is counted, reported
//! once per failure on stderr, and the run continues.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use crate::interfaces::AuditEvent;
use crate::interfaces::AuditSink;

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Sink that discards every event.
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record(&self, _event: &AuditEvent) {}
}

/// Sink that writes JSON lines to stderr.
pub struct StderrAuditSink;

impl AuditSink for StderrAuditSink {
    fn record(&self, event: &AuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(io::stderr(), "{payload}");
        }
    }
}

/// Sink that appends JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<File>,
    /// Events that could not be written.
    failures: AtomicU64,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
            failures: AtomicU64::new(0),
        })
    }

    /// Returns how many events failed to reach the file.
    #[must_use]
    pub fn write_failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Serializes and appends one event.
    fn append(&self, event: &AuditEvent) -> io::Result<()> {
        let payload = serde_json::to_string(event).map_err(io::Error::other)?;
        let mut file =
            self.file.lock().map_err(|_| io::Error::other("audit log lock poisoned"))?;
        writeln!(file, "{payload}")?;
        file.flush()
    }
}

impl AuditSink for FileAuditSink {
    fn record(&self, event: &AuditEvent) {
        if let Err(err) = self.append(event) {
            self.failures.fetch_add(1, Ordering::Relaxed);
            let _ = writeln!(io::stderr(), "audit log write failed for {}: {err}", event.event);
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
