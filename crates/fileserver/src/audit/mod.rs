//! Audit sinks: where completed-request records go.
//!
//! The request pipeline only sees the [`AuditSink`] trait; which concrete
//! sink is used is decided once at startup. Each [`AuditSink::record`] call
//! must produce exactly one, complete line: concurrent callers never
//! interleave within a line.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use common::AuditRecord;
use tracing::{info, warn};

/// Destination for audit records. Implementations are shared across all
/// connections and must serialise their own writes.
#[cfg_attr(test, mockall::automock)]
pub trait AuditSink: Send + Sync + 'static {
    fn record(&self, record: &AuditRecord);
}

/// Shared handle to the process-wide sink.
pub type SharedAuditSink = Arc<dyn AuditSink>;

// ---------------------------------------------------------------------------
// tracing
// ---------------------------------------------------------------------------

/// Emits each record as one `tracing` event under the `audit` target.
///
/// Line atomicity is provided by the subscriber, which formats an event in
/// full before writing it.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, r: &AuditRecord) {
        info!(
            target: "audit",
            outcome = %r.outcome,
            request_id = %r.request_id,
            client_addr = r.client_addr.as_deref().unwrap_or("-"),
            common_name = %r.common_name,
            serial = r.serial.as_deref().unwrap_or("-"),
            issuer = r.issuer.as_deref().unwrap_or("-"),
            fingerprint_sha256 = r.fingerprint_sha256.as_deref().unwrap_or("-"),
            method = %r.method,
            path = %r.path,
            status = r.status,
            duration_ms = r.duration_ms,
            "request completed"
        );
    }
}

// ---------------------------------------------------------------------------
// JSON lines
// ---------------------------------------------------------------------------

/// Writes each record as a single JSON line to `W`, holding a mutex across
/// format-and-write.
#[derive(Debug)]
pub struct JsonLinesAuditSink<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send + 'static> JsonLinesAuditSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    fn write_line(&self, r: &AuditRecord) -> io::Result<()> {
        let mut line = serde_json::to_vec(r)?;
        line.push(b'\n');
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.write_all(&line)?;
        writer.flush()
    }
}

impl JsonLinesAuditSink<File> {
    /// Open `path` for appending, creating it if needed.
    pub fn append_to(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(file))
    }
}

impl<W: Write + Send + 'static> AuditSink for JsonLinesAuditSink<W> {
    fn record(&self, r: &AuditRecord) {
        if let Err(e) = self.write_line(r) {
            // The record is lost; keep a trace of it in the diagnostic log.
            warn!(error = %e, request_id = %r.request_id, "failed to write audit record");
        }
    }
}
