//! Identity and audit types exchanged between the transport, the request
//! pipeline, and audit sinks.
//!
//! [`AuditRecord`] is also the on-disk format of the JSON-lines audit log.

use serde::{Deserialize, Serialize};

/// Placeholder written in place of a common name when none is available.
pub const UNKNOWN_CLIENT: &str = "<unknown>";

// ---------------------------------------------------------------------------
// Client identity
// ---------------------------------------------------------------------------

/// Identity of an authenticated client, taken from the verified leaf
/// certificate. Lives for one request and is never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientIdentity {
    /// Subject common name. Display only; not guaranteed unique.
    pub common_name: Option<String>,
    /// Serial number in decimal.
    pub serial: String,
    /// Issuer distinguished name.
    pub issuer: String,
    /// Lower-case hex SHA-256 of the leaf certificate DER.
    pub fingerprint_sha256: String,
}

impl ClientIdentity {
    /// Common name, or [`UNKNOWN_CLIENT`] if the subject has none.
    pub fn display_name(&self) -> &str {
        self.common_name.as_deref().unwrap_or(UNKNOWN_CLIENT)
    }
}

// ---------------------------------------------------------------------------
// Audit record
// ---------------------------------------------------------------------------

/// Outcome classification of a completed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    /// Final status below 400.
    Success,
    /// Final status 400 or above.
    Fail,
}

impl Outcome {
    pub fn from_status(status: u16) -> Self {
        if status < 400 {
            Outcome::Success
        } else {
            Outcome::Fail
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "SUCCESS",
            Outcome::Fail => "FAIL",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One audit line: the summary of a single completed request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub outcome: Outcome,
    /// Random per-request identifier.
    pub request_id: String,
    /// Remote socket address, when the request arrived over a connection.
    pub client_addr: Option<String>,
    /// Client common name or [`UNKNOWN_CLIENT`].
    pub common_name: String,
    /// Leaf certificate serial, absent for unauthenticated requests.
    pub serial: Option<String>,
    /// Issuer distinguished name of the leaf certificate.
    pub issuer: Option<String>,
    /// Lower-case hex SHA-256 of the leaf certificate DER.
    pub fingerprint_sha256: Option<String>,
    pub method: String,
    pub path: String,
    pub status: u16,
    /// Wall time from entering the audit wrapper until the response body
    /// finished, in milliseconds.
    pub duration_ms: f64,
}

impl AuditRecord {
    /// Build a record, deriving the outcome from `status`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        request_id: String,
        client_addr: Option<String>,
        identity: Option<&ClientIdentity>,
        method: String,
        path: String,
        status: u16,
        duration_ms: f64,
    ) -> Self {
        Self {
            outcome: Outcome::from_status(status),
            request_id,
            client_addr,
            common_name: identity
                .map(|id| id.display_name().to_owned())
                .unwrap_or_else(|| UNKNOWN_CLIENT.to_owned()),
            serial: identity.map(|id| id.serial.clone()),
            issuer: identity.map(|id| id.issuer.clone()),
            fingerprint_sha256: identity.map(|id| id.fingerprint_sha256.clone()),
            method,
            path,
            status,
            duration_ms,
        }
    }
}
