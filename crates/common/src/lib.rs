//! Shared identity, audit record, and error types for the mTLS file server.

pub mod error;
pub mod protocol;

pub use error::{RequestError, StartupError};
pub use protocol::{AuditRecord, ClientIdentity, Outcome};
