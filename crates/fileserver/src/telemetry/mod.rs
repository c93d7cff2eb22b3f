//! Structured logging setup, with optional span export over OTLP.
//!
//! # Telemetry invariants
//!
//! - Private key material and file contents never appear in any span or log
//!   field.
//! - Audit records are emitted under the `audit` target so they can be routed
//!   or filtered independently. The `audit` target is pinned at `info`, so a
//!   quieter `LOG_LEVEL` or `RUST_LOG` never drops audit records.
//! - Log level is configurable via `LOG_LEVEL` (default: `info`).

pub mod init;

pub use init::init_telemetry;
