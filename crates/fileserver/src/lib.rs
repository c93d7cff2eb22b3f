//! Mutually-authenticated static file server.
//!
//! Only clients presenting a certificate that chains to a CA in the trust
//! directory can complete the TLS handshake; every request that reaches the
//! HTTP layer is audited.

pub mod audit;
pub mod cli;
pub mod config;
pub mod identity;
pub mod server;
pub mod telemetry;
pub mod tls;
pub mod trust;
