//! Command-line flags. Every flag is optional and, when given, overrides the
//! value coming from the environment or the built-in default.

use std::path::PathBuf;

use clap::Parser;

/// Serve a directory over TLS to clients holding a certificate signed by a
/// trusted CA.
#[derive(Debug, Default, Parser)]
#[command(name = "fileserver", version, about)]
pub struct Cli {
    /// Directory containing files to serve.
    #[arg(long = "data", value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Directory containing trusted CA certificates (PEM).
    #[arg(long = "trust", value_name = "DIR")]
    pub trust_dir: Option<PathBuf>,

    /// Address to listen on, e.g. `:8443` or `127.0.0.1:8443`.
    #[arg(long = "listen", value_name = "ADDR")]
    pub listen_addr: Option<String>,

    /// Server certificate chain file.
    #[arg(long = "cert", value_name = "FILE")]
    pub tls_cert_path: Option<PathBuf>,

    /// Server private key file.
    #[arg(long = "key", value_name = "FILE")]
    pub tls_key_path: Option<PathBuf>,

    /// Append audit records as JSON lines to this file instead of the log.
    #[arg(long = "audit-log", value_name = "FILE")]
    pub audit_log_path: Option<PathBuf>,

    /// Refuse to start when no CA certificate could be loaded.
    #[arg(long)]
    pub require_trust_anchors: bool,

    /// Default tracing filter (overridden by `RUST_LOG`).
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,
}
