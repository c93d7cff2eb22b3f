//! Configuration loading and validation for the file server.
//!
//! Values come from, in increasing precedence: built-in defaults, environment
//! variables, command-line flags. The process exits with a clear error message
//! if a required directory is missing or a value cannot be parsed.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use common::StartupError;
use serde::Deserialize;

use crate::cli::Cli;

/// Validated file server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Root of the served directory tree. Must exist.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Directory of PEM files holding the trusted client CAs. Must exist.
    #[serde(default = "default_trust_dir")]
    pub trust_dir: PathBuf,

    /// Listen address. A leading `:` (e.g. `":8443"`) binds all interfaces.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// PEM-encoded server certificate chain.
    #[serde(default = "default_tls_cert_path")]
    pub tls_cert_path: PathBuf,

    /// PEM-encoded server private key.
    #[serde(default = "default_tls_key_path")]
    pub tls_key_path: PathBuf,

    /// Fail startup instead of rejecting every client when the trust
    /// directory yields no CA certificate.
    #[serde(default)]
    pub require_trust_anchors: bool,

    /// When set, audit records are appended to this file as JSON lines.
    #[serde(default)]
    pub audit_log_path: Option<PathBuf>,

    /// Deadline for completing the TLS handshake.
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout_secs: u64,

    /// Deadline for reading an HTTP/1 request head.
    #[serde(default = "default_header_read_timeout")]
    pub header_read_timeout_secs: u64,

    /// Deadline for producing a response head.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// OTLP endpoint for span export. Export is disabled when unset.
    #[serde(default)]
    pub otel_exporter_otlp_endpoint: Option<String>,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_trust_dir() -> PathBuf {
    PathBuf::from("./trust")
}
fn default_listen_addr() -> String {
    ":8443".into()
}
fn default_tls_cert_path() -> PathBuf {
    PathBuf::from("server.crt")
}
fn default_tls_key_path() -> PathBuf {
    PathBuf::from("server.key")
}
fn default_handshake_timeout() -> u64 {
    10
}
fn default_header_read_timeout() -> u64 {
    30
}
fn default_request_timeout() -> u64 {
    30
}
fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load configuration from the environment, apply `cli` overrides, and
    /// validate the result.
    ///
    /// # Errors
    ///
    /// Returns an error if a value cannot be parsed or fails validation.
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut builder = config::Config::builder()
            .add_source(config::Environment::default())
            .set_override_option("data_dir", cli.data_dir.as_deref().map(path_value))?
            .set_override_option("trust_dir", cli.trust_dir.as_deref().map(path_value))?
            .set_override_option("listen_addr", cli.listen_addr.clone())?
            .set_override_option("tls_cert_path", cli.tls_cert_path.as_deref().map(path_value))?
            .set_override_option("tls_key_path", cli.tls_key_path.as_deref().map(path_value))?
            .set_override_option(
                "audit_log_path",
                cli.audit_log_path.as_deref().map(path_value),
            )?
            .set_override_option("log_level", cli.log_level.clone())?;
        if cli.require_trust_anchors {
            builder = builder.set_override("require_trust_anchors", true)?;
        }

        let cfg = builder
            .build()
            .context("failed to build configuration from environment and flags")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise configuration")?;

        c.validate()?;
        Ok(c)
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    fn validate(&self) -> Result<()> {
        ensure_directory(&self.data_dir, "data")?;
        ensure_directory(&self.trust_dir, "trust")?;
        self.listen_socket_addr()?;
        ensure_non_empty(&self.tls_cert_path, "TLS_CERT_PATH")?;
        ensure_non_empty(&self.tls_key_path, "TLS_KEY_PATH")?;

        if self.handshake_timeout_secs == 0 {
            anyhow::bail!("HANDSHAKE_TIMEOUT_SECS must be > 0");
        }
        if self.header_read_timeout_secs == 0 {
            anyhow::bail!("HEADER_READ_TIMEOUT_SECS must be > 0");
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("REQUEST_TIMEOUT_SECS must be > 0");
        }
        Ok(())
    }

    /// Parse [`Config::listen_addr`], expanding the `":port"` shorthand.
    pub fn listen_socket_addr(&self) -> Result<SocketAddr, StartupError> {
        let raw = self.listen_addr.trim();
        let expanded = if raw.starts_with(':') {
            format!("0.0.0.0{raw}")
        } else {
            raw.to_owned()
        };
        expanded
            .parse()
            .map_err(|_| StartupError::InvalidListenAddr(self.listen_addr.clone()))
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }

    pub fn header_read_timeout(&self) -> Duration {
        Duration::from_secs(self.header_read_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn path_value(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn ensure_directory(path: &Path, kind: &'static str) -> Result<(), StartupError> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(StartupError::MissingDirectory {
            kind,
            path: path.to_path_buf(),
        })
    }
}

fn ensure_non_empty(value: &Path, name: &str) -> Result<()> {
    if value.as_os_str().is_empty() {
        anyhow::bail!("{name} is required and must not be empty");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(data_dir: PathBuf, trust_dir: PathBuf) -> Config {
        Config {
            data_dir,
            trust_dir,
            listen_addr: default_listen_addr(),
            tls_cert_path: default_tls_cert_path(),
            tls_key_path: default_tls_key_path(),
            require_trust_anchors: false,
            audit_log_path: None,
            handshake_timeout_secs: default_handshake_timeout(),
            header_read_timeout_secs: default_header_read_timeout(),
            request_timeout_secs: default_request_timeout(),
            otel_exporter_otlp_endpoint: None,
            log_level: default_log_level(),
        }
    }

    #[test]
    fn defaults_are_correct() {
        assert_eq!(default_data_dir(), PathBuf::from("./data"));
        assert_eq!(default_trust_dir(), PathBuf::from("./trust"));
        assert_eq!(default_listen_addr(), ":8443");
        assert_eq!(default_tls_cert_path(), PathBuf::from("server.crt"));
        assert_eq!(default_tls_key_path(), PathBuf::from("server.key"));
        assert_eq!(default_request_timeout(), 30);
        assert_eq!(default_log_level(), "info");
    }

    #[test]
    fn validate_accepts_existing_directories() {
        let data = tempfile::tempdir().unwrap();
        let trust = tempfile::tempdir().unwrap();
        let cfg = config_with(data.path().into(), trust.path().into());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_rejects_missing_data_dir() {
        let trust = tempfile::tempdir().unwrap();
        let cfg = config_with(trust.path().join("absent"), trust.path().into());
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("data directory"), "{err}");
    }

    #[test]
    fn validate_rejects_missing_trust_dir() {
        let data = tempfile::tempdir().unwrap();
        let cfg = config_with(data.path().into(), data.path().join("absent"));
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("trust directory"), "{err}");
    }

    #[test]
    fn validate_rejects_file_as_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("not-a-dir");
        std::fs::write(&file, b"x").unwrap();
        let cfg = config_with(file, dir.path().into());
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config_with(dir.path().into(), dir.path().into());
        cfg.request_timeout_secs = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn listen_addr_port_shorthand_binds_all_interfaces() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config_with(dir.path().into(), dir.path().into());
        let addr = cfg.listen_socket_addr().unwrap();
        assert!(addr.ip().is_unspecified());
        assert_eq!(addr.port(), 8443);
    }

    #[test]
    fn listen_addr_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config_with(dir.path().into(), dir.path().into());
        cfg.listen_addr = "not an address".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn load_applies_flag_overrides() {
        let data = tempfile::tempdir().unwrap();
        let trust = tempfile::tempdir().unwrap();
        let cli = Cli {
            data_dir: Some(data.path().into()),
            trust_dir: Some(trust.path().into()),
            listen_addr: Some("127.0.0.1:9443".into()),
            require_trust_anchors: true,
            ..Cli::default()
        };
        let cfg = Config::load(&cli).unwrap();
        assert_eq!(cfg.data_dir, data.path());
        assert_eq!(cfg.trust_dir, trust.path());
        assert_eq!(cfg.listen_socket_addr().unwrap().port(), 9443);
        assert!(cfg.require_trust_anchors);
    }
}
