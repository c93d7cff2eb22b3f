//! `fileserver` binary entry point.
//!
//! Startup sequence:
//! 1. Parse flags and load [`Config`].
//! 2. Initialise the telemetry pipeline (tracing + optional OTLP).
//! 3. Build the trust store from the trust directory.
//! 4. Load the server identity and build the mutual-TLS configuration.
//! 5. Choose the audit sink.
//! 6. Build the router, bind, and serve until interrupted.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use fileserver::audit::{JsonLinesAuditSink, SharedAuditSink, TracingAuditSink};
use fileserver::cli::Cli;
use fileserver::config::Config;
use fileserver::server::listener::{self, ConnectionSettings};
use fileserver::server::router;
use fileserver::server::state::AppState;
use fileserver::{telemetry, tls, trust};

#[tokio::main]
async fn main() -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let cli = Cli::parse();
    let cfg = Config::load(&cli).map_err(|e| {
        // Telemetry is not yet up; write to stderr directly.
        eprintln!("ERROR: configuration invalid: {e:#}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    telemetry::init_telemetry(cfg.otel_exporter_otlp_endpoint.as_deref(), &cfg.log_level)?;
    info!(version = env!("CARGO_PKG_VERSION"), "fileserver starting");

    // -----------------------------------------------------------------------
    // 3. Trust store
    // -----------------------------------------------------------------------
    let (trust_store, report) = trust::load_dir(&cfg.trust_dir)?;
    info!(
        anchors = trust_store.len(),
        files_loaded = report.loaded().count(),
        files_skipped = report.skipped().count(),
        "trust store built"
    );
    for anchor in trust_store.anchors() {
        info!(subject = %anchor.subject, source = %anchor.source.display(), "trusted client CA");
    }
    trust::check_anchor_policy(&trust_store, &cfg.trust_dir, cfg.require_trust_anchors)?;

    // -----------------------------------------------------------------------
    // 4. TLS
    // -----------------------------------------------------------------------
    let tls_config = tls::load_server_config(&cfg.tls_cert_path, &cfg.tls_key_path, &trust_store)?;

    // -----------------------------------------------------------------------
    // 5. Audit sink
    // -----------------------------------------------------------------------
    let audit: SharedAuditSink = match &cfg.audit_log_path {
        Some(path) => Arc::new(
            JsonLinesAuditSink::append_to(path)
                .with_context(|| format!("opening audit log {}", path.display()))?,
        ),
        None => Arc::new(TracingAuditSink),
    };

    // -----------------------------------------------------------------------
    // 6. HTTPS server
    // -----------------------------------------------------------------------
    let state = AppState::new(cfg.data_dir.clone(), audit, cfg.request_timeout());
    let app = router::build(state);

    let addr = cfg.listen_socket_addr()?;
    let tcp = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding listener {addr}"))?;
    info!(addr = %addr, "listening");
    info!(data_dir = %cfg.data_dir.display(), "serving files");
    info!(trust_dir = %cfg.trust_dir.display(), "trusting client CAs");

    let settings = ConnectionSettings {
        handshake_timeout: cfg.handshake_timeout(),
        header_read_timeout: cfg.header_read_timeout(),
    };

    tokio::select! {
        res = listener::serve(tcp, tls_config, app, settings) => res?,
        _ = tokio::signal::ctrl_c() => info!("shutdown signal received"),
    }

    Ok(())
}
