//! TCP accept loop, TLS handshake and per-connection HTTP serving.
//!
//! Each accepted socket is handled on its own task. A handshake that fails
//! (no certificate, untrusted issuer, timeout) closes the connection after a
//! `warn` diagnostic; no request ever reaches the router, so nothing is
//! audited for it. Connections that complete the handshake are served with
//! HTTP/1.1 or HTTP/2 (by ALPN), and every request on them carries a
//! [`ClientConnection`] extension.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{extract::Request, Router};
use hyper::body::Incoming;
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto;
use hyper_util::service::TowerToHyperService;
use rustls::ServerConfig;
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;
use tower::ServiceExt;
use tracing::{debug, warn};

use super::connection::ClientConnection;

/// Per-connection deadlines.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionSettings {
    pub handshake_timeout: Duration,
    pub header_read_timeout: Duration,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(10),
            header_read_timeout: Duration::from_secs(30),
        }
    }
}

/// Accept connections on `listener` until the task is cancelled.
///
/// Errors from individual connections are logged and never end the loop.
pub async fn serve(
    listener: TcpListener,
    tls: Arc<ServerConfig>,
    router: Router,
    settings: ConnectionSettings,
) -> Result<()> {
    let acceptor = TlsAcceptor::from(tls);
    loop {
        let (socket, peer_addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                // EMFILE and friends: back off instead of spinning.
                warn!(error = %e, "accept failed");
                tokio::time::sleep(Duration::from_millis(100)).await;
                continue;
            }
        };
        let acceptor = acceptor.clone();
        let router = router.clone();
        tokio::spawn(async move {
            handle_connection(socket, peer_addr, acceptor, router, settings).await;
        });
    }
}

async fn handle_connection(
    socket: TcpStream,
    peer_addr: SocketAddr,
    acceptor: TlsAcceptor,
    router: Router,
    settings: ConnectionSettings,
) {
    let stream = match tokio::time::timeout(settings.handshake_timeout, acceptor.accept(socket))
        .await
    {
        Ok(Ok(stream)) => stream,
        Ok(Err(err)) => {
            warn!(error = %err, peer = %peer_addr, "TLS handshake failed");
            return;
        }
        Err(_) => {
            warn!(peer = %peer_addr, "TLS handshake timed out");
            return;
        }
    };

    let peer_chain = stream
        .get_ref()
        .1
        .peer_certificates()
        .map(|certs| certs.to_vec())
        .unwrap_or_default();
    let conn = ClientConnection::new(peer_addr, peer_chain);

    let service = router.map_request(move |mut request: Request<Incoming>| {
        request.extensions_mut().insert(conn.clone());
        request
    });

    let mut builder = auto::Builder::new(TokioExecutor::new());
    builder
        .http1()
        .timer(TokioTimer::new())
        .header_read_timeout(settings.header_read_timeout);

    if let Err(err) = builder
        .serve_connection(TokioIo::new(stream), TowerToHyperService::new(service))
        .await
    {
        debug!(error = %err, peer = %peer_addr, "connection closed with error");
    }
}
