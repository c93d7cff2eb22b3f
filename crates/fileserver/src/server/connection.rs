//! Per-connection metadata handed from the TLS layer to the request pipeline.

use std::net::SocketAddr;
use std::sync::Arc;

use rustls::pki_types::CertificateDer;

/// Facts about the TLS connection a request arrived on.
///
/// Inserted into the extensions of every request served on the connection.
#[derive(Debug, Clone)]
pub struct ClientConnection {
    pub remote_addr: SocketAddr,
    /// Client chain as verified during the handshake, leaf first. Empty when
    /// the handshake completed without a verified client certificate.
    pub peer_chain: Arc<[CertificateDer<'static>]>,
}

impl ClientConnection {
    pub fn new(remote_addr: SocketAddr, peer_chain: Vec<CertificateDer<'static>>) -> Self {
        Self {
            remote_addr,
            peer_chain: peer_chain.into(),
        }
    }

    /// The verified leaf certificate, if any.
    pub fn verified_leaf(&self) -> Option<&CertificateDer<'static>> {
        self.peer_chain.first()
    }
}
