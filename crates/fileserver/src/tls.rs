//! rustls server configuration enforcing mutual authentication.
//!
//! Every connection must present a client certificate that chains to an
//! anchor in the [`TrustStore`]. There is no optional-certificate mode: a
//! handshake without a verified client chain fails before any HTTP bytes are
//! read.

use std::fs;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use common::StartupError;
use rustls::client::danger::HandshakeSignatureValid;
use rustls::crypto::{CryptoProvider, WebPkiSupportedAlgorithms};
use rustls::pki_types::{CertificateDer, UnixTime};
use rustls::server::danger::{ClientCertVerified, ClientCertVerifier};
use rustls::server::WebPkiClientVerifier;
use rustls::{
    CertificateError, DigitallySignedStruct, DistinguishedName, ServerConfig, SignatureScheme,
};
use tracing::debug;

use crate::trust::TrustStore;

/// Read the server certificate chain and private key from disk and build the
/// server configuration.
///
/// # Errors
///
/// Returns [`StartupError::ServerIdentity`] if either file cannot be read or
/// parsed.
pub fn load_server_config(
    cert_path: &Path,
    key_path: &Path,
    trust: &TrustStore,
) -> Result<Arc<ServerConfig>, StartupError> {
    let cert_pem = fs::read(cert_path).map_err(|e| {
        StartupError::ServerIdentity(format!("cannot read {}: {e}", cert_path.display()))
    })?;
    let key_pem = fs::read(key_path).map_err(|e| {
        StartupError::ServerIdentity(format!("cannot read {}: {e}", key_path.display()))
    })?;
    build_server_config(&cert_pem, &key_pem, trust)
}

/// Build a [`rustls::ServerConfig`] from PEM-encoded certificate and private
/// key bytes, verifying client certificates against `trust`.
///
/// TLS 1.2 and 1.3 are enabled; ALPN offers `h2` and `http/1.1`.
///
/// # Errors
///
/// Returns an error if the certificate or key cannot be parsed, or if rustls
/// rejects the configuration.
pub fn build_server_config(
    cert_pem: &[u8],
    key_pem: &[u8],
    trust: &TrustStore,
) -> Result<Arc<ServerConfig>, StartupError> {
    let certs = rustls_pemfile::certs(&mut BufReader::new(cert_pem))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| {
            StartupError::ServerIdentity(format!("failed to parse TLS certificate chain: {e}"))
        })?;
    if certs.is_empty() {
        return Err(StartupError::ServerIdentity(
            "no certificate found in PEM data".into(),
        ));
    }

    let key = rustls_pemfile::private_key(&mut BufReader::new(key_pem))
        .map_err(|e| StartupError::ServerIdentity(format!("failed to read TLS private key: {e}")))?
        .ok_or_else(|| StartupError::ServerIdentity("no private key found in PEM data".into()))?;

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let verifier = client_verifier(trust, Arc::clone(&provider))?;

    let mut config = ServerConfig::builder_with_provider(provider)
        .with_protocol_versions(&[&rustls::version::TLS13, &rustls::version::TLS12])
        .map_err(|e| StartupError::ServerIdentity(format!("unsupported protocol versions: {e}")))?
        .with_client_cert_verifier(verifier)
        .with_single_cert(certs, key)
        .map_err(|e| StartupError::ServerIdentity(format!("cert/key mismatch or bad key: {e}")))?;

    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    debug!(trust_anchors = trust.len(), "mTLS server config built");
    Ok(Arc::new(config))
}

/// Choose the client verifier for `trust`.
///
/// `WebPkiClientVerifier` refuses to build without roots, so an empty store
/// gets [`RejectAllClients`] instead, which keeps the server running but
/// fails every handshake.
fn client_verifier(
    trust: &TrustStore,
    provider: Arc<CryptoProvider>,
) -> Result<Arc<dyn ClientCertVerifier>, StartupError> {
    if trust.is_empty() {
        debug!("no trust anchors; using reject-all client verifier");
        return Ok(Arc::new(RejectAllClients::new(&provider)));
    }

    WebPkiClientVerifier::builder_with_provider(trust.roots(), provider)
        .build()
        .map_err(|e| StartupError::ClientVerifier(e.to_string()))
}

/// Client verifier that demands a certificate and rejects all of them.
#[derive(Debug)]
pub struct RejectAllClients {
    algorithms: WebPkiSupportedAlgorithms,
}

impl RejectAllClients {
    pub fn new(provider: &CryptoProvider) -> Self {
        Self {
            algorithms: provider.signature_verification_algorithms,
        }
    }
}

impl ClientCertVerifier for RejectAllClients {
    fn client_auth_mandatory(&self) -> bool {
        true
    }

    fn root_hint_subjects(&self) -> &[DistinguishedName] {
        &[]
    }

    fn verify_client_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _now: UnixTime,
    ) -> Result<ClientCertVerified, rustls::Error> {
        Err(rustls::Error::InvalidCertificate(
            CertificateError::UnknownIssuer,
        ))
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}
