//! Client identity extraction from a verified leaf certificate.

use common::ClientIdentity;
use sha2::{Digest, Sha256};
use thiserror::Error;
use x509_parser::certificate::X509Certificate;
use x509_parser::prelude::FromDer;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("failed to parse client certificate: {0}")]
    Parse(String),
}

/// Parse a DER-encoded leaf certificate into a [`ClientIdentity`].
///
/// # Errors
///
/// Returns [`IdentityError::Parse`] if the bytes are not a valid X.509
/// certificate.
pub fn from_der(der: &[u8]) -> Result<ClientIdentity, IdentityError> {
    let (_, cert) =
        X509Certificate::from_der(der).map_err(|e| IdentityError::Parse(e.to_string()))?;

    Ok(ClientIdentity {
        common_name: extract_cn(&cert),
        serial: cert.tbs_certificate.serial.to_string(),
        issuer: cert.issuer().to_string(),
        fingerprint_sha256: hex::encode(Sha256::digest(der)),
    })
}

fn extract_cn(cert: &X509Certificate<'_>) -> Option<String> {
    cert.subject()
        .iter_common_name()
        .next()
        .and_then(|attr| attr.as_str().ok())
        .map(str::to_owned)
}
