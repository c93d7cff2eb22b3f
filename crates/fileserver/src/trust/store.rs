//! [`TrustStore`]: the immutable set of CA certificates client chains are
//! verified against.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::pki_types::CertificateDer;
use rustls::RootCertStore;
use rustls_pemfile::Item;
use tracing::debug;
use x509_parser::prelude::{FromDer, X509Certificate};

/// A trusted CA as it was loaded, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustAnchorSummary {
    /// Subject distinguished name of the CA certificate.
    pub subject: String,
    /// File the certificate was read from.
    pub source: PathBuf,
}

/// Immutable verification set built once at startup.
///
/// Cloning is cheap; every clone shares the same underlying [`RootCertStore`].
#[derive(Clone, Debug)]
pub struct TrustStore {
    roots: Arc<RootCertStore>,
    anchors: Arc<[TrustAnchorSummary]>,
}

impl TrustStore {
    /// A store with no trust anchors. A server built on it rejects every
    /// client.
    pub fn empty() -> Self {
        TrustStoreBuilder::new().build()
    }

    /// Number of trust anchors.
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// The anchors in load order.
    pub fn anchors(&self) -> &[TrustAnchorSummary] {
        &self.anchors
    }

    /// Shared handle to the rustls root store, for building the client
    /// verifier.
    pub fn roots(&self) -> Arc<RootCertStore> {
        Arc::clone(&self.roots)
    }
}

/// Accumulates CA certificates before freezing them into a [`TrustStore`].
#[derive(Debug)]
pub struct TrustStoreBuilder {
    roots: RootCertStore,
    anchors: Vec<TrustAnchorSummary>,
}

impl TrustStoreBuilder {
    pub fn new() -> Self {
        Self {
            roots: RootCertStore::empty(),
            anchors: Vec::new(),
        }
    }

    /// Add every `CERTIFICATE` block in `pem` and return how many became
    /// trust anchors.
    ///
    /// Other PEM sections (keys, CRLs) are ignored. A certificate that cannot
    /// be turned into a trust anchor is skipped. A malformed section is
    /// skipped and scanning resumes after it.
    pub fn add_pem(&mut self, source: &Path, pem: &[u8]) -> usize {
        let mut reader = pem;
        let mut added = 0;
        loop {
            let remaining = reader.len();
            match rustls_pemfile::read_one(&mut reader) {
                Ok(Some(Item::X509Certificate(der))) => {
                    if self.add_der(source, der) {
                        added += 1;
                    }
                }
                Ok(Some(_)) => {}
                Ok(None) => break,
                Err(e) => {
                    debug!(path = %source.display(), error = %e, "malformed PEM section");
                    // Every parse error consumes input; stop if this one did not.
                    if reader.len() == remaining {
                        break;
                    }
                }
            }
        }
        added
    }

    fn add_der(&mut self, source: &Path, der: CertificateDer<'static>) -> bool {
        let subject = subject_of(&der);
        match self.roots.add(der) {
            Ok(()) => {
                self.anchors.push(TrustAnchorSummary {
                    subject,
                    source: source.to_path_buf(),
                });
                true
            }
            Err(e) => {
                debug!(path = %source.display(), error = %e, "certificate rejected as trust anchor");
                false
            }
        }
    }

    pub fn build(self) -> TrustStore {
        TrustStore {
            roots: Arc::new(self.roots),
            anchors: self.anchors.into(),
        }
    }
}

impl Default for TrustStoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn subject_of(der: &CertificateDer<'_>) -> String {
    match X509Certificate::from_der(der.as_ref()) {
        Ok((_, cert)) => cert.subject().to_string(),
        Err(_) => String::from("<unparsed>"),
    }
}
