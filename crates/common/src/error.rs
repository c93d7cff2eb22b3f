//! Error taxonomy shared across crates.

use std::path::PathBuf;

use thiserror::Error;

/// Fatal startup failures. Any of these terminates the process before the
/// listener accepts a connection.
#[derive(Debug, Error)]
pub enum StartupError {
    /// A required directory (data root or trust directory) is missing or is
    /// not a directory.
    #[error("{kind} directory {} does not exist", path.display())]
    MissingDirectory {
        /// `"data"` or `"trust"`.
        kind: &'static str,
        path: PathBuf,
    },

    /// The trust directory exists but its entries could not be enumerated.
    #[error("failed to read trust directory {}: {source}", path.display())]
    TrustDirUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The trust directory produced no usable CA certificate and the
    /// configuration demands at least one.
    #[error("no trusted CA certificates found in {}", path.display())]
    NoTrustAnchors { path: PathBuf },

    /// The server certificate chain or private key could not be loaded.
    #[error("failed to load server identity: {0}")]
    ServerIdentity(String),

    /// The client certificate verifier could not be built from the trust
    /// store.
    #[error("failed to build client certificate verifier: {0}")]
    ClientVerifier(String),

    /// The configured listen address is not a valid socket address.
    #[error("invalid listen address {0:?}")]
    InvalidListenAddr(String),
}

/// Per-request rejections produced by the server itself (as opposed to the
/// file service, which picks its own status codes).
///
/// Variants map to HTTP status codes returned to callers:
/// - [`RequestError::Unauthorized`] → 401
/// - [`RequestError::Forbidden`] → 403
/// - [`RequestError::NotFound`] → 404
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RequestError {
    /// The connection carries no verified client certificate chain.
    #[error("Client certificate required")]
    Unauthorized,

    /// The requested file or directory exists but the server may not read
    /// it.
    #[error("403 Forbidden")]
    Forbidden,

    /// Nothing under the data root matches the requested path.
    #[error("404 page not found")]
    NotFound,
}

impl RequestError {
    /// Returns the HTTP status code that should be sent for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            RequestError::Unauthorized => 401,
            RequestError::Forbidden => 403,
            RequestError::NotFound => 404,
        }
    }

    /// Fixed plain-text response body, newline terminated.
    pub fn body(&self) -> String {
        format!("{self}\n")
    }
}
