//! Request authorization: only requests carried by a connection with a
//! verified client chain reach the file service.
//!
//! With the mandatory-client-auth transport every request that gets here
//! already has a verified chain. The check runs anyway so that serving never
//! depends on how the transport was configured.

use axum::{extract::Request, middleware::Next, response::Response};
use common::{ClientIdentity, RequestError};
use tracing::{info, warn};

use super::connection::ClientConnection;
use super::error_response;
use crate::identity;

/// Middleware: reject with 401 unless the request's connection carries a
/// verified client chain; otherwise attach the [`ClientIdentity`] to the
/// request and to the response (for the audit layer) and continue.
pub async fn require_verified_client(mut request: Request, next: Next) -> Response {
    let identity = match verified_identity(&request) {
        Ok(identity) => identity,
        Err(reason) => {
            warn!(path = %request.uri().path(), reason, "request rejected: no verified client certificate");
            return error_response(RequestError::Unauthorized);
        }
    };

    info!(
        common_name = identity.display_name(),
        serial = %identity.serial,
        "authenticated client"
    );

    request.extensions_mut().insert(identity.clone());
    let mut response = next.run(request).await;
    response.extensions_mut().insert(identity);
    response
}

fn verified_identity(request: &Request) -> Result<ClientIdentity, &'static str> {
    let leaf = request
        .extensions()
        .get::<ClientConnection>()
        .ok_or("no TLS connection state")?
        .verified_leaf()
        .ok_or("no verified certificate chain")?;
    identity::from_der(leaf.as_ref()).map_err(|_| "unparseable leaf certificate")
}
