//! TLS listener, request pipeline, and file serving.
//!
//! # Request flow
//!
//! ```text
//! TCP accept
//!   → TLS handshake (client chain verified against the trust store)
//!   → ClientConnection attached to every request on the connection
//!   → audit     (outermost: sees the final status, emits one record)
//!   → authz     (401 unless a verified chain is attached; extracts identity)
//!   → timeout / panic containment
//!   → content   (ServeDir under the data root, directory listings)
//! ```

pub mod audit;
pub mod authz;
pub mod connection;
pub mod content;
pub mod listener;
pub mod router;
pub mod state;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use common::RequestError;

/// Plain-text response for a server-generated rejection.
pub(crate) fn error_response(err: RequestError) -> Response {
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; charset=utf-8"),
            ),
            (
                header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            ),
        ],
        err.body(),
    )
        .into_response()
}
