//! Audit logging of every request that reaches the HTTP layer.
//!
//! [`record_outcome`] is the outermost middleware. It notes the method, path
//! and remote address on entry, lets the rest of the stack run, and then
//! wraps the response body in [`AuditedBody`]. The record is emitted exactly
//! once, when the body reports end-of-stream, fails, or is dropped (client
//! went away mid-transfer), so the duration covers the whole response.
//!
//! The status is read from the response the inner stack returned. A response
//! head is written once, so this is the first and only status the client
//! sees.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use common::{AuditRecord, ClientIdentity};
use http_body::{Body as HttpBody, Frame, SizeHint};
use uuid::Uuid;

use super::connection::ClientConnection;
use crate::audit::SharedAuditSink;

/// Middleware: emit one [`AuditRecord`] per request to the sink in `State`.
pub async fn record_outcome(
    State(sink): State<SharedAuditSink>,
    request: Request,
    next: Next,
) -> Response {
    let started = Instant::now();
    let client_addr = request
        .extensions()
        .get::<ClientConnection>()
        .map(|c| c.remote_addr.to_string());
    let method = request.method().to_string();
    let path = request.uri().path().to_owned();

    let response = next.run(request).await;

    let pending = PendingAudit {
        sink,
        started,
        request_id: Uuid::new_v4().to_string(),
        client_addr,
        identity: response.extensions().get::<ClientIdentity>().cloned(),
        method,
        path,
        status: response.status().as_u16(),
    };
    response.map(|body| Body::new(AuditedBody::new(body, pending)))
}

/// Everything needed for the record except the end time. Emits on drop.
struct PendingAudit {
    sink: SharedAuditSink,
    started: Instant,
    request_id: String,
    client_addr: Option<String>,
    identity: Option<ClientIdentity>,
    method: String,
    path: String,
    status: u16,
}

impl Drop for PendingAudit {
    fn drop(&mut self) {
        let record = AuditRecord::new(
            std::mem::take(&mut self.request_id),
            self.client_addr.take(),
            self.identity.as_ref(),
            std::mem::take(&mut self.method),
            std::mem::take(&mut self.path),
            self.status,
            self.started.elapsed().as_secs_f64() * 1000.0,
        );
        self.sink.record(&record);
    }
}

pin_project_lite::pin_project! {
    /// Response body wrapper that completes the audit record when the body
    /// finishes.
    pub struct AuditedBody<B> {
        #[pin]
        inner: B,
        pending: Option<PendingAudit>,
    }
}

impl<B> AuditedBody<B> {
    fn new(inner: B, pending: PendingAudit) -> Self {
        Self {
            inner,
            pending: Some(pending),
        }
    }
}

impl<B: HttpBody> HttpBody for AuditedBody<B> {
    type Data = B::Data;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.project();
        let polled = this.inner.poll_frame(cx);
        if matches!(polled, Poll::Ready(None) | Poll::Ready(Some(Err(_)))) {
            this.pending.take();
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
