//! Axum router construction.

use axum::{middleware, Router};
use tower_http::{
    catch_panic::CatchPanicLayer, compression::CompressionLayer, timeout::TimeoutLayer,
    trace::TraceLayer,
};

use super::{audit, authz, content, state::AppState};

/// Build the application [`Router`] with the file service and all middleware
/// attached.
///
/// Layers run outermost first: audit, trace, authz, compression, timeout,
/// panic containment, then the file service.
pub fn build(state: AppState) -> Router {
    Router::new()
        .fallback_service(content::serve(&state.data_dir))
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::new(state.request_timeout))
        .layer(CompressionLayer::new())
        .layer(middleware::from_fn(authz::require_verified_client))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn_with_state(
            state.audit.clone(),
            audit::record_outcome,
        ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use axum_test::TestServer;
    use common::Outcome;
    use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair};
    use tower::ServiceExt;

    use crate::audit::MockAuditSink;
    use crate::server::connection::ClientConnection;

    fn leaf(cn: &str) -> rustls::pki_types::CertificateDer<'static> {
        let mut params = CertificateParams::default();
        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, cn);
        params.distinguished_name = dn;
        let key = KeyPair::generate().unwrap();
        params.self_signed(&key).unwrap().der().clone()
    }

    #[tokio::test]
    async fn request_without_connection_is_rejected_and_audited() {
        let data = tempfile::tempdir().unwrap();
        fs::write(data.path().join("index.html"), "secret index").unwrap();

        let mut sink = MockAuditSink::new();
        sink.expect_record()
            .withf(|r| r.status == 401 && r.outcome == Outcome::Fail && r.serial.is_none())
            .times(1)
            .return_const(());
        let state = AppState::new(
            data.path().to_path_buf(),
            Arc::new(sink),
            Duration::from_secs(5),
        );

        let server = TestServer::new(build(state)).unwrap();
        let response = server.get("/").await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(response.text(), "Client certificate required\n");
    }

    #[tokio::test]
    async fn verified_connection_is_served_and_audited() {
        let data = tempfile::tempdir().unwrap();
        fs::write(data.path().join("report.txt"), "quarterly numbers").unwrap();

        let mut sink = MockAuditSink::new();
        sink.expect_record()
            .withf(|r| {
                r.status == 200
                    && r.outcome == Outcome::Success
                    && r.common_name == "alice"
                    && r.path == "/report.txt"
                    && r.client_addr.as_deref() == Some("127.0.0.1:40000")
            })
            .times(1)
            .return_const(());
        let state = AppState::new(
            data.path().to_path_buf(),
            Arc::new(sink),
            Duration::from_secs(5),
        );

        let conn = ClientConnection::new(
            "127.0.0.1:40000".parse().unwrap(),
            vec![leaf("alice")],
        );
        let req = Request::builder()
            .uri("/report.txt")
            .extension(conn)
            .body(Body::empty())
            .unwrap();
        let resp = build(state).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"quarterly numbers");
    }

    #[tokio::test]
    async fn missing_file_for_verified_client_is_audited_as_failure() {
        let data = tempfile::tempdir().unwrap();

        let mut sink = MockAuditSink::new();
        sink.expect_record()
            .withf(|r| r.status == 404 && r.outcome == Outcome::Fail && r.common_name == "bob")
            .times(1)
            .return_const(());
        let state = AppState::new(
            data.path().to_path_buf(),
            Arc::new(sink),
            Duration::from_secs(5),
        );

        let conn = ClientConnection::new("127.0.0.1:40001".parse().unwrap(), vec![leaf("bob")]);
        let req = Request::builder()
            .uri("/absent.txt")
            .extension(conn)
            .body(Body::empty())
            .unwrap();
        let resp = build(state).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
    }
}
