//! Static content under the data root.
//!
//! Files are served by [`ServeDir`], which resolves paths without leaving
//! the root and redirects directory requests that lack a trailing slash.
//! Whatever `ServeDir` cannot answer (missing or unreadable files,
//! directories without an `index.html`, rejected paths) falls through to
//! [`DirectoryListing`]. Permission errors become `403`, everything else it
//! cannot serve `404`.

use std::convert::Infallible;
use std::fmt::Write as _;
use std::future::Future;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{header, HeaderValue, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use common::RequestError;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use tower::Service;
use tower_http::services::ServeDir;
use tracing::debug;

use super::error_response;

/// Characters escaped in listing links, on top of control characters.
const HREF_ESCAPE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// The file service for `root`.
pub fn serve(root: &Path) -> ServeDir<DirectoryListing> {
    ServeDir::new(root)
        .append_index_html_on_directories(true)
        .fallback(DirectoryListing::new(root))
}

/// Fallback service: renders an HTML index for directory requests ending in
/// `/`, 403 for paths the server may not read, 404 for everything else.
#[derive(Debug, Clone)]
pub struct DirectoryListing {
    root: Arc<PathBuf>,
}

impl DirectoryListing {
    pub fn new(root: &Path) -> Self {
        Self {
            root: Arc::new(root.to_path_buf()),
        }
    }
}

impl<B> Service<Request<B>> for DirectoryListing {
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<B>) -> Self::Future {
        let root = Arc::clone(&self.root);
        let uri_path = request.uri().path().to_owned();
        Box::pin(async move { Ok(fallback(&root, &uri_path).await) })
    }
}

async fn fallback(root: &Path, uri_path: &str) -> Response {
    let Some(path) = resolve(root, uri_path) else {
        debug!(path = uri_path, "rejected path outside the data root");
        return error_response(RequestError::NotFound);
    };
    if uri_path.ends_with('/') {
        render_listing(&path, uri_path).await
    } else {
        unserved_file(&path, uri_path).await
    }
}

/// A file request `ServeDir` declined. Re-open it to tell a permission
/// failure apart from a missing file.
async fn unserved_file(path: &Path, uri_path: &str) -> Response {
    match tokio::fs::File::open(path).await {
        Err(e) => io_error_response(uri_path, &e),
        Ok(_) => error_response(RequestError::NotFound),
    }
}

fn io_error_response(uri_path: &str, e: &io::Error) -> Response {
    debug!(path = uri_path, error = %e, "path not servable");
    match e.kind() {
        io::ErrorKind::PermissionDenied => error_response(RequestError::Forbidden),
        _ => error_response(RequestError::NotFound),
    }
}

async fn render_listing(dir: &Path, uri_path: &str) -> Response {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => return io_error_response(uri_path, &e),
    };

    let mut names = Vec::new();
    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => {
                let mut name = entry.file_name().to_string_lossy().into_owned();
                let is_dir = tokio::fs::metadata(entry.path())
                    .await
                    .map(|m| m.is_dir())
                    .unwrap_or(false);
                if is_dir {
                    name.push('/');
                }
                names.push(name);
            }
            Ok(None) => break,
            Err(e) => {
                debug!(path = uri_path, error = %e, "directory listing interrupted");
                return (StatusCode::INTERNAL_SERVER_ERROR, "Error reading directory\n")
                    .into_response();
            }
        }
    }
    names.sort();

    let mut html = String::from("<!doctype html>\n<meta name=\"viewport\" content=\"width=device-width\">\n<pre>\n");
    for name in &names {
        let _ = writeln!(
            html,
            "<a href=\"{}\">{}</a>",
            escape_html(&utf8_percent_encode(name, HREF_ESCAPE).to_string()),
            escape_html(name)
        );
    }
    html.push_str("</pre>\n");

    let mut response = Response::new(Body::from(html));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    response
}

/// Map a request path onto a location under `root`.
///
/// Returns `None` for anything that is not a plain relative path once
/// percent-decoded: parent segments, absolute or prefixed components,
/// backslashes, and NUL bytes.
pub fn resolve(root: &Path, uri_path: &str) -> Option<PathBuf> {
    let decoded = percent_decode_str(uri_path).decode_utf8().ok()?;
    let mut resolved = root.to_path_buf();

    for segment in decoded.split('/') {
        if segment.is_empty() || segment == "." {
            continue;
        }
        if segment == ".." || segment.contains('\\') || segment.contains('\0') {
            return None;
        }
        let mut components = Path::new(segment).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(part)), None) => resolved.push(part),
            _ => return None,
        }
    }
    Some(resolved)
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
