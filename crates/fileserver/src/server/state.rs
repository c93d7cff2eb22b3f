//! Shared application state used to assemble the router.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::audit::SharedAuditSink;

/// Read-only state shared by every request.
///
/// All fields are cheaply cloneable so the state can be handed to each layer
/// without copying.
#[derive(Clone)]
pub struct AppState {
    /// Root of the served tree.
    pub data_dir: Arc<PathBuf>,
    /// Process-wide audit sink.
    pub audit: SharedAuditSink,
    /// Deadline for producing a response head.
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(data_dir: PathBuf, audit: SharedAuditSink, request_timeout: Duration) -> Self {
        Self {
            data_dir: Arc::new(data_dir),
            audit,
            request_timeout,
        }
    }
}
