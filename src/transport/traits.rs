//! Transport trait abstraction for the controller link

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Status line and body of one completed request
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// The controller answers 200 for an accepted command
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Errors below the HTTP status level
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("Request timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("HTTP client unavailable: {0}")]
    Client(String),
}

/// Performs single GET requests against the controller
#[async_trait]
pub trait Transport: Send + Sync {
    /// GET `path` (no leading slash, may carry a query) from `base`
    async fn get(&self, base: &str, path: &str) -> Result<HttpResponse, TransportError>;

    /// Human-readable name for this transport
    fn name(&self) -> &'static str;
}

/// Join an endpoint base and a request path into a URL
pub fn request_url(base: &str, path: &str) -> String {
    let base = base.trim().trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if base.starts_with("http://") || base.starts_with("https://") {
        format!("{}/{}", base, path)
    } else {
        format!("http://{}/{}", base, path)
    }
}
