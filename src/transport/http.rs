//! HTTP transport over reqwest
//!
//! Every request carries `Connection: close`, never follows redirects and
//! shares one fixed timeout.

use crate::transport::traits::{request_url, HttpResponse, Transport, TransportError};
use async_trait::async_trait;
use reqwest::header::{HeaderValue, CONNECTION};
use reqwest::redirect::Policy;
use std::time::Duration;
use tracing::debug;

pub struct HttpTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpTransport {
    /// Build a transport with the given request timeout
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .redirect(Policy::none())
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;

        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Request(err.to_string())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, base: &str, path: &str) -> Result<HttpResponse, TransportError> {
        let url = request_url(base, path);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .header(CONNECTION, HeaderValue::from_static("close"))
            .send()
            .await
            .map_err(classify)?;

        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(classify)?;
        Ok(HttpResponse { status, body })
    }

    fn name(&self) -> &'static str {
        "HTTP"
    }
}
