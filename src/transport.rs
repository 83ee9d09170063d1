//! Blocking HTTP capability used by every outbound call.
//!
//! Callers talk to [`HttpTransport`] so the provider API, manifest fetch and
//! license POST can be exercised against in-process fakes.
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::error::{Error, Result};

/// Ordered request headers as `(name, value)` pairs.
pub type Headers = Vec<(String, String)>;

/// Status and body of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Whether the status is in the 2xx range.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body decoded as UTF-8, lossily.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// A blocking "request bytes with headers and a timeout" capability.
///
/// Any HTTP status is a successful exchange; only failures to complete the
/// request (DNS, connect, TLS, timeout) are errors.
pub trait HttpTransport: Send + Sync {
    fn get(&self, url: &str, headers: &Headers, timeout: Duration) -> Result<HttpResponse>;

    fn post(
        &self,
        url: &str,
        headers: &Headers,
        body: &[u8],
        timeout: Duration,
    ) -> Result<HttpResponse>;
}

/// [`HttpTransport`] over a shared `reqwest` blocking client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("vodkey/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Transport(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    fn send(&self, request: reqwest::blocking::RequestBuilder, url: &str) -> Result<HttpResponse> {
        let response = request
            .send()
            .map_err(|e| Error::Transport(format!("Request to {} failed: {}", url, e)))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .map_err(|e| Error::Transport(format!("Failed to read body from {}: {}", url, e)))?
            .to_vec();
        trace!("{} answered {} ({} bytes)", url, status, body.len());
        Ok(HttpResponse { status, body })
    }
}

impl HttpTransport for ReqwestTransport {
    fn get(&self, url: &str, headers: &Headers, timeout: Duration) -> Result<HttpResponse> {
        let request = self
            .client
            .get(url)
            .headers(header_map(headers)?)
            .timeout(timeout);
        self.send(request, url)
    }

    fn post(
        &self,
        url: &str,
        headers: &Headers,
        body: &[u8],
        timeout: Duration,
    ) -> Result<HttpResponse> {
        let request = self
            .client
            .post(url)
            .headers(header_map(headers)?)
            .body(body.to_vec())
            .timeout(timeout);
        self.send(request, url)
    }
}

fn header_map(headers: &Headers) -> Result<HeaderMap> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::InvalidHeader(format!("name {}: {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::InvalidHeader(format!("value of {}: {}", name, e)))?;
        map.append(name, value);
    }
    Ok(map)
}
