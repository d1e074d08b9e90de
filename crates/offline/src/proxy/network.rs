//! The network behind the proxy.

use std::time::Duration;

use async_trait::async_trait;
use axum::http::{HeaderMap, header};
use thiserror::Error;
use tracing::{debug, instrument};

use super::cache::ProxyResponse;
use super::request::InterceptedRequest;

/// Hop-by-hop headers that must not be forwarded or replayed.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Errors from the network layer.
///
/// Only transport-level failures are errors. A response with any HTTP status,
/// including 4xx and 5xx, is a successful network round trip.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// HTTP request failed (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Network could not be reached for another reason.
    #[error("Network unreachable: {0}")]
    Unreachable(String),
}

/// Something that can perform a request over the network.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &InterceptedRequest) -> Result<ProxyResponse, NetworkError>;
}

/// Network backed by a `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpNetwork {
    client: reqwest::Client,
}

impl HttpNetwork {
    /// Create a network client with an optional per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(timeout: Option<Duration>) -> Result<Self, NetworkError> {
        let mut builder = reqwest::Client::builder()
            // Redirects are the page's business, not the proxy's.
            .redirect(reqwest::redirect::Policy::none());
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl Network for HttpNetwork {
    #[instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    async fn fetch(&self, request: &InterceptedRequest) -> Result<ProxyResponse, NetworkError> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(forwardable_headers(&request.headers));
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = forwardable_headers(response.headers());
        let body = response.bytes().await?;

        debug!(status = %status, bytes = body.len(), "Network response");
        Ok(ProxyResponse {
            status,
            headers,
            body,
        })
    }
}

/// Copy `headers` without hop-by-hop headers, `Host` and `Content-Length`.
///
/// `Host` is set by the client for the target URL and `Content-Length` is
/// recomputed from the body when a response is replayed.
#[must_use]
pub fn forwardable_headers(headers: &HeaderMap) -> HeaderMap {
    let mut forwarded = headers.clone();
    for name in HOP_BY_HOP {
        forwarded.remove(*name);
    }
    forwarded.remove(header::HOST);
    forwarded.remove(header::CONTENT_LENGTH);
    forwarded
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn test_forwardable_headers_strips_hop_by_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("localhost:3100"));
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("12"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("image/png"));
        headers.insert("sec-fetch-dest", HeaderValue::from_static("image"));

        let forwarded = forwardable_headers(&headers);
        assert_eq!(forwarded.len(), 2);
        assert_eq!(forwarded.get(header::CONTENT_TYPE).map(HeaderValue::as_bytes), Some(&b"image/png"[..]));
        assert!(forwarded.contains_key("sec-fetch-dest"));
    }

    #[test]
    fn test_unreachable_display() {
        let err = NetworkError::Unreachable("offline".to_string());
        assert_eq!(err.to_string(), "Network unreachable: offline");
    }
}
