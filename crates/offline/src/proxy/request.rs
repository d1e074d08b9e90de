//! Intercepted requests, their cache identity and strategy selection.

use axum::http::{HeaderMap, Method, header};
use bytes::Bytes;
use url::Url;

/// Header browsers use to announce what a request is for.
pub const FETCH_DEST_HEADER: &str = "sec-fetch-dest";

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "avif", "svg", "ico"];

/// What the requesting page intends to do with the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Image,
    Document,
    /// `fetch()`/XHR calls, e.g. the catalogue API.
    Empty,
    Other,
}

impl Destination {
    fn from_header(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "image" => Self::Image,
            "document" | "iframe" | "frame" => Self::Document,
            "" | "empty" => Self::Empty,
            _ => Self::Other,
        }
    }

    /// Classify a request.
    ///
    /// The `Sec-Fetch-Dest` header wins when present. Clients that do not
    /// send it are classified as images when they accept only `image/*` or
    /// when the URL path has a well-known image extension.
    #[must_use]
    pub fn classify(url: &Url, headers: &HeaderMap) -> Self {
        if let Some(dest) = headers
            .get(FETCH_DEST_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            return Self::from_header(dest);
        }

        let accepts_image = headers
            .get(header::ACCEPT)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|accept| accept.trim_start().starts_with("image/"));

        if accepts_image || has_image_extension(url) {
            return Self::Image;
        }

        let accepts_html = headers
            .get(header::ACCEPT)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|accept| accept.contains("text/html"));

        if accepts_html { Self::Document } else { Self::Empty }
    }
}

fn has_image_extension(url: &Url) -> bool {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .and_then(|last| last.rsplit_once('.'))
        .is_some_and(|(_, ext)| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
}

/// Caching strategy applied to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Serve from cache when present, otherwise fetch and cache.
    CacheFirst,
    /// Always try the network, fall back to cache on failure.
    NetworkFirst,
}

impl Strategy {
    /// Images are cache-first, everything else is network-first.
    #[must_use]
    pub const fn for_destination(destination: Destination) -> Self {
        match destination {
            Destination::Image => Self::CacheFirst,
            Destination::Document | Destination::Empty | Destination::Other => Self::NetworkFirst,
        }
    }
}

/// Cache identity of a request: method plus URL (fragment stripped).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    method: Method,
    url: String,
}

impl RequestKey {
    #[must_use]
    pub fn new(method: Method, url: &Url) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);
        Self {
            method,
            url: url.into(),
        }
    }

    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Only `GET` responses are cacheable.
    #[must_use]
    pub fn is_cacheable(&self) -> bool {
        self.method == Method::GET
    }
}

impl std::fmt::Display for RequestKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// An outgoing request observed by the proxy.
#[derive(Debug, Clone)]
pub struct InterceptedRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub destination: Destination,
}

impl InterceptedRequest {
    /// Build a request, classifying its destination from the headers and URL.
    #[must_use]
    pub fn new(method: Method, url: Url, headers: HeaderMap, body: Bytes) -> Self {
        let destination = Destination::classify(&url, &headers);
        Self {
            method,
            url,
            headers,
            body,
            destination,
        }
    }

    /// A bodiless `GET` with no headers.
    #[must_use]
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url, HeaderMap::new(), Bytes::new())
    }

    /// Override the classified destination.
    #[must_use]
    pub const fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    #[must_use]
    pub fn key(&self) -> RequestKey {
        RequestKey::new(self.method.clone(), &self.url)
    }

    #[must_use]
    pub const fn strategy(&self) -> Strategy {
        Strategy::for_destination(self.destination)
    }
}
