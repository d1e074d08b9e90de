//! HTTP front for the interception proxy.
//!
//! Every incoming request, whatever its path or method, is rewritten onto the
//! upstream origin and run through [`InterceptionProxy::handle`]. A request
//! the proxy cannot satisfy is answered with `504 Gateway Timeout` so the page
//! sees a failure rather than a fabricated success.

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::{Request, State},
    http::{HeaderValue, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use tower_http::trace::TraceLayer;
use tracing::warn;
use url::Url;

use super::lifecycle::{ClientId, InterceptionProxy, Served};
use super::request::InterceptedRequest;

/// Header a page may send to identify itself to the proxy.
pub const CLIENT_ID_HEADER: &str = "x-client-id";

/// Response header naming where the response came from.
pub const SOURCE_HEADER: &str = "x-offline-source";

const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

#[derive(Clone)]
struct ProxyServerState {
    proxy: Arc<InterceptionProxy>,
    upstream: Arc<Url>,
}

/// Build a router that sends every request through `proxy` to `upstream`.
pub fn router(proxy: Arc<InterceptionProxy>, upstream: Url) -> Router {
    Router::new()
        .fallback(intercept)
        .with_state(ProxyServerState {
            proxy,
            upstream: Arc::new(upstream),
        })
        .layer(TraceLayer::new_for_http())
}

async fn intercept(State(state): State<ProxyServerState>, request: Request) -> Response {
    let (parts, body) = request.into_parts();

    let body = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(body) => body,
        Err(e) => {
            return (StatusCode::PAYLOAD_TOO_LARGE, format!("Request body rejected: {e}"))
                .into_response();
        }
    };

    let target = upstream_url(&state.upstream, &parts.uri);

    let client = parts
        .headers
        .get(CLIENT_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map_or_else(ClientId::anonymous, ClientId::from);

    let mut headers = parts.headers;
    headers.remove(CLIENT_ID_HEADER);

    let intercepted = InterceptedRequest::new(parts.method, target, headers, body);
    match state.proxy.handle(&client, intercepted).await {
        Ok(served) => into_response(served),
        Err(e) => {
            warn!(error = %e, "Request failed in proxy");
            (
                StatusCode::GATEWAY_TIMEOUT,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                format!("No data available: {e}"),
            )
                .into_response()
        }
    }
}

/// Rewrite an incoming URI onto the upstream origin.
///
/// Only the path and query are taken from the request. A path such as
/// `//other.host/x` stays a path on the upstream.
fn upstream_url(upstream: &Url, uri: &Uri) -> Url {
    let mut url = upstream.clone();
    url.set_path(uri.path());
    url.set_query(uri.query());
    url
}

fn into_response(served: Served) -> Response {
    let Served { response, source } = served;

    let mut out = Response::new(Body::from(response.body));
    *out.status_mut() = response.status;
    *out.headers_mut() = response.headers;
    out.headers_mut()
        .insert(SOURCE_HEADER, HeaderValue::from_static(source.as_str()));
    out
}
