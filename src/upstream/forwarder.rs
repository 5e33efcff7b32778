//! Remote serving path: request forwarding to the control plane.
//!
//! # Responsibilities
//! - Answer the dispatcher's health predicate (cheap, non-blocking)
//! - Forward the request to the first healthy endpoint, rewriting
//!   scheme/authority and stripping hop-by-hop headers, and stream the
//!   response back untouched
//! - Mark transport failures against the endpoint (passive health)
//!
//! # Design Decisions
//! - No retries; a transport error is a 502 and the dispatcher never
//!   re-routes the same request locally
//! - Plain-HTTP transport; TLS and credentials live outside this gateway

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::header::{self, HeaderMap, HeaderName};
use axum::http::uri::{Authority, Scheme};
use axum::http::{Request, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;

use crate::proxy::context::RequestContext;
use crate::proxy::dispatch::RemoteHandler;
use crate::upstream::endpoint::Endpoint;

/// Forwards requests to the remote control plane.
pub struct RemoteServer {
    endpoints: Vec<Arc<Endpoint>>,
    client: Client<HttpConnector, Body>,
    unhealthy_threshold: u32,
}

impl RemoteServer {
    pub fn new(endpoints: Vec<Arc<Endpoint>>, unhealthy_threshold: u32) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            endpoints,
            client,
            unhealthy_threshold,
        }
    }

    fn pick(&self) -> Option<&Arc<Endpoint>> {
        self.endpoints.iter().find(|e| e.is_healthy())
    }

    fn rewrite_uri(endpoint: &Endpoint, uri: &Uri) -> Uri {
        let mut parts = uri.clone().into_parts();
        parts.scheme = match endpoint.url.scheme() {
            "https" => Some(Scheme::HTTPS),
            _ => Some(Scheme::HTTP),
        };

        let host = endpoint.url.host_str().unwrap_or_default();
        let authority = match endpoint.url.port_or_known_default() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        if let Ok(authority) = Authority::from_str(&authority) {
            parts.authority = Some(authority);
        }
        if parts.path_and_query.is_none() {
            parts.path_and_query = Some("/".parse().expect("static path"));
        }

        Uri::from_parts(parts).unwrap_or_else(|_| uri.clone())
    }
}

#[async_trait]
impl RemoteHandler for RemoteServer {
    fn is_healthy(&self) -> bool {
        self.endpoints.iter().any(|e| e.is_healthy())
    }

    async fn serve(&self, ctx: &RequestContext, req: Request<Body>) -> Response {
        let Some(endpoint) = self.pick() else {
            // Health flipped between the dispatcher's check and now.
            return (StatusCode::BAD_GATEWAY, "no healthy upstream endpoint").into_response();
        };

        let (mut parts, body) = req.into_parts();
        parts.uri = Self::rewrite_uri(endpoint, &parts.uri);
        strip_hop_by_hop(&mut parts.headers);
        let req = Request::from_parts(parts, body);

        tracing::debug!(
            verb = %ctx.info.verb,
            path = %ctx.info.path,
            upstream = %endpoint.url,
            "forwarding request upstream"
        );

        match self.client.request(req).await {
            Ok(response) => {
                let (parts, body) = response.into_parts();
                Response::from_parts(parts, Body::new(body))
            }
            Err(e) => {
                tracing::error!(upstream = %endpoint.url, error = %e, "upstream request failed");
                endpoint.mark_failure(self.unhealthy_threshold);
                (StatusCode::BAD_GATEWAY, "upstream request failed").into_response()
            }
        }
    }
}

/// Remove hop-by-hop headers before forwarding: the standard set plus any
/// header the Connection header names. These govern the client connection to
/// this gateway, not the upstream one.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let connection_named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .flat_map(|value| value.to_str().unwrap_or_default().split(','))
        .filter_map(|name| HeaderName::from_str(name.trim()).ok())
        .collect();
    for name in connection_named {
        headers.remove(name);
    }

    for name in [
        header::CONNECTION,
        header::PROXY_AUTHENTICATE,
        header::PROXY_AUTHORIZATION,
        header::TE,
        header::TRAILER,
        header::TRANSFER_ENCODING,
        header::UPGRADE,
    ] {
        headers.remove(name);
    }
    headers.remove("keep-alive");
    headers.remove("proxy-connection");
}
