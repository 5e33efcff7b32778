//! Local fallback path.
//!
//! Serves requests while the remote control plane is unreachable. Without a
//! response cache there is little to answer with: watch requests are held
//! open so node agents do not spin on reconnects, everything else gets an
//! explicit 503 with a retry hint.

use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use tokio_stream::wrappers::ReceiverStream;

use crate::proxy::context::RequestContext;
use crate::proxy::dispatch::LocalHandler;
use crate::proxy::writer::{FlushMode, StreamWriter};

/// How long a watch is held open when the client does not say.
const DEFAULT_WATCH_TIMEOUT_SECS: u64 = 60;

/// Offline responder used whenever the remote path reports unhealthy.
pub struct OfflineProxy;

impl OfflineProxy {
    pub fn new() -> Self {
        Self
    }

    /// Hold a watch open until the client's timeout elapses or the client
    /// disconnects, then end the stream cleanly. No events are produced;
    /// the value is keeping agents from hot-looping on reconnect attempts.
    fn serve_watch(&self, ctx: &RequestContext, req: &Request<Body>) -> Response {
        let timeout = watch_timeout(req.uri());
        let mut close_notify = ctx.close_notify();
        let (writer, rx) = StreamWriter::channel(FlushMode::PerFrame);

        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(timeout) => {
                    tracing::debug!("local watch timed out, closing stream");
                }
                _ = close_notify.recv() => {
                    tracing::debug!("client disconnected, closing local watch");
                }
            }
            writer.flush();
        });

        let mut response = Response::new(Body::from_stream(ReceiverStream::new(rx)));
        if let Some(content_type) = ctx.content_type.as_deref() {
            if let Ok(value) = content_type.parse() {
                response
                    .headers_mut()
                    .insert(header::CONTENT_TYPE, value);
            }
        }
        response
    }
}

impl Default for OfflineProxy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LocalHandler for OfflineProxy {
    async fn serve(&self, ctx: &RequestContext, req: Request<Body>) -> Response {
        if ctx.info.is_resource_request && ctx.info.verb == "watch" {
            return self.serve_watch(ctx, &req);
        }

        (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::RETRY_AFTER, "10")],
            "remote server unavailable and no local data for request",
        )
            .into_response()
    }
}

/// `timeoutSeconds` query parameter, or the default.
fn watch_timeout(uri: &Uri) -> Duration {
    let secs = uri
        .query()
        .and_then(|q| {
            q.split('&')
                .find_map(|pair| pair.strip_prefix("timeoutSeconds="))
        })
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(DEFAULT_WATCH_TIMEOUT_SECS);
    Duration::from_secs(secs)
}
