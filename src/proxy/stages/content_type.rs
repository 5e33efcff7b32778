//! Content-type negotiation.
//!
//! The first comma-separated entry of the Accept header becomes the
//! negotiated wire format for the request; downstream stages and the cache
//! layer rely on it. A resource request that negotiates nothing is rejected
//! outright with 400 rather than assuming a default: the only body-rewriting
//! consumer is format-specific, and a silently assumed format would mask
//! client bugs.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request};

use crate::proxy::chain::{Stage, StageFlow};
use crate::proxy::context::RequestContext;
use crate::proxy::response;

pub struct ContentTypeStage;

#[async_trait]
impl Stage for ContentTypeStage {
    fn name(&self) -> &'static str {
        "content_type"
    }

    async fn process(&self, ctx: &mut RequestContext, req: Request<Body>) -> StageFlow {
        if ctx.info.is_resource_request {
            let accept = req
                .headers()
                .get(header::ACCEPT)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();

            let content_type = accept.split(',').next().unwrap_or_default();
            if content_type.is_empty() {
                tracing::error!(path = %ctx.info.path, "no accept content type for request");
                return StageFlow::Halt(response::no_accept_content_type());
            }

            ctx.content_type = Some(content_type.to_string());
        }

        StageFlow::Continue(req)
    }
}
