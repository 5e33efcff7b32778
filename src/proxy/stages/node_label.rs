//! Node-label injection.
//!
//! # Responsibilities
//! - On node-create requests only: decode the body, merge the configured
//!   label set into the node, re-encode with the same serializer, and swap
//!   the body (and declared length) in place
//! - Leave every other request byte-identical
//!
//! # Design Decisions
//! - Full body buffering: acceptable because the stage triggers only on the
//!   narrow, low-volume nodes/create combination, never on reads or watches
//! - Decode, type and encode failures are terminal 500s carrying the
//!   underlying error; nothing is retried

use std::collections::BTreeMap;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderValue, Request};

use crate::kubernetes::NegotiatedSerializer;
use crate::proxy::chain::{Stage, StageFlow};
use crate::proxy::context::RequestContext;
use crate::proxy::response;

/// Upper bound for a buffered node-create body.
const MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

pub struct NodeLabelStage {
    labels: BTreeMap<String, String>,
}

impl NodeLabelStage {
    pub fn new(labels: BTreeMap<String, String>) -> Self {
        Self { labels }
    }

    fn applies(&self, ctx: &RequestContext) -> bool {
        ctx.info.resource == "nodes" && ctx.info.verb == "create"
    }
}

#[async_trait]
impl Stage for NodeLabelStage {
    fn name(&self) -> &'static str {
        "node_label"
    }

    async fn process(&self, ctx: &mut RequestContext, req: Request<Body>) -> StageFlow {
        if !self.applies(ctx) {
            return StageFlow::Continue(req);
        }

        tracing::info!(labels = ?self.labels, "rewriting node-create body with configured labels");

        let content_type = ctx.content_type.as_deref().unwrap_or_default();
        let serializer = match NegotiatedSerializer::select(
            content_type,
            &ctx.info.api_group,
            &ctx.info.api_version,
        ) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "failed to select serializer");
                return StageFlow::Halt(response::internal_error(e));
            }
        };
        let (group, version) = serializer.group_version();
        tracing::debug!(group, version, content_type, "selected body serializer");

        let (mut parts, body) = req.into_parts();
        let bytes = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(error = %e, "failed to read node-create body");
                return StageFlow::Halt(response::internal_error(e));
            }
        };

        let mut node = match serializer.decode_node(&bytes) {
            Ok(node) => node,
            Err(e) => {
                tracing::error!(error = %e, "failed to decode node-create body");
                return StageFlow::Halt(response::internal_error(e));
            }
        };

        node.merge_labels(&self.labels);

        let encoded = match serializer.encode_node(&node) {
            Ok(encoded) => encoded,
            Err(e) => {
                tracing::error!(error = %e, "failed to re-encode node object");
                return StageFlow::Halt(response::internal_error(e));
            }
        };

        // The rewritten body has a known length; a stale chunked declaration
        // must not travel with it.
        parts.headers.remove(header::TRANSFER_ENCODING);
        parts
            .headers
            .insert(header::CONTENT_LENGTH, HeaderValue::from(encoded.len()));
        StageFlow::Continue(Request::from_parts(parts, Body::from(encoded)))
    }
}
