//! Terminal dispatch: health-routed failover.
//!
//! # Responsibilities
//! - Evaluate the remote path's health predicate exactly once per request
//! - Delegate the full request/response lifecycle to remote or local path
//!
//! # Design Decisions
//! - Pure routing switch: no retries, no response buffering, no context
//!   enrichment
//! - At most one of {remote, local} handles a given request

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use axum::response::Response;

use crate::proxy::context::RequestContext;

/// The remote serving path (cluster control plane).
#[async_trait]
pub trait RemoteHandler: Send + Sync {
    /// Cheap, synchronous health predicate; must not block.
    fn is_healthy(&self) -> bool;

    /// Own the full request/response lifecycle.
    async fn serve(&self, ctx: &RequestContext, req: Request<Body>) -> Response;
}

/// The local fallback path, used whenever the remote path is unhealthy.
#[async_trait]
pub trait LocalHandler: Send + Sync {
    async fn serve(&self, ctx: &RequestContext, req: Request<Body>) -> Response;
}

/// Chooses between the remote and local path, exactly once per request.
pub struct Dispatcher {
    remote: Arc<dyn RemoteHandler>,
    local: Arc<dyn LocalHandler>,
}

impl Dispatcher {
    pub fn new(remote: Arc<dyn RemoteHandler>, local: Arc<dyn LocalHandler>) -> Self {
        Self { remote, local }
    }

    pub async fn dispatch(&self, ctx: &RequestContext, req: Request<Body>) -> Response {
        if self.remote.is_healthy() {
            self.remote.serve(ctx, req).await
        } else {
            tracing::debug!(path = %ctx.info.path, "remote path unhealthy, serving locally");
            self.local.serve(ctx, req).await
        }
    }
}
