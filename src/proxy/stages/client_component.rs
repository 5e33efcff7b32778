//! Client identity extraction.
//!
//! Records which node component issued a resource request, taken from the
//! User-Agent header: lower-cased, the segment before the first `/`
//! (so `kubelet/1.2` and `kubelet` both yield `kubelet`).

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request};

use crate::proxy::chain::{Stage, StageFlow};
use crate::proxy::context::RequestContext;

pub struct ClientComponentStage;

#[async_trait]
impl Stage for ClientComponentStage {
    fn name(&self) -> &'static str {
        "client_component"
    }

    async fn process(&self, ctx: &mut RequestContext, req: Request<Body>) -> StageFlow {
        if ctx.info.is_resource_request {
            let user_agent = req
                .headers()
                .get(header::USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_lowercase();

            let component = user_agent.split('/').next().unwrap_or_default();
            if !component.is_empty() {
                ctx.client_component = Some(component.to_string());
            }
        }

        StageFlow::Continue(req)
    }
}
