//! Cache eligibility check.
//!
//! A resource request carrying `Edge-Cache: true` (value case-insensitive)
//! is flagged cache-eligible in its context. The header is always stripped,
//! eligible or not, so it can never leak to the remote path or be
//! re-interpreted downstream.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;

use crate::proxy::chain::{Stage, StageFlow};
use crate::proxy::context::RequestContext;

/// Header a client sets to ask for its response to be cached locally.
pub const CACHE_HEADER: &str = "Edge-Cache";

pub struct CacheHeaderStage;

#[async_trait]
impl Stage for CacheHeaderStage {
    fn name(&self) -> &'static str {
        "cache_header"
    }

    async fn process(&self, ctx: &mut RequestContext, mut req: Request<Body>) -> StageFlow {
        if ctx.info.is_resource_request {
            let eligible = req
                .headers()
                .get(CACHE_HEADER)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v.eq_ignore_ascii_case("true"));

            if eligible {
                ctx.can_cache = true;
            }
            req.headers_mut().remove(CACHE_HEADER);
        }

        StageFlow::Continue(req)
    }
}
