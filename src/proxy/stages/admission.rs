//! Bounded-concurrency admission control.
//!
//! # Responsibilities
//! - Gate every request (resource or not) behind a counting semaphore
//! - Fail fast: a request that finds no free slot is rejected with 429 and a
//!   retry hint, and never reaches routing
//!
//! # Design Decisions
//! - The acquire is non-blocking; the gate never parks a task
//! - The permit is stored in the request context and ultimately dropped with
//!   the response body, so release is guaranteed on every exit path
//! - A non-positive limit disables the gate: unlimited admission, decided
//!   explicitly rather than inheriting the closed-gate fallthrough of a
//!   zero-capacity channel

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::observability::metrics;
use crate::proxy::chain::{Stage, StageFlow};
use crate::proxy::context::RequestContext;
use crate::proxy::response;

/// The process-wide admission gate. Created once at startup and shared by
/// every in-flight request; this is the only cross-request mutable state in
/// the pipeline.
pub struct AdmissionGate {
    semaphore: Option<Arc<Semaphore>>,
    limit: usize,
}

/// No slot was available.
#[derive(Debug)]
pub struct GateFull;

impl AdmissionGate {
    pub fn new(max_requests_in_flight: i64) -> Self {
        if max_requests_in_flight > 0 {
            let limit = max_requests_in_flight as usize;
            Self {
                semaphore: Some(Arc::new(Semaphore::new(limit))),
                limit,
            }
        } else {
            Self {
                semaphore: None,
                limit: 0,
            }
        }
    }

    /// Try to take a slot without blocking. `Ok(None)` means the gate is
    /// disabled and nothing needs releasing.
    pub fn try_admit(&self) -> Result<Option<OwnedSemaphorePermit>, GateFull> {
        match &self.semaphore {
            None => Ok(None),
            Some(semaphore) => semaphore
                .clone()
                .try_acquire_owned()
                .map(Some)
                .map_err(|_| GateFull),
        }
    }

    /// Number of requests currently holding a slot. Zero when disabled.
    pub fn in_flight(&self) -> usize {
        match &self.semaphore {
            None => 0,
            Some(semaphore) => self.limit - semaphore.available_permits(),
        }
    }

    /// Configured capacity; zero when the gate is disabled.
    pub fn limit(&self) -> usize {
        self.limit
    }
}

pub struct AdmissionStage {
    gate: Arc<AdmissionGate>,
}

impl AdmissionStage {
    pub fn new(gate: Arc<AdmissionGate>) -> Self {
        Self { gate }
    }
}

#[async_trait]
impl Stage for AdmissionStage {
    fn name(&self) -> &'static str {
        "admission"
    }

    async fn process(&self, ctx: &mut RequestContext, req: Request<Body>) -> StageFlow {
        match self.gate.try_admit() {
            Ok(permit) => {
                ctx.permit = permit;
                StageFlow::Continue(req)
            }
            Err(GateFull) => {
                tracing::warn!(
                    path = %ctx.info.path,
                    limit = self.gate.limit(),
                    "admission gate full, rejecting request"
                );
                metrics::record_rejected();
                StageFlow::Halt(response::too_many_requests())
            }
        }
    }
}
