//! Middleware chain composition.
//!
//! # Responsibilities
//! - Define the stage contract (process, then continue or terminate)
//! - Run stages in the fixed order composed at startup
//! - Resolve the request descriptor before any stage runs
//! - Emit the per-request completion log and metrics
//!
//! # Design Decisions
//! - Stages are an explicit ordered list, not nested closures; the order is
//!   load-bearing and lives in one place (the builder call site)
//! - Per-request data travels in a RequestContext passed explicitly, never
//!   in globals
//! - The admission permit, the disconnect guard and the completion record
//!   ride on the response body, so slot release and the completion log both
//!   cover streaming: elapsed time includes body transfer, not just the head

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use bytes::Bytes;
use http_body::{Body as HttpBody, Frame, SizeHint};
use tokio::sync::OwnedSemaphorePermit;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::kubernetes::RequestInfoResolver;
use crate::observability::metrics;
use crate::proxy::context::RequestContext;
use crate::proxy::dispatch::Dispatcher;
use crate::proxy::stages::admission::AdmissionGate;
use crate::proxy::writer::ResponseObserver;

/// Outcome of one stage: hand the (possibly rewritten) request to the next
/// stage, or terminate with a response and skip everything downstream.
pub enum StageFlow {
    Continue(Request<Body>),
    Halt(Response),
}

/// A single middleware stage.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Stage name, for logs.
    fn name(&self) -> &'static str;

    async fn process(&self, ctx: &mut RequestContext, req: Request<Body>) -> StageFlow;
}

/// Builds a [`HandlerChain`] with its stages in registration order.
pub struct ChainBuilder {
    resolver: RequestInfoResolver,
    stages: Vec<Box<dyn Stage>>,
}

impl ChainBuilder {
    pub fn new(resolver: RequestInfoResolver) -> Self {
        Self {
            resolver,
            stages: Vec::new(),
        }
    }

    /// Append a stage. Registration order is execution order.
    pub fn stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn build(self, dispatcher: Dispatcher, gate: Arc<AdmissionGate>) -> HandlerChain {
        let names: Vec<&str> = self.stages.iter().map(|s| s.name()).collect();
        tracing::info!(stages = ?names, "handler chain composed");
        HandlerChain {
            resolver: self.resolver,
            stages: self.stages,
            dispatcher,
            gate,
        }
    }
}

/// The composed request pipeline: resolver, ordered stages, dispatcher.
pub struct HandlerChain {
    resolver: RequestInfoResolver,
    stages: Vec<Box<dyn Stage>>,
    dispatcher: Dispatcher,
    gate: Arc<AdmissionGate>,
}

impl HandlerChain {
    /// Run one request through the full pipeline.
    pub async fn handle(&self, req: Request<Body>) -> Response {
        // Cancelled when the response body is dropped: client disconnect,
        // server shutdown, or normal completion.
        let cancel = CancellationToken::new();
        let disconnect_guard = cancel.clone().drop_guard();

        let info = self.resolver.resolve(req.method(), req.uri());
        let mut ctx = RequestContext::new(info, cancel);
        let mut observer = ResponseObserver::new();

        let mut req = req;
        for stage in &self.stages {
            match stage.process(&mut ctx, req).await {
                StageFlow::Continue(next) => req = next,
                StageFlow::Halt(response) => {
                    observer.observe(&response);
                    return self.seal(response, &mut ctx, &observer, disconnect_guard);
                }
            }
        }

        let response = self.dispatcher.dispatch(&ctx, req).await;
        observer.observe(&response);
        self.seal(response, &mut ctx, &observer, disconnect_guard)
    }

    /// Move the admission permit, disconnect guard and completion record
    /// onto the response body. All three fire only when the body has fully
    /// streamed (or been dropped), so the completion log covers body
    /// transfer and the slot is never released early.
    fn seal(
        &self,
        response: Response,
        ctx: &mut RequestContext,
        observer: &ResponseObserver,
        guard: DropGuard,
    ) -> Response {
        let record = CompletionRecord {
            verb: ctx.info.verb.clone(),
            path: ctx.info.path.clone(),
            client: ctx
                .client_component
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
            status: observer
                .status_code()
                .map(|s| s.as_u16())
                .unwrap_or_default(),
            start: ctx.start,
            gate: self.gate.clone(),
        };
        let permit = ctx.permit.take();
        let (parts, body) = response.into_parts();
        let body = Body::new(GuardedBody {
            inner: body,
            _permit: permit,
            _record: record,
            _disconnect: guard,
        });
        Response::from_parts(parts, body)
    }
}

/// Completion log and metrics for one request, emitted on drop. Field drop
/// order in [`GuardedBody`] releases the permit first, so the logged
/// in-flight depth excludes the request being completed.
struct CompletionRecord {
    verb: String,
    path: String,
    client: String,
    status: u16,
    start: Instant,
    gate: Arc<AdmissionGate>,
}

impl Drop for CompletionRecord {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        tracing::info!(
            verb = %self.verb,
            path = %self.path,
            client = %self.client,
            status = self.status,
            elapsed_ms = elapsed.as_millis() as u64,
            in_flight = self.gate.in_flight(),
            "request completed"
        );
        metrics::record_request(&self.verb, self.status, elapsed);
        metrics::record_in_flight(self.gate.in_flight());
    }
}

/// Pass-through body that pins the admission permit, the completion record
/// and the disconnect guard to the response lifetime.
struct GuardedBody {
    inner: Body,
    _permit: Option<OwnedSemaphorePermit>,
    _record: CompletionRecord,
    _disconnect: DropGuard,
}

impl HttpBody for GuardedBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        Pin::new(&mut self.inner).poll_frame(cx)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
