//! Per-request context.
//!
//! One `RequestContext` is created per inbound request and passed explicitly
//! through every stage; nothing request-scoped lives in globals. Values are
//! set at most once by the stage that owns them and read downstream; absence
//! means the stage did not apply (e.g. non-resource requests skip
//! classification).

use std::time::Instant;

use tokio::sync::OwnedSemaphorePermit;
use tokio_util::sync::CancellationToken;

use crate::kubernetes::RequestInfo;
use crate::proxy::writer::CloseNotify;

/// Request-scoped values accumulated by the middleware chain.
#[derive(Debug)]
pub struct RequestContext {
    /// Descriptor resolved before any stage runs.
    pub info: RequestInfo,

    /// Wire format negotiated from the Accept header; resource requests only.
    pub content_type: Option<String>,

    /// True when the request asked for its response to be cached locally.
    pub can_cache: bool,

    /// Client component extracted from User-Agent (e.g. "kubelet").
    pub client_component: Option<String>,

    /// Admission slot held for the lifetime of the request; released on drop
    /// along every exit path, including response body completion.
    pub permit: Option<OwnedSemaphorePermit>,

    /// Cancelled when the task serving this request is dropped
    /// (client disconnect, deadline).
    cancel: CancellationToken,

    /// When the request entered the chain.
    pub start: Instant,
}

impl RequestContext {
    pub fn new(info: RequestInfo, cancel: CancellationToken) -> Self {
        Self {
            info,
            content_type: None,
            can_cache: false,
            client_component: None,
            permit: None,
            cancel,
            start: Instant::now(),
        }
    }

    /// Bridge to the close-notification contract: a receiver that yields
    /// exactly one signal once the request's cancellation context completes.
    pub fn close_notify(&self) -> CloseNotify {
        CloseNotify::synthesized(self.cancel.clone())
    }
}
