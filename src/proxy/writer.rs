//! Response writer wrapper.
//!
//! # Responsibilities
//! - Observe the status code produced for a request (for the completion log)
//! - Bridge close-notification across sinks that lack native support
//! - Expose flush as a queryable capability with a logged no-op fallback
//!
//! # Design Decisions
//! - One instance per request; never shared across requests
//! - Capabilities are resolved once, not re-probed per write

use axum::http::StatusCode;
use axum::response::Response;
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Records the status code written for a single request.
///
/// Writes and header access are not intercepted; the response flows through
/// the chain untouched and only its status is observed.
#[derive(Debug, Default)]
pub struct ResponseObserver {
    status_code: Option<StatusCode>,
}

impl ResponseObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the status of the response about to be written.
    pub fn observe(&mut self, response: &Response) {
        self.status_code = Some(response.status());
    }

    /// Observed status code; `None` until a response was produced.
    pub fn status_code(&self) -> Option<StatusCode> {
        self.status_code
    }
}

/// Close-notification contract: yields exactly one signal when the client
/// has gone away, then closes.
#[derive(Debug)]
pub struct CloseNotify {
    rx: mpsc::Receiver<()>,
}

impl CloseNotify {
    /// Bridge a sink with native disconnect signaling.
    pub fn native(rx: mpsc::Receiver<()>) -> Self {
        Self { rx }
    }

    /// Synthesize the contract from the request's cancellation context:
    /// a watcher waits for cancellation and emits one signal on a
    /// single-slot channel.
    pub fn synthesized(cancel: CancellationToken) -> Self {
        let (tx, rx) = mpsc::channel(1);
        tokio::spawn(async move {
            cancel.cancelled().await;
            let _ = tx.send(()).await;
        });
        Self { rx }
    }

    /// Wait for the disconnect signal. Returns `None` when the watcher is
    /// gone without having signaled.
    pub async fn recv(&mut self) -> Option<()> {
        self.rx.recv().await
    }
}

/// Whether the underlying sink can push buffered bytes to the client on
/// demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushMode {
    /// Frames are flushed as they are produced.
    PerFrame,
    /// No explicit flushing; streaming consumers lose latency, nothing
    /// breaks for buffered ones.
    Unsupported,
}

/// Streaming writer handed to handlers that emit their response body
/// incrementally (watch requests).
#[derive(Debug)]
pub struct StreamWriter {
    tx: mpsc::Sender<Result<Bytes, std::convert::Infallible>>,
    flush: FlushMode,
}

impl StreamWriter {
    /// Create a writer and the receiver side to build a response body from.
    pub fn channel(flush: FlushMode) -> (Self, mpsc::Receiver<Result<Bytes, std::convert::Infallible>>) {
        let (tx, rx) = mpsc::channel(16);
        (Self { tx, flush }, rx)
    }

    /// Write one chunk; fails when the client is gone.
    pub async fn write(&self, chunk: Bytes) -> Result<(), ClientGone> {
        self.tx.send(Ok(chunk)).await.map_err(|_| ClientGone)
    }

    /// Flush buffered bytes if the sink supports it.
    pub fn flush(&self) {
        if self.flush == FlushMode::Unsupported {
            tracing::error!("response sink does not support flushing");
        }
    }

    pub fn flush_mode(&self) -> FlushMode {
        self.flush
    }
}

/// The peer disconnected before the write completed.
#[derive(Debug)]
pub struct ClientGone;

impl std::fmt::Display for ClientGone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "client disconnected")
    }
}

impl std::error::Error for ClientGone {}
