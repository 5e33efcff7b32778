//! HTTP server setup and chain wiring.
//!
//! # Responsibilities
//! - Build the handler chain in its fixed, load-bearing order
//! - Create the axum Router with a catch-all gateway handler
//! - Wire outer middleware (timeout, request ID, tracing)
//! - Spawn the upstream health monitor
//! - Serve with graceful shutdown
//!
//! The chain order (outermost to innermost) is: descriptor resolution →
//! client component → admission → cache header → content type → node label →
//! dispatcher. Admission must see every request, including non-resource
//! ones; the node-label mutator runs last so it sees the final negotiated
//! content type.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::response::Response;
use axum::routing::any;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::request_id::{MakeRequestUuid, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use url::Url;

use crate::config::GatewayConfig;
use crate::kubernetes::RequestInfoResolver;
use crate::lifecycle::Shutdown;
use crate::local::OfflineProxy;
use crate::proxy::chain::{ChainBuilder, HandlerChain};
use crate::proxy::dispatch::Dispatcher;
use crate::proxy::stages::{
    AdmissionGate, AdmissionStage, CacheHeaderStage, ClientComponentStage, ContentTypeStage,
    NodeLabelStage,
};
use crate::upstream::{Endpoint, HealthMonitor, RemoteServer};

/// Application state injected into the gateway handler.
#[derive(Clone)]
pub struct AppState {
    chain: Arc<HandlerChain>,
}

/// HTTP server for the edge gateway.
pub struct GatewayServer {
    router: Router,
    config: GatewayConfig,
    endpoints: Vec<Arc<Endpoint>>,
}

impl GatewayServer {
    /// Create a new server with the given (validated) configuration.
    pub fn new(config: GatewayConfig) -> Self {
        let mut endpoints = Vec::new();
        for server in &config.upstream.servers {
            match Url::parse(server) {
                Ok(url) => endpoints.push(Arc::new(Endpoint::new(url))),
                Err(e) => tracing::warn!(server = %server, error = %e, "invalid upstream url"),
            }
        }

        let gate = Arc::new(AdmissionGate::new(config.admission.max_requests_in_flight));
        let remote = Arc::new(RemoteServer::new(
            endpoints.clone(),
            config.upstream.health_check.unhealthy_threshold,
        ));
        let local = Arc::new(OfflineProxy::new());
        let dispatcher = Dispatcher::new(remote, local);

        let mut builder = ChainBuilder::new(RequestInfoResolver::new())
            .stage(ClientComponentStage)
            .stage(AdmissionStage::new(gate.clone()))
            .stage(CacheHeaderStage)
            .stage(ContentTypeStage);
        if !config.node_labels.is_empty() {
            builder = builder.stage(NodeLabelStage::new(config.node_labels.clone()));
        }
        let chain = Arc::new(builder.build(dispatcher, gate));

        let router = Self::build_router(&config, AppState { chain });
        Self {
            router,
            config,
            endpoints,
        }
    }

    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(gateway_handler))
            .route("/", any(gateway_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.timeouts.request_secs,
            )))
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener, shutdown: &Shutdown) -> std::io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "edge gateway starting");

        if self.config.upstream.health_check.enabled {
            let monitor = HealthMonitor::new(
                self.endpoints.clone(),
                self.config.upstream.health_check.clone(),
            );
            let monitor_shutdown = shutdown.subscribe();
            tokio::spawn(async move {
                monitor.run(monitor_shutdown).await;
            });
        }

        let mut serve_shutdown = shutdown.subscribe();
        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = serve_shutdown.recv().await;
            })
            .await?;

        tracing::info!("edge gateway stopped");
        Ok(())
    }
}

/// Catch-all handler: every request goes through the chain.
async fn gateway_handler(
    State(state): State<AppState>,
    request: axum::extract::Request,
) -> Response {
    state.chain.handle(request).await
}
