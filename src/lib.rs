//! Edge-side traffic gateway for Kubernetes edge autonomy.
//!
//! Sits between local node processes (kubelet, kube-proxy, DNS agents) and a
//! remote cluster control plane. Every inbound request passes through an
//! ordered middleware chain (descriptor resolution, client classification,
//! admission control, cache eligibility, content negotiation, node-label
//! mutation) before a single health-routed choice between forwarding
//! upstream and serving from the local fallback.

// Core subsystems
pub mod config;
pub mod http;
pub mod kubernetes;
pub mod proxy;

// Serving paths
pub mod local;
pub mod upstream;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::GatewayConfig;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
