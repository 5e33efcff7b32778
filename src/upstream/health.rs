//! Active health checking of upstream endpoints.
//!
//! # Responsibilities
//! - Periodically probe each endpoint's health path
//! - Update endpoint state based on results

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use tokio::sync::broadcast;
use tokio::time;

use crate::config::HealthCheckConfig;
use crate::observability::metrics;
use crate::upstream::endpoint::Endpoint;

pub struct HealthMonitor {
    endpoints: Vec<Arc<Endpoint>>,
    config: HealthCheckConfig,
    client: Client<HttpConnector, Body>,
}

impl HealthMonitor {
    pub fn new(endpoints: Vec<Arc<Endpoint>>, config: HealthCheckConfig) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            endpoints,
            config,
            client,
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("active health checks disabled");
            return;
        }

        tracing::info!(
            interval = self.config.interval_secs,
            path = %self.config.path,
            endpoints = self.endpoints.len(),
            "health monitor starting"
        );

        let mut ticker = time::interval(Duration::from_secs(self.config.interval_secs));
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_all().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("health monitor shutting down");
                    break;
                }
            }
        }
    }

    async fn check_all(&self) {
        for endpoint in &self.endpoints {
            let probe_url = format!(
                "{}{}",
                endpoint.url.as_str().trim_end_matches('/'),
                self.config.path
            );

            let request = match Request::builder()
                .method("GET")
                .uri(&probe_url)
                .header("user-agent", "edge-gateway-health-check")
                .body(Body::empty())
            {
                Ok(req) => req,
                Err(e) => {
                    tracing::error!(url = %probe_url, error = %e, "failed to build health probe");
                    continue;
                }
            };

            let timeout = Duration::from_secs(self.config.timeout_secs);
            let healthy = match time::timeout(timeout, self.client.request(request)).await {
                Ok(Ok(response)) => {
                    let success = response.status().is_success();
                    if !success {
                        tracing::warn!(
                            url = %probe_url,
                            status = %response.status(),
                            "health probe returned non-success status"
                        );
                    }
                    success
                }
                Ok(Err(e)) => {
                    tracing::warn!(url = %probe_url, error = %e, "health probe connection error");
                    false
                }
                Err(_) => {
                    tracing::warn!(url = %probe_url, "health probe timed out");
                    false
                }
            };

            if healthy {
                endpoint.mark_success(self.config.healthy_threshold);
            } else {
                endpoint.mark_failure(self.config.unhealthy_threshold);
            }

            metrics::record_upstream_health(endpoint.url.as_str(), endpoint.is_healthy());
        }
    }
}
