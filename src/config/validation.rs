//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges and addresses
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is a pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic validation failure.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("invalid bind address {0:?}")]
    InvalidBindAddress(String),

    #[error("no upstream servers configured")]
    NoUpstreamServers,

    #[error("invalid upstream server url {0:?}: {1}")]
    InvalidUpstreamUrl(String, String),

    #[error("upstream server url {0:?} must use http or https")]
    UnsupportedUpstreamScheme(String),

    #[error("node label with empty key")]
    EmptyLabelKey,

    #[error("health check interval must be greater than zero")]
    ZeroHealthInterval,
}

/// Validate a configuration, collecting every error found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.upstream.servers.is_empty() {
        errors.push(ValidationError::NoUpstreamServers);
    }
    for server in &config.upstream.servers {
        match Url::parse(server) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
            Ok(_) => errors.push(ValidationError::UnsupportedUpstreamScheme(server.clone())),
            Err(e) => errors.push(ValidationError::InvalidUpstreamUrl(
                server.clone(),
                e.to_string(),
            )),
        }
    }

    if config.upstream.health_check.enabled && config.upstream.health_check.interval_secs == 0 {
        errors.push(ValidationError::ZeroHealthInterval);
    }

    if config.node_labels.keys().any(|k| k.is_empty()) {
        errors.push(ValidationError::EmptyLabelKey);
    }

    // Not an error: a non-positive limit disables the admission gate.
    if config.admission.max_requests_in_flight <= 0 {
        tracing::warn!(
            limit = config.admission.max_requests_in_flight,
            "max_requests_in_flight is not positive, admission gate disabled"
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
