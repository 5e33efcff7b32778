//! Configuration parsing and validation tests.

use edge_gateway::config::validation::{validate_config, ValidationError};
use edge_gateway::config::GatewayConfig;

#[test]
fn default_config_is_valid() {
    assert!(validate_config(&GatewayConfig::default()).is_ok());
}

#[test]
fn parses_a_minimal_toml_config() {
    let config: GatewayConfig = toml::from_str(
        r#"
        [listener]
        bind_address = "127.0.0.1:10261"

        [admission]
        max_requests_in_flight = 100

        [upstream]
        servers = ["http://10.0.0.1:6443"]

        [node_labels]
        "alibabacloud.com/is-edge-worker" = "true"
        "#,
    )
    .unwrap();

    assert_eq!(config.admission.max_requests_in_flight, 100);
    assert_eq!(config.upstream.servers, vec!["http://10.0.0.1:6443"]);
    assert_eq!(
        config.node_labels.get("alibabacloud.com/is-edge-worker"),
        Some(&"true".to_string())
    );
    assert!(validate_config(&config).is_ok());
}

#[test]
fn rejects_invalid_bind_address_and_empty_upstreams() {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = "not-an-address".to_string();
    config.upstream.servers.clear();

    let errors = validate_config(&config).unwrap_err();
    assert!(errors
        .iter()
        .any(|e| matches!(e, ValidationError::InvalidBindAddress(_))));
    assert!(errors
        .iter()
        .any(|e| matches!(e, ValidationError::NoUpstreamServers)));
}

#[test]
fn rejects_non_http_upstream_schemes() {
    let mut config = GatewayConfig::default();
    config.upstream.servers = vec!["ftp://10.0.0.1".to_string()];

    let errors = validate_config(&config).unwrap_err();
    assert!(errors
        .iter()
        .any(|e| matches!(e, ValidationError::UnsupportedUpstreamScheme(_))));
}

#[test]
fn non_positive_admission_limit_is_allowed() {
    let mut config = GatewayConfig::default();
    config.admission.max_requests_in_flight = 0;
    assert!(validate_config(&config).is_ok());
}
