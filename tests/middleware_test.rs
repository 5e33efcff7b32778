//! Chain-level tests: classification, admission, negotiation and node-label
//! mutation, driven through the composed handler chain with stub serving
//! paths.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;

use edge_gateway::kubernetes::RequestInfoResolver;
use edge_gateway::proxy::chain::{ChainBuilder, HandlerChain};
use edge_gateway::proxy::context::RequestContext;
use edge_gateway::proxy::dispatch::{Dispatcher, LocalHandler, RemoteHandler};
use edge_gateway::proxy::response::{NO_ACCEPT_CONTENT_TYPE_BODY, TOO_MANY_REQUESTS_BODY};
use edge_gateway::proxy::stages::{
    AdmissionGate, AdmissionStage, CacheHeaderStage, ClientComponentStage, ContentTypeStage,
    NodeLabelStage,
};

const BODY_LIMIT: usize = 4 * 1024 * 1024;

/// What the stub remote path saw for the last request it served.
#[derive(Debug, Default, Clone)]
struct Captured {
    content_type: Option<String>,
    can_cache: bool,
    client_component: Option<String>,
    headers: HeaderMap,
    body: Bytes,
}

/// Remote path stub: records the context and request it receives.
struct StubRemote {
    captured: Arc<Mutex<Option<Captured>>>,
    delay: Duration,
}

impl StubRemote {
    fn new() -> (Arc<Mutex<Option<Captured>>>, Self) {
        let captured = Arc::new(Mutex::new(None));
        (
            captured.clone(),
            Self {
                captured,
                delay: Duration::ZERO,
            },
        )
    }

    fn with_delay(delay: Duration) -> (Arc<Mutex<Option<Captured>>>, Self) {
        let (captured, mut stub) = Self::new();
        stub.delay = delay;
        (captured, stub)
    }
}

#[async_trait]
impl RemoteHandler for StubRemote {
    fn is_healthy(&self) -> bool {
        true
    }

    async fn serve(&self, ctx: &RequestContext, req: Request<Body>) -> Response {
        let (parts, body) = req.into_parts();
        let body = axum::body::to_bytes(body, BODY_LIMIT).await.unwrap();

        *self.captured.lock().unwrap() = Some(Captured {
            content_type: ctx.content_type.clone(),
            can_cache: ctx.can_cache,
            client_component: ctx.client_component.clone(),
            headers: parts.headers,
            body,
        });

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        StatusCode::OK.into_response()
    }
}

struct StubLocal;

#[async_trait]
impl LocalHandler for StubLocal {
    async fn serve(&self, _ctx: &RequestContext, _req: Request<Body>) -> Response {
        (StatusCode::SERVICE_UNAVAILABLE, "local").into_response()
    }
}

fn build_chain(limit: i64, labels: BTreeMap<String, String>, remote: StubRemote) -> HandlerChain {
    let gate = Arc::new(AdmissionGate::new(limit));
    let dispatcher = Dispatcher::new(Arc::new(remote), Arc::new(StubLocal));

    let mut builder = ChainBuilder::new(RequestInfoResolver::new())
        .stage(ClientComponentStage)
        .stage(AdmissionStage::new(gate.clone()))
        .stage(CacheHeaderStage)
        .stage(ContentTypeStage);
    if !labels.is_empty() {
        builder = builder.stage(NodeLabelStage::new(labels));
    }
    builder.build(dispatcher, gate)
}

fn resource_get(path: &str, accept: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(path);
    if let Some(accept) = accept {
        builder = builder.header(header::ACCEPT, accept);
    }
    builder.body(Body::empty()).unwrap()
}

async fn body_string(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), BODY_LIMIT)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn negotiates_first_accept_entry_on_resource_requests() {
    let (captured, remote) = StubRemote::new();
    let chain = build_chain(10, BTreeMap::new(), remote);

    let req = resource_get("/api/v1/nodes/mynode", Some("application/json, */*"));
    let response = chain.handle(req).await;

    assert_eq!(response.status(), StatusCode::OK);
    let seen = captured.lock().unwrap().clone().unwrap();
    assert_eq!(seen.content_type.as_deref(), Some("application/json"));
}

#[tokio::test]
async fn records_no_content_type_for_non_resource_requests() {
    let (captured, remote) = StubRemote::new();
    let chain = build_chain(10, BTreeMap::new(), remote);

    let req = resource_get("/healthz", Some("application/vnd.kubernetes.protobuf"));
    let response = chain.handle(req).await;

    assert_eq!(response.status(), StatusCode::OK);
    let seen = captured.lock().unwrap().clone().unwrap();
    assert_eq!(seen.content_type, None);
}

#[tokio::test]
async fn rejects_resource_request_without_accept_header() {
    let (captured, remote) = StubRemote::new();
    let chain = build_chain(10, BTreeMap::new(), remote);

    let req = resource_get("/api/v1/nodes/mynode", None);
    let response = chain.handle(req).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_string(response).await, NO_ACCEPT_CONTENT_TYPE_BODY);
    assert!(captured.lock().unwrap().is_none(), "downstream must not run");
}

#[tokio::test]
async fn extracts_client_component_from_user_agent() {
    for (user_agent, path, expected) in [
        ("kubelet", "/api/v1/nodes/mynode", Some("kubelet")),
        ("flanneld/0.11.0", "/api/v1/nodes/mynode", Some("flanneld")),
        ("kubelet", "/healthz", None),
    ] {
        let (captured, remote) = StubRemote::new();
        let chain = build_chain(10, BTreeMap::new(), remote);

        let req = Request::builder()
            .method("GET")
            .uri(path)
            .header(header::USER_AGENT, user_agent)
            .header(header::ACCEPT, "application/json")
            .body(Body::empty())
            .unwrap();
        let response = chain.handle(req).await;

        assert_eq!(response.status(), StatusCode::OK);
        let seen = captured.lock().unwrap().clone().unwrap();
        assert_eq!(
            seen.client_component.as_deref(),
            expected,
            "user agent {user_agent:?} on {path}"
        );
    }
}

#[tokio::test]
async fn cache_header_marks_eligibility_and_is_always_stripped() {
    for (value, expect_can_cache) in [("true", true), ("TRUE", true), ("false", false)] {
        let (captured, remote) = StubRemote::new();
        let chain = build_chain(10, BTreeMap::new(), remote);

        let req = Request::builder()
            .method("GET")
            .uri("/api/v1/pods")
            .header("Edge-Cache", value)
            .header(header::ACCEPT, "application/json")
            .body(Body::empty())
            .unwrap();
        let response = chain.handle(req).await;

        assert_eq!(response.status(), StatusCode::OK);
        let seen = captured.lock().unwrap().clone().unwrap();
        assert_eq!(seen.can_cache, expect_can_cache, "Edge-Cache: {value}");
        assert!(
            !seen.headers.contains_key("Edge-Cache"),
            "header must never reach the dispatcher"
        );
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn admission_rejects_only_excess_requests() {
    for (total, expected_rejections) in [(10usize, 0usize), (11, 1)] {
        let (_captured, remote) = StubRemote::with_delay(Duration::from_millis(500));
        let chain = Arc::new(build_chain(10, BTreeMap::new(), remote));

        let mut handles = Vec::new();
        for _ in 0..total {
            let chain = chain.clone();
            handles.push(tokio::spawn(async move {
                let req = resource_get("/api/v1/nodes/mynode", Some("application/json"));
                let response = chain.handle(req).await;
                let status = response.status();
                let retry_after = response
                    .headers()
                    .get(header::RETRY_AFTER)
                    .map(|v| v.to_str().unwrap().to_string());
                let body = body_string(response).await;
                (status, retry_after, body)
            }));
        }

        let mut rejections = 0;
        for handle in handles {
            let (status, retry_after, body) = handle.await.unwrap();
            if status == StatusCode::TOO_MANY_REQUESTS {
                rejections += 1;
                assert_eq!(retry_after.as_deref(), Some("1"));
                assert_eq!(body, TOO_MANY_REQUESTS_BODY);
            } else {
                assert_eq!(status, StatusCode::OK);
            }
        }
        assert_eq!(
            rejections, expected_rejections,
            "{total} concurrent requests under limit 10"
        );
    }
}

#[tokio::test]
async fn admission_slot_is_released_only_when_the_response_body_is_dropped() {
    let (_captured, remote) = StubRemote::new();
    let chain = build_chain(1, BTreeMap::new(), remote);

    let held = chain
        .handle(resource_get("/api/v1/nodes/mynode", Some("application/json")))
        .await;
    assert_eq!(held.status(), StatusCode::OK);

    // The head is out, but the body still carries the permit.
    let rejected = chain
        .handle(resource_get("/api/v1/nodes/mynode", Some("application/json")))
        .await;
    assert_eq!(rejected.status(), StatusCode::TOO_MANY_REQUESTS);

    drop(held);
    let admitted = chain
        .handle(resource_get("/api/v1/nodes/mynode", Some("application/json")))
        .await;
    assert_eq!(admitted.status(), StatusCode::OK);
}

#[tokio::test]
async fn non_positive_limit_disables_the_gate() {
    let (_captured, remote) = StubRemote::new();
    let chain = build_chain(0, BTreeMap::new(), remote);

    let req = resource_get("/api/v1/nodes/mynode", Some("application/json"));
    let response = chain.handle(req).await;
    assert_eq!(response.status(), StatusCode::OK);
}

fn exclude_label() -> BTreeMap<String, String> {
    BTreeMap::from([(
        "service.beta.kubernetes.io/exclude-node".to_string(),
        "true".to_string(),
    )])
}

fn node_create_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/v1/nodes")
        .header(header::ACCEPT, "application/json")
        .header(header::CONTENT_LENGTH, body.len())
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn node_create_adopts_labels_when_node_has_none() {
    let (captured, remote) = StubRemote::new();
    let chain = build_chain(10, exclude_label(), remote);

    let body = serde_json::to_vec(&json!({
        "apiVersion": "v1",
        "kind": "Node",
        "metadata": { "name": "mynode", "resourceVersion": "4" },
        "spec": { "podCIDR": "10.244.0.0/24" }
    }))
    .unwrap();

    let response = chain.handle(node_create_request(body)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let seen = captured.lock().unwrap().clone().unwrap();
    let rewritten: serde_json::Value = serde_json::from_slice(&seen.body).unwrap();
    assert_eq!(
        rewritten["metadata"]["labels"],
        json!({ "service.beta.kubernetes.io/exclude-node": "true" })
    );
    // Untyped fields survive the round trip.
    assert_eq!(rewritten["spec"]["podCIDR"], "10.244.0.0/24");
    // Declared length matches the rewritten body.
    assert_eq!(
        seen.headers[header::CONTENT_LENGTH],
        seen.body.len().to_string()
    );
}

#[tokio::test]
async fn node_create_merges_labels_without_dropping_existing_keys() {
    let (captured, remote) = StubRemote::new();
    let chain = build_chain(10, exclude_label(), remote);

    let body = serde_json::to_vec(&json!({
        "apiVersion": "v1",
        "kind": "Node",
        "metadata": {
            "name": "mynode",
            "labels": {
                "alibabacloud.com/is-edge-worker": "true",
                "service.beta.kubernetes.io/exclude-node": "false"
            }
        }
    }))
    .unwrap();

    let response = chain.handle(node_create_request(body)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let seen = captured.lock().unwrap().clone().unwrap();
    let rewritten: serde_json::Value = serde_json::from_slice(&seen.body).unwrap();
    let labels = &rewritten["metadata"]["labels"];
    assert_eq!(labels["alibabacloud.com/is-edge-worker"], "true");
    // Configured key overwrites the pre-existing value.
    assert_eq!(labels["service.beta.kubernetes.io/exclude-node"], "true");
}

#[tokio::test]
async fn node_label_merge_is_idempotent() {
    let (captured, remote) = StubRemote::new();
    let chain = build_chain(10, exclude_label(), remote);

    let body = serde_json::to_vec(&json!({
        "apiVersion": "v1",
        "kind": "Node",
        "metadata": { "name": "mynode" }
    }))
    .unwrap();

    chain.handle(node_create_request(body)).await;
    let first = captured.lock().unwrap().clone().unwrap().body;

    chain.handle(node_create_request(first.to_vec())).await;
    let second = captured.lock().unwrap().clone().unwrap().body;

    assert_eq!(first, second);
}

#[tokio::test]
async fn node_create_rewrite_replaces_transfer_encoding_with_content_length() {
    let (captured, remote) = StubRemote::new();
    let chain = build_chain(10, exclude_label(), remote);

    let body = serde_json::to_vec(&json!({
        "apiVersion": "v1",
        "kind": "Node",
        "metadata": { "name": "mynode" }
    }))
    .unwrap();

    let req = Request::builder()
        .method("POST")
        .uri("/api/v1/nodes")
        .header(header::ACCEPT, "application/json")
        .header(header::TRANSFER_ENCODING, "chunked")
        .body(Body::from(body))
        .unwrap();
    let response = chain.handle(req).await;

    assert_eq!(response.status(), StatusCode::OK);
    let seen = captured.lock().unwrap().clone().unwrap();
    assert!(!seen.headers.contains_key(header::TRANSFER_ENCODING));
    assert_eq!(
        seen.headers[header::CONTENT_LENGTH],
        seen.body.len().to_string()
    );
}

#[tokio::test]
async fn non_create_requests_pass_through_byte_identical() {
    for (method, path) in [("PATCH", "/api/v1/nodes/mynode"), ("POST", "/api/v1/pods")] {
        let (captured, remote) = StubRemote::new();
        let chain = build_chain(10, exclude_label(), remote);

        let body = serde_json::to_vec(&json!({
            "apiVersion": "v1",
            "kind": "Node",
            "metadata": { "name": "mynode" }
        }))
        .unwrap();

        let req = Request::builder()
            .method(method)
            .uri(path)
            .header(header::ACCEPT, "application/json")
            .body(Body::from(body.clone()))
            .unwrap();
        let response = chain.handle(req).await;

        assert_eq!(response.status(), StatusCode::OK);
        let seen = captured.lock().unwrap().clone().unwrap();
        assert_eq!(seen.body.as_ref(), body.as_slice(), "{method} {path}");
    }
}

#[tokio::test]
async fn node_create_with_unsupported_media_type_is_an_internal_error() {
    let (captured, remote) = StubRemote::new();
    let chain = build_chain(10, exclude_label(), remote);

    let req = Request::builder()
        .method("POST")
        .uri("/api/v1/nodes")
        .header(header::ACCEPT, "application/vnd.kubernetes.protobuf")
        .body(Body::from("\x1b\x02\x08"))
        .unwrap();
    let response = chain.handle(req).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_string(response).await;
    assert!(body.contains("unsupported media type"), "body: {body}");
    assert!(captured.lock().unwrap().is_none());
}

#[tokio::test]
async fn node_create_with_wrong_kind_is_an_internal_error() {
    let (captured, remote) = StubRemote::new();
    let chain = build_chain(10, exclude_label(), remote);

    let body = serde_json::to_vec(&json!({
        "apiVersion": "v1",
        "kind": "Pod",
        "metadata": { "name": "not-a-node" }
    }))
    .unwrap();

    let response = chain.handle(node_create_request(body)).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_string(response).await;
    assert!(body.contains("not a Node"), "body: {body}");
    assert!(captured.lock().unwrap().is_none());
}

#[tokio::test]
async fn node_create_with_malformed_body_is_an_internal_error() {
    let (captured, remote) = StubRemote::new();
    let chain = build_chain(10, exclude_label(), remote);

    let req = Request::builder()
        .method("POST")
        .uri("/api/v1/nodes")
        .header(header::ACCEPT, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = chain.handle(req).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(captured.lock().unwrap().is_none());
}
