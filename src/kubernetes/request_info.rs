//! Request descriptor resolution.
//!
//! Maps an incoming request path and method onto the Kubernetes API surface:
//! which resource is addressed, in which group/version and namespace, and
//! with which verb. Every other path (e.g. `/healthz`, `/version`) is a
//! non-resource request.

use axum::http::{Method, Uri};

/// Immutable descriptor attached to each request before any other stage runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestInfo {
    /// True when the path maps to an API resource.
    pub is_resource_request: bool,
    /// Request verb: get, list, create, update, patch, delete,
    /// deletecollection or watch. Lower-cased HTTP method for
    /// non-resource requests.
    pub verb: String,
    pub api_group: String,
    pub api_version: String,
    pub namespace: String,
    pub resource: String,
    pub subresource: String,
    pub name: String,
    /// Original request path, kept for logging.
    pub path: String,
}

/// Resolves request descriptors from paths of the form
/// `/api/<version>/...` (legacy core group) and `/apis/<group>/<version>/...`.
#[derive(Debug, Clone)]
pub struct RequestInfoResolver {
    grouped_prefix: &'static str,
    groupless_prefix: &'static str,
}

impl Default for RequestInfoResolver {
    fn default() -> Self {
        Self {
            grouped_prefix: "apis",
            groupless_prefix: "api",
        }
    }
}

impl RequestInfoResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the descriptor for a request. Never fails: unrecognized paths
    /// yield a non-resource descriptor.
    pub fn resolve(&self, method: &Method, uri: &Uri) -> RequestInfo {
        let path = uri.path().to_string();
        let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();

        let mut info = RequestInfo {
            verb: method.as_str().to_lowercase(),
            path: path.clone(),
            ..RequestInfo::default()
        };

        let rest: &[&str] = match parts.split_first() {
            Some((&prefix, rest)) if prefix == self.groupless_prefix => {
                if rest.is_empty() {
                    return info;
                }
                info.api_version = rest[0].to_string();
                &rest[1..]
            }
            Some((&prefix, rest)) if prefix == self.grouped_prefix => {
                if rest.len() < 2 {
                    return info;
                }
                info.api_group = rest[0].to_string();
                info.api_version = rest[1].to_string();
                &rest[2..]
            }
            _ => return info,
        };

        // Bare group/version paths are discovery requests, not resources.
        if rest.is_empty() {
            return info;
        }

        info.is_resource_request = true;

        let rest = if rest[0] == "namespaces" && rest.len() > 2 {
            info.namespace = rest[1].to_string();
            &rest[2..]
        } else {
            rest
        };

        info.resource = rest[0].to_string();
        if let Some(name) = rest.get(1) {
            info.name = name.to_string();
        }
        if let Some(sub) = rest.get(2) {
            info.subresource = sub.to_string();
        }

        info.verb = resolve_verb(method, uri, info.name.is_empty());
        info
    }
}

fn resolve_verb(method: &Method, uri: &Uri, collection: bool) -> String {
    if is_watch_request(uri) {
        return "watch".to_string();
    }

    let verb = match *method {
        Method::GET | Method::HEAD => {
            if collection {
                "list"
            } else {
                "get"
            }
        }
        Method::POST => "create",
        Method::PUT => "update",
        Method::PATCH => "patch",
        Method::DELETE => {
            if collection {
                "deletecollection"
            } else {
                "delete"
            }
        }
        _ => return method.as_str().to_lowercase(),
    };
    verb.to_string()
}

fn is_watch_request(uri: &Uri) -> bool {
    uri.query()
        .map(|q| {
            q.split('&')
                .any(|pair| pair == "watch=true" || pair == "watch=1" || pair == "watch")
        })
        .unwrap_or(false)
}
