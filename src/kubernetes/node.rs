//! Minimal Node object model.
//!
//! Only the fields the gateway touches are typed; everything else is carried
//! through untouched in flattened passthrough maps so a decode/re-encode
//! round trip never drops data the control plane cares about.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A Kubernetes Node, as far as this gateway is concerned.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Node {
    #[serde(
        rename = "apiVersion",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub api_version: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,

    #[serde(default)]
    pub metadata: ObjectMeta,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Standard object metadata; unknown fields pass through.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ObjectMeta {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(
        rename = "resourceVersion",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub resource_version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Node {
    /// Merge the configured label set into this node.
    ///
    /// Adopts the set directly when the node has no labels; otherwise each
    /// configured key overwrites any existing value for that key while
    /// unrelated keys are preserved. Idempotent per key.
    pub fn merge_labels(&mut self, labels: &BTreeMap<String, String>) {
        match self.metadata.labels.as_mut() {
            None => self.metadata.labels = Some(labels.clone()),
            Some(existing) => {
                for (key, value) in labels {
                    existing.insert(key.clone(), value.clone());
                }
            }
        }
    }
}
