//! Serializer selection for structured body rewrites.
//!
//! Given a negotiated content type and an API group/version, yields an
//! encoder/decoder pair capable of round-tripping the Node object. Only JSON
//! is wired up: the protobuf wire format needs generated descriptors this
//! gateway does not carry, so a protobuf-only client surfaces as a serializer
//! mismatch on the one path that rewrites bodies.

use thiserror::Error;

use crate::kubernetes::node::Node;

#[derive(Debug, Error)]
pub enum SerializerError {
    #[error("unsupported media type {0:?}")]
    UnsupportedMediaType(String),

    #[error("failed to decode node object: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("failed to encode node object: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("decoded object is not a Node (kind {0:?})")]
    UnexpectedKind(String),
}

/// Wire format chosen by content negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WireFormat {
    Json,
}

/// An encoder/decoder pair bound to one request's negotiated format.
#[derive(Debug, Clone)]
pub struct NegotiatedSerializer {
    format: WireFormat,
    api_group: String,
    api_version: String,
}

impl NegotiatedSerializer {
    /// Select a serializer for the given content type and group/version.
    ///
    /// The content type may carry media-type parameters (`; charset=...`)
    /// and surrounding whitespace from `Accept` splitting; both are ignored.
    pub fn select(
        content_type: &str,
        api_group: &str,
        api_version: &str,
    ) -> Result<Self, SerializerError> {
        let media_type = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        let format = match media_type.as_str() {
            "application/json" | "*/*" => WireFormat::Json,
            _ => return Err(SerializerError::UnsupportedMediaType(content_type.to_string())),
        };

        Ok(Self {
            format,
            api_group: api_group.to_string(),
            api_version: api_version.to_string(),
        })
    }

    /// Decode a request body into a Node, verifying the object kind.
    pub fn decode_node(&self, data: &[u8]) -> Result<Node, SerializerError> {
        let WireFormat::Json = self.format;
        let node: Node = serde_json::from_slice(data).map_err(SerializerError::Decode)?;

        if !node.kind.is_empty() && node.kind != "Node" {
            return Err(SerializerError::UnexpectedKind(node.kind));
        }
        Ok(node)
    }

    /// Re-encode a Node with the same wire format it was decoded from.
    pub fn encode_node(&self, node: &Node) -> Result<Vec<u8>, SerializerError> {
        let WireFormat::Json = self.format;
        serde_json::to_vec(node).map_err(SerializerError::Encode)
    }

    /// Group/version the serializer was selected for.
    pub fn group_version(&self) -> (&str, &str) {
        (&self.api_group, &self.api_version)
    }
}
