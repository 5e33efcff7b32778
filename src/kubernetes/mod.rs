//! Kubernetes API plumbing.
//!
//! # Data Flow
//! ```text
//! request path + method
//!     → request_info.rs (resolve API descriptor)
//!     → proxy stages consume the descriptor
//!
//! negotiated content type + group/version
//!     → serializer.rs (select encoder/decoder)
//!     → node.rs (typed Node with passthrough fields)
//! ```

pub mod node;
pub mod request_info;
pub mod serializer;

pub use node::{Node, ObjectMeta};
pub use request_info::{RequestInfo, RequestInfoResolver};
pub use serializer::{NegotiatedSerializer, SerializerError};
