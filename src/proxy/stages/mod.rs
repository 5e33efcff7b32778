//! Middleware stages.
//!
//! Each stage is independent and stateless per request; the only shared
//! mutable state in the pipeline is the admission gate. Execution order is
//! fixed at startup by the chain builder (outermost to innermost):
//!
//! ```text
//! descriptor resolution (chain) → client component → admission
//!     → cache header → content type → node label → dispatcher
//! ```

pub mod admission;
pub mod cache_header;
pub mod client_component;
pub mod content_type;
pub mod node_label;

pub use admission::{AdmissionGate, AdmissionStage};
pub use cache_header::CacheHeaderStage;
pub use client_component::ClientComponentStage;
pub use content_type::ContentTypeStage;
pub use node_label::NodeLabelStage;
