//! Observability subsystem.
//!
//! # Design Decisions
//! - Structured logging via tracing; filter from config or RUST_LOG
//! - Metrics are cheap (atomic increments); exporter is optional

pub mod logging;
pub mod metrics;
