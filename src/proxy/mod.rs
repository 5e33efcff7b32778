//! Request dispatch core.
//!
//! # Data Flow
//! ```text
//! inbound request
//!     → chain.rs (descriptor resolution, ordered stages)
//!     → stages/* (classify, admit, negotiate, mutate)
//!     → dispatch.rs (health-routed remote/local choice)
//!     → writer.rs (status observation, close-notify, flush capability)
//! ```
//!
//! # Design Decisions
//! - Stages are explicit objects composed by a builder, not nested closures
//! - Exactly one of remote/local serves a request; no retry between them
//! - Per-request state is owned by the serving task; the admission gate is
//!   the only shared mutable resource

pub mod chain;
pub mod context;
pub mod dispatch;
pub mod response;
pub mod stages;
pub mod writer;

pub use chain::{ChainBuilder, HandlerChain, Stage, StageFlow};
pub use context::RequestContext;
pub use dispatch::{Dispatcher, LocalHandler, RemoteHandler};
pub use writer::{CloseNotify, FlushMode, ResponseObserver, StreamWriter};
