//! HTTP serving shell.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum setup, outer layers: timeout, request ID, trace)
//!     → proxy::chain (classification, admission, mutation)
//!     → proxy::dispatch (remote or local path)
//! ```

pub mod server;

pub use server::GatewayServer;
