//! Lifecycle management.
//!
//! Ordered startup (config, then core, then listener) happens in `main`;
//! shutdown is coordinated through a broadcast signal so the server loop and
//! the health monitor exit together.

pub mod shutdown;

pub use shutdown::Shutdown;
