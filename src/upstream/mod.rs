//! Remote serving path.
//!
//! # Data Flow
//! ```text
//! health.rs probes /healthz on an interval
//!     → endpoint.rs state machine (hysteresis)
//!     → forwarder.rs answers is_healthy() and forwards to the
//!       first healthy endpoint
//! ```

pub mod endpoint;
pub mod forwarder;
pub mod health;

pub use endpoint::{Endpoint, HealthState};
pub use forwarder::RemoteServer;
pub use health::HealthMonitor;
