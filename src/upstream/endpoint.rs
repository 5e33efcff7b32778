//! Upstream endpoint health state.
//!
//! # State Transitions
//! ```text
//! Healthy → Unhealthy: consecutive failures >= unhealthy_threshold
//! Unhealthy → Healthy: consecutive successes >= healthy_threshold
//! ```
//!
//! # Design Decisions
//! - Hysteresis prevents flapping
//! - Unknown counts as healthy so a fresh gateway forwards immediately
//! - Counters are atomics; probes and requests update them concurrently

use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};

use url::Url;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Unknown = 0,
    Healthy = 1,
    Unhealthy = 2,
}

impl From<u8> for HealthState {
    fn from(val: u8) -> Self {
        match val {
            1 => HealthState::Healthy,
            2 => HealthState::Unhealthy,
            _ => HealthState::Unknown,
        }
    }
}

/// One remote control-plane server.
#[derive(Debug)]
pub struct Endpoint {
    pub url: Url,
    state: AtomicU8,
    consecutive_failures: AtomicU32,
    consecutive_successes: AtomicU32,
}

impl Endpoint {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            state: AtomicU8::new(HealthState::Unknown as u8),
            consecutive_failures: AtomicU32::new(0),
            consecutive_successes: AtomicU32::new(0),
        }
    }

    pub fn state(&self) -> HealthState {
        self.state.load(Ordering::Relaxed).into()
    }

    /// Healthy or not yet probed.
    pub fn is_healthy(&self) -> bool {
        self.state() != HealthState::Unhealthy
    }

    /// Record a successful probe or forwarded request.
    pub fn mark_success(&self, healthy_threshold: u32) {
        self.consecutive_failures.store(0, Ordering::Relaxed);

        if self.state() == HealthState::Healthy {
            return;
        }
        let successes = self.consecutive_successes.fetch_add(1, Ordering::Relaxed) + 1;
        if successes >= healthy_threshold {
            self.state.store(HealthState::Healthy as u8, Ordering::Relaxed);
            tracing::info!(url = %self.url, "upstream endpoint healthy");
        }
    }

    /// Record a failed probe or transport error.
    pub fn mark_failure(&self, unhealthy_threshold: u32) {
        self.consecutive_successes.store(0, Ordering::Relaxed);

        if self.state() == HealthState::Unhealthy {
            return;
        }
        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        if failures >= unhealthy_threshold {
            self.state
                .store(HealthState::Unhealthy as u8, Ordering::Relaxed);
            tracing::warn!(url = %self.url, "upstream endpoint unhealthy");
        }
    }
}
