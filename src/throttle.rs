//! Sliding-window request throttle
//!
//! Guards outbound calls to a logical endpoint. Each endpoint key keeps a
//! window of recent request instants; entries older than the window are
//! purged lazily on the next call for that key. Rejection has no side
//! effect, so a denied caller does not consume budget.
//!
//! The window map is sharded, so concurrent admits for the same key
//! serialize on the entry while different keys proceed independently.

use dashmap::DashMap;
use std::time::{Duration, Instant};

pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);
pub const DEFAULT_CEILING: usize = 10;

/// Endpoint keys used across the service.
pub const SEND_OTP_ENDPOINT: &str = "send-otp";
pub const DEPOSIT_ENDPOINT: &str = "mobile-money-deposit";
pub const WITHDRAWAL_ENDPOINT: &str = "mobile-money-withdrawal";

#[derive(Debug)]
pub struct RequestThrottle {
    window: Duration,
    ceiling: usize,
    requests: DashMap<String, Vec<Instant>>,
}

impl Default for RequestThrottle {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestThrottle {
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_WINDOW, DEFAULT_CEILING)
    }

    pub fn with_limits(window: Duration, ceiling: usize) -> Self {
        Self {
            window,
            ceiling,
            requests: DashMap::new(),
        }
    }

    /// Admit or reject a request for the given endpoint key.
    ///
    /// Admission records the request instant; rejection records nothing.
    pub fn admit(&self, endpoint: &str) -> bool {
        let now = Instant::now();
        let mut entry = self.requests.entry(endpoint.to_string()).or_default();
        entry.retain(|seen| now.duration_since(*seen) < self.window);

        if entry.len() >= self.ceiling {
            return false;
        }

        entry.push(now);
        true
    }

    /// How long until the oldest live entry leaves the window.
    ///
    /// Returns zero when the key has budget available right now.
    pub fn retry_after(&self, endpoint: &str) -> Duration {
        let now = Instant::now();
        let Some(entry) = self.requests.get(endpoint) else {
            return Duration::ZERO;
        };

        let live: Vec<&Instant> = entry
            .iter()
            .filter(|seen| now.duration_since(**seen) < self.window)
            .collect();
        if live.len() < self.ceiling {
            return Duration::ZERO;
        }

        live.iter()
            .map(|seen| self.window.saturating_sub(now.duration_since(**seen)))
            .min()
            .unwrap_or(Duration::ZERO)
    }
}
