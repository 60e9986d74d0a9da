//! Per-user request throttling for the trading endpoints
//!
//! Fixed-window counters keyed by (user, endpoint). Each throttled endpoint
//! declares its own allowance; exhausting it within the window yields a 429.

use crate::error::AppError;
use dashmap::DashMap;
use std::time::{Duration, Instant};
use types::ids::UserId;

/// Gateway operations subject to throttling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    OrderPlacement,
    OrderCancel,
    WsConnect,
}

impl Endpoint {
    /// Requests allowed per window.
    fn allowance(&self) -> u32 {
        match self {
            Endpoint::OrderPlacement => 20,
            Endpoint::OrderCancel => 50,
            Endpoint::WsConnect => 10,
        }
    }

    fn window(&self) -> Duration {
        Duration::from_secs(1)
    }

    fn name(&self) -> &'static str {
        match self {
            Endpoint::OrderPlacement => "order placement",
            Endpoint::OrderCancel => "order cancellation",
            Endpoint::WsConnect => "websocket connect",
        }
    }
}

struct Window {
    started: Instant,
    used: u32,
}

pub struct RateLimiter {
    windows: DashMap<(UserId, Endpoint), Window>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            windows: DashMap::new(),
        }
    }

    /// Count one request against the user's window for this endpoint.
    pub fn check(&self, user_id: UserId, endpoint: Endpoint) -> Result<(), AppError> {
        let mut entry = self
            .windows
            .entry((user_id, endpoint))
            .or_insert_with(|| Window {
                started: Instant::now(),
                used: 0,
            });

        let window = entry.value_mut();
        if window.started.elapsed() >= endpoint.window() {
            window.started = Instant::now();
            window.used = 0;
        }

        if window.used < endpoint.allowance() {
            window.used += 1;
            Ok(())
        } else {
            Err(AppError::RateLimitExceeded(format!(
                "too many {} requests",
                endpoint.name()
            )))
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowance_is_exhaustible() {
        let limiter = RateLimiter::new();
        let user = UserId::new();

        for _ in 0..Endpoint::WsConnect.allowance() {
            assert!(limiter.check(user, Endpoint::WsConnect).is_ok());
        }
        assert!(matches!(
            limiter.check(user, Endpoint::WsConnect),
            Err(AppError::RateLimitExceeded(_))
        ));
    }

    #[test]
    fn test_endpoints_and_users_are_independent() {
        let limiter = RateLimiter::new();
        let user = UserId::new();

        for _ in 0..Endpoint::WsConnect.allowance() {
            limiter.check(user, Endpoint::WsConnect).unwrap();
        }
        // Same user, different endpoint: unaffected.
        assert!(limiter.check(user, Endpoint::OrderPlacement).is_ok());
        // Different user, same endpoint: unaffected.
        assert!(limiter.check(UserId::new(), Endpoint::WsConnect).is_ok());
    }
}
