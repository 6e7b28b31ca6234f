//! Sliding-window rate limiting.
//!
//! Each key holds the exact timestamps of its admitted requests; a check
//! prunes everything older than the window, then either denies (budget
//! spent) or records the new request. Keying is per secret identifier, so a
//! secret's budget is shared across all of its allowed domains.
//!
//! State is bounded two ways: pruning on every check, and a periodic
//! [`RateLimiter::cleanup_idle`] pass that evicts keys idle past twice the
//! window. Cleanup never blocks a request: both paths take the same mutex
//! for strictly short critical sections.

use crate::error::{GatewayError, GatewayResult};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;

/// Result of one admission check. Immutable record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitDecision {
    /// Whether the request was admitted.
    pub allowed: bool,
    /// Requests left in the current window after this check.
    pub remaining: u32,
    /// Epoch-milliseconds at which the window next frees a slot: the oldest
    /// in-window timestamp plus the window length.
    pub reset_at: i64,
}

/// Shared sliding-window limiter.
pub struct RateLimiter {
    windows: Mutex<HashMap<String, Vec<i64>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Check and record one request for `key` under the given budget.
    ///
    /// An admitted request's timestamp is visible to the next call before
    /// this one returns (write-through under the lock).
    pub fn check_limit(
        &self,
        key: &str,
        limit: u32,
        window_seconds: u64,
    ) -> GatewayResult<LimitDecision> {
        self.check_limit_at(key, limit, window_seconds, Utc::now().timestamp_millis())
    }

    /// Clock-injected variant of [`Self::check_limit`].
    pub fn check_limit_at(
        &self,
        key: &str,
        limit: u32,
        window_seconds: u64,
        now_ms: i64,
    ) -> GatewayResult<LimitDecision> {
        let key = key.trim();
        if key.is_empty() {
            return Err(GatewayError::InvalidRequest {
                reason: "rate limit key must not be empty".to_string(),
            });
        }
        if limit == 0 {
            return Err(GatewayError::InvalidRateLimit {
                reason: "limit must be a positive integer".to_string(),
            });
        }
        if window_seconds == 0 {
            return Err(GatewayError::InvalidRateLimit {
                reason: "window must be a positive number of seconds".to_string(),
            });
        }

        let window_ms = window_seconds as i64 * 1000;
        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let window = windows.entry(key.to_string()).or_default();

        // Drop timestamps at or before the window's trailing edge.
        window.retain(|&ts| ts > now_ms - window_ms);

        if window.len() >= limit as usize {
            return Ok(LimitDecision {
                allowed: false,
                remaining: 0,
                reset_at: window[0] + window_ms,
            });
        }

        window.push(now_ms);
        Ok(LimitDecision {
            allowed: true,
            remaining: limit - window.len() as u32,
            reset_at: window[0] + window_ms,
        })
    }

    /// Evict windows whose newest timestamp is older than twice the default
    /// window. Driven by a periodic background tick.
    pub fn cleanup_idle(&self, default_window_seconds: u64) {
        self.cleanup_idle_at(default_window_seconds, Utc::now().timestamp_millis());
    }

    /// Clock-injected variant of [`Self::cleanup_idle`].
    pub fn cleanup_idle_at(&self, default_window_seconds: u64, now_ms: i64) {
        let horizon = now_ms - 2 * default_window_seconds as i64 * 1000;
        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let before = windows.len();
        windows.retain(|_, window| window.last().is_some_and(|&newest| newest >= horizon));
        let evicted = before - windows.len();
        if evicted > 0 {
            tracing::debug!(
                target: "vaultgate_ratelimit",
                evicted,
                "evicted idle rate-limit windows"
            );
        }
    }

    /// Number of live windows, for tests and diagnostics.
    pub fn window_count(&self) -> usize {
        self.windows
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
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
    use crate::error::ErrorCode;

    #[test]
    fn test_admits_until_budget_spent() {
        let limiter = RateLimiter::new();
        let t0 = 1_000_000;

        let first = limiter.check_limit_at("gh", 2, 60, t0).unwrap();
        assert!(first.allowed);
        assert_eq!(first.remaining, 1);
        assert_eq!(first.reset_at, t0 + 60_000);

        let second = limiter.check_limit_at("gh", 2, 60, t0 + 100).unwrap();
        assert!(second.allowed);
        assert_eq!(second.remaining, 0);
        // Oldest in-window timestamp anchors the reset.
        assert_eq!(second.reset_at, t0 + 60_000);

        let third = limiter.check_limit_at("gh", 2, 60, t0 + 200).unwrap();
        assert!(!third.allowed);
        assert_eq!(third.remaining, 0);
        assert_eq!(third.reset_at, t0 + 60_000);
    }

    #[test]
    fn test_window_slides_and_recovers() {
        let limiter = RateLimiter::new();
        let t0 = 1_000_000;
        assert!(limiter.check_limit_at("gh", 2, 60, t0).unwrap().allowed);
        assert!(limiter.check_limit_at("gh", 2, 60, t0 + 1).unwrap().allowed);
        assert!(!limiter.check_limit_at("gh", 2, 60, t0 + 2).unwrap().allowed);

        // 61 seconds after the first request both slots have slid out.
        let later = t0 + 61_000;
        let decision = limiter.check_limit_at("gh", 2, 60, later).unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 1);
        assert_eq!(decision.reset_at, later + 60_000);
    }

    #[test]
    fn test_timestamp_on_window_edge_is_pruned() {
        let limiter = RateLimiter::new();
        let t0 = 1_000_000;
        assert!(limiter.check_limit_at("gh", 1, 60, t0).unwrap().allowed);
        // Exactly window_ms later the old timestamp is out (ts <= now - W).
        let decision = limiter.check_limit_at("gh", 1, 60, t0 + 60_000).unwrap();
        assert!(decision.allowed);
    }

    #[test]
    fn test_keys_are_independent_and_trimmed() {
        let limiter = RateLimiter::new();
        assert!(limiter.check_limit_at("a", 1, 60, 0).unwrap().allowed);
        assert!(limiter.check_limit_at("b", 1, 60, 0).unwrap().allowed);
        // " a " is the same key as "a".
        assert!(!limiter.check_limit_at(" a ", 1, 60, 1).unwrap().allowed);
    }

    #[test]
    fn test_invalid_inputs() {
        let limiter = RateLimiter::new();
        let err = limiter.check_limit_at("  ", 1, 60, 0).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidRequest);

        let err = limiter.check_limit_at("gh", 0, 60, 0).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidRateLimit);

        let err = limiter.check_limit_at("gh", 1, 0, 0).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidRateLimit);
    }

    #[test]
    fn test_cleanup_evicts_only_idle_windows() {
        let limiter = RateLimiter::new();
        limiter.check_limit_at("stale", 5, 60, 0).unwrap();
        limiter.check_limit_at("fresh", 5, 60, 119_000).unwrap();
        assert_eq!(limiter.window_count(), 2);

        // Horizon at now - 2*60s = 1_000; "stale" (newest 0) goes.
        limiter.cleanup_idle_at(60, 121_000);
        assert_eq!(limiter.window_count(), 1);
        assert!(limiter.check_limit_at("fresh", 5, 60, 121_001).unwrap().allowed);
    }

    #[test]
    fn test_allowed_count_never_exceeds_limit_in_any_trailing_window() {
        let limiter = RateLimiter::new();
        let limit = 3_u32;
        let window_s = 10_u64;
        let mut admitted: Vec<i64> = Vec::new();

        // A hostile burst pattern: every 700ms for 40 seconds.
        for i in 0..58 {
            let now = i * 700;
            let decision = limiter.check_limit_at("k", limit, window_s, now).unwrap();
            if decision.allowed {
                admitted.push(now);
            }
        }

        for &t in &admitted {
            let in_window = admitted
                .iter()
                .filter(|&&ts| ts > t - (window_s as i64 * 1000) && ts <= t)
                .count();
            assert!(
                in_window <= limit as usize,
                "window ending at {t} admitted {in_window}"
            );
        }
    }
}
