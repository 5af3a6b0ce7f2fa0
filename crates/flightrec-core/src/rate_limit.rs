//! Fixed-window request rate limiting for the ingress gate.
//!
//! `RateLimiter` is an explicitly constructed state object.  Nothing here is
//! process-global: each gate owns (or shares via `Arc`) its own limiter, and
//! tests drive it with a `ManualClock` and clear it with `reset()`.
//!
//! Windows are per key (typically the caller's address).  A key's window
//! opens on its first request and lasts `window`; at most `max_requests` are
//! admitted inside it.  Expired windows are evicted lazily, at most once per
//! `cleanup_interval`, so the map cannot grow without bound.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::traits::{Clock, SystemClock};

/// Limits applied by a `RateLimiter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub max_requests: u32,
    pub window: Duration,
    pub cleanup_interval: Duration,
}

impl Default for RateLimitPolicy {
    /// 100 requests per minute, stale windows swept every five minutes.
    fn default() -> Self {
        Self {
            max_requests: 100,
            window: Duration::seconds(60),
            cleanup_interval: Duration::seconds(300),
        }
    }
}

/// Outcome of one `RateLimiter::check` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    /// Requests still admissible in the current window.
    pub remaining: u32,
    /// When the current window closes.
    pub reset_at: DateTime<Utc>,
}

impl RateDecision {
    /// Whole seconds until the window closes, rounded up, as seen at `now`.
    pub fn retry_after_secs(&self, now: DateTime<Utc>) -> u64 {
        let millis = (self.reset_at - now).num_milliseconds().max(0) as u64;
        millis.div_ceil(1000)
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    reset_at: DateTime<Utc>,
}

struct LimiterState {
    windows: HashMap<String, Window>,
    last_cleanup: DateTime<Utc>,
}

/// Per-key fixed-window rate limiter.
pub struct RateLimiter {
    policy: RateLimitPolicy,
    clock: Arc<dyn Clock>,
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self::with_clock(policy, Arc::new(SystemClock))
    }

    pub fn with_clock(policy: RateLimitPolicy, clock: Arc<dyn Clock>) -> Self {
        let last_cleanup = clock.now();
        Self {
            policy,
            clock,
            state: Mutex::new(LimiterState {
                windows: HashMap::new(),
                last_cleanup,
            }),
        }
    }

    /// Count one request for `key` and decide whether it is admitted.
    pub fn check(&self, key: &str) -> RateDecision {
        let now = self.clock.now();
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        if now - state.last_cleanup >= self.policy.cleanup_interval {
            let before = state.windows.len();
            state.windows.retain(|_, w| w.reset_at > now);
            state.last_cleanup = now;
            debug!(
                evicted = before - state.windows.len(),
                "rate limiter swept expired windows"
            );
        }

        let max = self.policy.max_requests;
        if let Some(window) = state.windows.get_mut(key).filter(|w| w.reset_at > now) {
            if window.count >= max {
                return RateDecision {
                    allowed: false,
                    remaining: 0,
                    reset_at: window.reset_at,
                };
            }
            window.count += 1;
            return RateDecision {
                allowed: true,
                remaining: max - window.count,
                reset_at: window.reset_at,
            };
        }

        // First request for this key, or its previous window has closed.
        let window = Window {
            count: 1,
            reset_at: now + self.policy.window,
        };
        state.windows.insert(key.to_string(), window);
        RateDecision {
            allowed: max > 0,
            remaining: max.saturating_sub(1),
            reset_at: window.reset_at,
        }
    }

    /// Number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .windows
            .len()
    }

    /// Forget every window.
    pub fn reset(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.windows.clear();
        state.last_cleanup = self.clock.now();
    }
}
