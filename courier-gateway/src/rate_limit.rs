//! # Rate Limiter Module
//!
//! Per-tenant fixed-window request counter. The window length comes from
//! `RATE_LIMIT_WINDOW_MS` (default 60 s) and the limit from the tenant's
//! `rate_limit_per_minute` quota (fallback 100). On overflow the HTTP layer
//! answers 429 with `X-RateLimit-*` headers built from the decision returned
//! here.
//!
//! A periodic sweep evicts windows that have expired so the map stays
//! bounded by the number of recently active tenants.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Fallback limit when a tenant has no `rate_limit_per_minute` quota.
pub const DEFAULT_LIMIT: u32 = 100;

#[derive(Debug, Clone)]
struct WindowEntry {
    window_start_secs: u64,
    count: u32,
}

/// Outcome of a rate-limit check, carrying everything the 429 headers need.
#[derive(Debug, Clone, Copy)]
pub struct RateDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Epoch seconds at which the current window closes
    pub reset_epoch_secs: u64,
}

/// Fixed-window counter keyed by tenant id.
pub struct RateLimiter {
    windows: DashMap<String, WindowEntry>,
    window: Duration,
}

impl RateLimiter {
    pub fn new(window: Duration) -> Self {
        Self {
            windows: DashMap::new(),
            window,
        }
    }

    fn now_secs() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }

    /// Count one request against `tenant_id`'s current window.
    ///
    /// The counter only advances when the request is admitted; rejected
    /// requests do not consume budget.
    pub fn check(&self, tenant_id: &str, limit: Option<u32>) -> RateDecision {
        let limit = limit.unwrap_or(DEFAULT_LIMIT);
        let now = Self::now_secs();
        let window_secs = self.window.as_secs().max(1);

        let mut entry = self
            .windows
            .entry(tenant_id.to_string())
            .or_insert_with(|| WindowEntry {
                window_start_secs: now,
                count: 0,
            });

        if now.saturating_sub(entry.window_start_secs) >= window_secs {
            entry.window_start_secs = now;
            entry.count = 0;
        }

        let reset_epoch_secs = entry.window_start_secs + window_secs;

        if entry.count >= limit {
            return RateDecision {
                allowed: false,
                limit,
                remaining: 0,
                reset_epoch_secs,
            };
        }

        entry.count += 1;
        RateDecision {
            allowed: true,
            limit,
            remaining: limit - entry.count,
            reset_epoch_secs,
        }
    }

    /// Drop entries whose window has expired.
    pub fn sweep(&self) {
        let now = Self::now_secs();
        let window_secs = self.window.as_secs().max(1);
        let before = self.windows.len();
        self.windows
            .retain(|_, entry| now.saturating_sub(entry.window_start_secs) < window_secs);
        let evicted = before - self.windows.len();
        if evicted > 0 {
            tracing::debug!(evicted, "rate limiter sweep");
        }
    }

    /// Background task sweeping expired windows once per window length.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        let limiter = Arc::clone(self);
        let interval = limiter.window;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => limiter.sweep(),
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_within_limit_are_admitted() {
        let limiter = RateLimiter::new(Duration::from_secs(60));
        for i in 0..3 {
            let decision = limiter.check("acme", Some(3));
            assert!(decision.allowed, "request {i}");
        }
        assert_eq!(limiter.check("acme", Some(3)).remaining, 0);
    }

    #[test]
    fn overflow_is_rejected_with_reset_time() {
        let limiter = RateLimiter::new(Duration::from_secs(60));
        limiter.check("acme", Some(1));

        let decision = limiter.check("acme", Some(1));
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);
        assert!(decision.reset_epoch_secs > RateLimiter::now_secs());
    }

    #[test]
    fn tenants_have_independent_windows() {
        let limiter = RateLimiter::new(Duration::from_secs(60));
        limiter.check("acme", Some(1));
        assert!(!limiter.check("acme", Some(1)).allowed);
        assert!(limiter.check("globex", Some(1)).allowed);
    }

    #[test]
    fn default_limit_applies_without_quota() {
        let limiter = RateLimiter::new(Duration::from_secs(60));
        let decision = limiter.check("acme", None);
        assert_eq!(decision.limit, DEFAULT_LIMIT);
        assert_eq!(decision.remaining, DEFAULT_LIMIT - 1);
    }

    #[test]
    fn expired_window_resets_the_counter() {
        let limiter = RateLimiter::new(Duration::from_secs(60));
        limiter.check("acme", Some(1));
        // Age the window past its length.
        limiter.windows.get_mut("acme").unwrap().window_start_secs -= 61;

        let decision = limiter.check("acme", Some(1));
        assert!(decision.allowed);
    }

    #[test]
    fn sweep_evicts_expired_entries() {
        let limiter = RateLimiter::new(Duration::from_secs(60));
        limiter.check("acme", Some(5));
        limiter.check("globex", Some(5));
        limiter.windows.get_mut("acme").unwrap().window_start_secs -= 120;

        limiter.sweep();
        assert!(!limiter.windows.contains_key("acme"));
        assert!(limiter.windows.contains_key("globex"));
    }
}
