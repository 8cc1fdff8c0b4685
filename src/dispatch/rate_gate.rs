//! Per-key token-bucket admission gate with lazy expiry.
//!
//! [`RateGate`] bounds how often a caller key (usually a network origin)
//! may enter an abuse-prone dispatch pipeline. Each key owns a token
//! bucket holding up to `requests` tokens and refilling one token every
//! `window / requests`. Entries idle for `2 × window` are replaced with a
//! fresh bucket on next use and are swept opportunistically whenever a
//! request is denied, so no background task is needed.
//!
//! Time comes from [`tokio::time::Instant`], which lets tests drive the
//! clock with `tokio::time::pause` / `advance`.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// Key shared by every caller that has no usable identity.
pub const ANONYMOUS_KEY: &str = "anonymous";

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl Bucket {
    fn full(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_refill: now,
        }
    }

    fn try_take(&mut self, now: Instant, interval: Duration, capacity: f64) -> bool {
        let elapsed = now.saturating_duration_since(self.last_refill);
        if !elapsed.is_zero() {
            let refill = elapsed.as_secs_f64() / interval.as_secs_f64();
            self.tokens = (self.tokens + refill).min(capacity);
            self.last_refill = now;
        }
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

#[derive(Debug)]
struct Entry {
    bucket: Bucket,
    /// `None` when the idle expiry lies beyond what `Instant` can represent.
    expires: Option<Instant>,
}

impl Entry {
    fn expired(&self, now: Instant) -> bool {
        self.expires.is_some_and(|expires| now > expires)
    }
}

#[derive(Debug)]
struct Limits {
    interval: Duration,
    capacity: f64,
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry>>,
}

/// Per-key rate limiter guarding entry into a dispatcher.
///
/// A gate built from a non-positive request count or window is disabled
/// and admits everything.
#[derive(Debug)]
pub struct RateGate {
    limits: Option<Limits>,
}

impl RateGate {
    /// Creates a gate allowing `requests` calls per `window` for each key.
    #[must_use]
    pub fn new(requests: u32, window: Duration) -> Self {
        if requests == 0 || window.is_zero() {
            tracing::warn!(requests, ?window, "rate gate disabled by configuration");
            return Self::disabled();
        }
        Self {
            limits: Some(Limits {
                interval: window / requests,
                capacity: f64::from(requests),
                ttl: window.saturating_mul(2),
                entries: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Creates a gate that admits every request.
    #[must_use]
    pub const fn disabled() -> Self {
        Self { limits: None }
    }

    /// Returns `true` if the gate enforces a limit.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.limits.is_some()
    }

    /// Consumes one token for `key`, returning whether the call is admitted.
    ///
    /// Empty keys share the [`ANONYMOUS_KEY`] bucket.
    pub fn allow(&self, key: &str) -> bool {
        let Some(limits) = &self.limits else {
            return true;
        };
        let key = match key.trim() {
            "" => ANONYMOUS_KEY,
            trimmed => trimmed,
        };
        let now = Instant::now();

        let mut entries = limits.entries.lock();
        let entry = entries
            .entry(key.to_string())
            .and_modify(|entry| {
                if entry.expired(now) {
                    entry.bucket = Bucket::full(limits.capacity, now);
                }
            })
            .or_insert_with(|| Entry {
                bucket: Bucket::full(limits.capacity, now),
                expires: None,
            });
        entry.expires = now.checked_add(limits.ttl);

        let allowed = entry
            .bucket
            .try_take(now, limits.interval, limits.capacity);
        if !allowed {
            let before = entries.len();
            entries.retain(|_, entry| !entry.expired(now));
            tracing::debug!(
                key,
                evicted = before - entries.len(),
                "rate gate denied request"
            );
        }
        allowed
    }

    /// Number of keys currently tracked.
    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        self.limits
            .as_ref()
            .map_or(0, |limits| limits.entries.lock().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(60);

    #[test]
    fn disabled_gate_always_allows() {
        let zero_requests = RateGate::new(0, WINDOW);
        let zero_window = RateGate::new(5, Duration::ZERO);
        assert!(!zero_requests.is_enabled());
        assert!(!zero_window.is_enabled());
        for _ in 0..100 {
            assert!(zero_requests.allow("10.0.0.1"));
            assert!(zero_window.allow("10.0.0.1"));
        }
        assert_eq!(zero_requests.tracked_keys(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn request_past_burst_is_denied() {
        let gate = RateGate::new(3, WINDOW);
        assert!(gate.allow("10.0.0.1"));
        assert!(gate.allow("10.0.0.1"));
        assert!(gate.allow("10.0.0.1"));
        assert!(!gate.allow("10.0.0.1"));
    }

    #[tokio::test(start_paused = true)]
    async fn keys_have_independent_buckets() {
        let gate = RateGate::new(1, WINDOW);
        assert!(gate.allow("10.0.0.1"));
        assert!(!gate.allow("10.0.0.1"));
        assert!(gate.allow("10.0.0.2"));
        assert_eq!(gate.tracked_keys(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn capacity_replenishes_after_window() {
        let gate = RateGate::new(5, WINDOW);
        for _ in 0..5 {
            assert!(gate.allow("client"));
        }
        assert!(!gate.allow("client"));

        tokio::time::advance(WINDOW).await;
        for _ in 0..5 {
            assert!(gate.allow("client"));
        }
        assert!(!gate.allow("client"));
    }

    #[tokio::test(start_paused = true)]
    async fn tokens_refill_one_interval_at_a_time() {
        let gate = RateGate::new(4, WINDOW);
        for _ in 0..4 {
            assert!(gate.allow("client"));
        }
        assert!(!gate.allow("client"));

        tokio::time::advance(WINDOW / 4).await;
        assert!(gate.allow("client"));
        assert!(!gate.allow("client"));
    }

    #[tokio::test(start_paused = true)]
    async fn empty_keys_share_anonymous_bucket() {
        let gate = RateGate::new(2, WINDOW);
        assert!(gate.allow(""));
        assert!(gate.allow("   "));
        assert!(!gate.allow(""));
        assert!(!gate.allow(ANONYMOUS_KEY));
        assert_eq!(gate.tracked_keys(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn denial_sweeps_expired_entries() {
        let gate = RateGate::new(1, WINDOW);
        assert!(gate.allow("stale-a"));
        assert!(gate.allow("stale-b"));
        assert_eq!(gate.tracked_keys(), 2);

        tokio::time::advance(WINDOW * 2 + Duration::from_secs(1)).await;
        assert!(gate.allow("fresh"));
        assert!(!gate.allow("fresh"));
        assert_eq!(gate.tracked_keys(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn huge_window_still_limits_without_overflow() {
        let gate = RateGate::new(2, Duration::from_secs(u64::MAX));
        assert!(gate.is_enabled());
        assert!(gate.allow("client"));
        assert!(gate.allow("client"));
        assert!(!gate.allow("client"));

        tokio::time::advance(Duration::from_secs(3600)).await;
        assert!(!gate.allow("client"));
        assert!(gate.allow("other"));
        assert_eq!(gate.tracked_keys(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entry_is_replaced_with_full_bucket() {
        let gate = RateGate::new(2, WINDOW);
        assert!(gate.allow("client"));
        assert!(gate.allow("client"));
        assert!(!gate.allow("client"));

        tokio::time::advance(WINDOW * 3).await;
        assert!(gate.allow("client"));
        assert!(gate.allow("client"));
        assert!(!gate.allow("client"));
    }
}
