//! Fixed-window rate limiting for the auth endpoints.
//!
//! Counters are keyed by `{endpoint}:{client-ip}`. The first hit opens a
//! window; hits inside the window increment the count; the first hit more than
//! a full window after it opened starts a new one. A hit is allowed while the count is at
//! most the endpoint's threshold.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Counter state for one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCounter {
    /// Hits in the current window, including the latest.
    pub count: u32,
    /// When the current window opened.
    pub window_start: Instant,
}

/// Storage for window counters.
///
/// `hit` must be atomic per key: concurrent hits on the same key are counted
/// one after the other.
pub trait CounterStore: Send + Sync {
    /// Record a hit at `now` and return the updated counter.
    fn hit(&self, key: &str, window: Duration, now: Instant) -> WindowCounter;

    /// Drop counters whose window ended before `now`.
    fn purge_expired(&self, window: Duration, now: Instant);

    /// Number of tracked keys.
    fn len(&self) -> usize;

    /// Whether no key is tracked.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-local counter store.
#[derive(Debug, Default)]
pub struct InMemoryCounterStore {
    counters: Mutex<HashMap<String, WindowCounter>>,
}

impl InMemoryCounterStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, WindowCounter>> {
        match self.counters.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl CounterStore for InMemoryCounterStore {
    fn hit(&self, key: &str, window: Duration, now: Instant) -> WindowCounter {
        let mut counters = self.lock();
        let counter = counters
            .entry(key.to_string())
            .and_modify(|c| {
                if now.saturating_duration_since(c.window_start) <= window {
                    c.count = c.count.saturating_add(1);
                } else {
                    c.count = 1;
                    c.window_start = now;
                }
            })
            .or_insert(WindowCounter {
                count: 1,
                window_start: now,
            });
        *counter
    }

    fn purge_expired(&self, window: Duration, now: Instant) {
        self.lock()
            .retain(|_, c| now.saturating_duration_since(c.window_start) <= window);
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}

/// Result of a rate limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitResult {
    /// Request is allowed.
    Allowed,
    /// Request is denied.
    Denied {
        /// Time until the window resets.
        retry_after: Duration,
    },
}

impl RateLimitResult {
    /// Check if the request is allowed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitResult::Allowed)
    }
}

/// Per-endpoint, per-client fixed-window limiter.
///
/// # Example
///
/// ```
/// use haven::rate_limit::RateLimiter;
/// use std::time::Duration;
///
/// let limiter = RateLimiter::in_memory(Duration::from_secs(60));
/// assert!(limiter.check("login", "203.0.113.7", 1).is_allowed());
/// assert!(!limiter.check("login", "203.0.113.7", 1).is_allowed());
/// ```
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    window: Duration,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("window", &self.window)
            .field("keys", &self.store.len())
            .finish()
    }
}

impl RateLimiter {
    /// Create a limiter over `store`.
    pub fn new(store: Arc<dyn CounterStore>, window: Duration) -> Self {
        Self { store, window }
    }

    /// Create a limiter with a fresh in-memory store.
    pub fn in_memory(window: Duration) -> Self {
        Self::new(Arc::new(InMemoryCounterStore::new()), window)
    }

    /// Window length.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record a hit for `endpoint` from `ip` and decide whether to allow it.
    pub fn check(&self, endpoint: &str, ip: &str, threshold: u32) -> RateLimitResult {
        self.check_at(endpoint, ip, threshold, Instant::now())
    }

    /// Same as [`check`](Self::check) with an explicit clock.
    pub fn check_at(
        &self,
        endpoint: &str,
        ip: &str,
        threshold: u32,
        now: Instant,
    ) -> RateLimitResult {
        let key = format!("{endpoint}:{ip}");
        let counter = self.store.hit(&key, self.window, now);
        if counter.count <= threshold {
            RateLimitResult::Allowed
        } else {
            let elapsed = now.saturating_duration_since(counter.window_start);
            RateLimitResult::Denied {
                retry_after: self.window.saturating_sub(elapsed),
            }
        }
    }

    /// Drop counters whose window has ended.
    pub fn cleanup(&self) {
        self.store.purge_expired(self.window, Instant::now());
    }

    /// Start a background task that periodically drops stale counters.
    pub fn start_cleanup_task(&self) -> tokio::task::JoinHandle<()> {
        let limiter = self.clone();
        let period = self.window.max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                limiter.cleanup();
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(60);

    #[test]
    fn test_allows_up_to_threshold() {
        let limiter = RateLimiter::in_memory(WINDOW);
        let now = Instant::now();

        for i in 0..10 {
            assert!(
                limiter.check_at("login", "1.2.3.4", 10, now).is_allowed(),
                "hit {} denied",
                i + 1
            );
        }
        let result = limiter.check_at("login", "1.2.3.4", 10, now);
        assert_eq!(result, RateLimitResult::Denied { retry_after: WINDOW });
    }

    #[test]
    fn test_window_resets() {
        let limiter = RateLimiter::in_memory(WINDOW);
        let start = Instant::now();

        for _ in 0..11 {
            limiter.check_at("login", "1.2.3.4", 10, start);
        }
        assert!(!limiter
            .check_at("login", "1.2.3.4", 10, start + Duration::from_secs(59))
            .is_allowed());
        assert!(!limiter
            .check_at("login", "1.2.3.4", 10, start + WINDOW)
            .is_allowed());
        assert!(limiter
            .check_at("login", "1.2.3.4", 10, start + WINDOW + Duration::from_millis(1))
            .is_allowed());
    }

    #[test]
    fn test_retry_after_shrinks() {
        let limiter = RateLimiter::in_memory(WINDOW);
        let start = Instant::now();
        limiter.check_at("signup", "ip", 1, start);

        let result = limiter.check_at("signup", "ip", 1, start + Duration::from_secs(45));
        assert_eq!(
            result,
            RateLimitResult::Denied {
                retry_after: Duration::from_secs(15)
            }
        );
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = RateLimiter::in_memory(WINDOW);
        let now = Instant::now();

        assert!(limiter.check_at("login", "10.0.0.1", 1, now).is_allowed());
        assert!(!limiter.check_at("login", "10.0.0.1", 1, now).is_allowed());
        assert!(limiter.check_at("login", "10.0.0.2", 1, now).is_allowed());
        assert!(limiter.check_at("signup", "10.0.0.1", 1, now).is_allowed());
    }

    #[test]
    fn test_purge_expired() {
        let store = InMemoryCounterStore::new();
        let start = Instant::now();
        store.hit("login:a", WINDOW, start);
        store.hit("login:b", WINDOW, start + Duration::from_secs(30));
        assert_eq!(store.len(), 2);

        store.purge_expired(WINDOW, start + WINDOW);
        assert_eq!(store.len(), 2);
        store.purge_expired(WINDOW, start + Duration::from_secs(61));
        assert_eq!(store.len(), 1);
        store.purge_expired(WINDOW, start + Duration::from_secs(91));
        assert!(store.is_empty());
    }

    #[test]
    fn test_concurrent_hits_are_all_counted() {
        let limiter = RateLimiter::in_memory(WINDOW);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || {
                    (0..25)
                        .filter(|_| limiter.check("login", "ip", 100).is_allowed())
                        .count()
                })
            })
            .collect();
        let allowed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(allowed, 100);
    }
}
