use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Sliding-window attempt counter keyed by strings like `login:<ip_hash>`.
#[derive(Default)]
pub struct RateLimiter {
    entries: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        RateLimiter::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, VecDeque<Instant>>> {
        // A panic while holding the lock leaves only timestamps behind; keep going.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record an attempt at `now`; false once `max_attempts` already happened inside `window`.
    /// Every call also drops keys with no attempts left inside `window`.
    pub fn check_and_record_at(&self, key: &str, max_attempts: u64, window: Duration, now: Instant) -> bool {
        let mut map = self.lock();
        prune(&mut map, window, now);
        let attempts = map.entry(key.to_string()).or_default();

        if (attempts.len() as u64) < max_attempts {
            attempts.push_back(now);
            true
        } else {
            false
        }
    }

    pub fn check_and_record(&self, key: &str, max_attempts: u64, window: Duration) -> bool {
        self.check_and_record_at(key, max_attempts, window, Instant::now())
    }

    /// Forget a key, e.g. after a successful login.
    pub fn reset(&self, key: &str) {
        self.lock().remove(key);
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.lock().len()
    }
}

fn prune(map: &mut HashMap<String, VecDeque<Instant>>, window: Duration, now: Instant) {
    map.retain(|_, attempts| {
        while let Some(&oldest) = attempts.front() {
            if now.duration_since(oldest) >= window {
                attempts.pop_front();
            } else {
                break;
            }
        }
        !attempts.is_empty()
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_after_limit() {
        let limiter = RateLimiter::new();
        let window = Duration::from_secs(60);
        let t0 = Instant::now();
        assert!(limiter.check_and_record_at("login:x", 2, window, t0));
        assert!(limiter.check_and_record_at("login:x", 2, window, t0));
        assert!(!limiter.check_and_record_at("login:x", 2, window, t0));
        // Other keys are independent
        assert!(limiter.check_and_record_at("login:y", 2, window, t0));
    }

    #[test]
    fn window_slides() {
        let limiter = RateLimiter::new();
        let window = Duration::from_secs(60);
        let t0 = Instant::now();
        assert!(limiter.check_and_record_at("k", 1, window, t0));
        assert!(!limiter.check_and_record_at("k", 1, window, t0 + Duration::from_secs(30)));
        assert!(limiter.check_and_record_at("k", 1, window, t0 + Duration::from_secs(61)));
    }

    #[test]
    fn drained_keys_are_dropped() {
        let limiter = RateLimiter::new();
        let window = Duration::from_secs(60);
        let t0 = Instant::now();
        for i in 0..50 {
            assert!(limiter.check_and_record_at(&format!("login:{}", i), 5, window, t0));
        }
        assert_eq!(limiter.tracked_keys(), 50);

        assert!(limiter.check_and_record_at("login:late", 5, window, t0 + Duration::from_secs(60)));
        assert_eq!(limiter.tracked_keys(), 1);
    }

    #[test]
    fn reset_clears_key() {
        let limiter = RateLimiter::new();
        let window = Duration::from_secs(60);
        assert!(limiter.check_and_record("k", 1, window));
        assert!(!limiter.check_and_record("k", 1, window));
        limiter.reset("k");
        assert!(limiter.check_and_record("k", 1, window));
    }
}
