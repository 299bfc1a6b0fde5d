//! Per-session sliding window rate limiting.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::ConfigurationError;

pub const DEFAULT_MAX_REQUESTS: u32 = 10;
pub const DEFAULT_WINDOW_SECONDS: u64 = 60;

/// Admits at most `max_requests` per session within a trailing window.
///
/// Expired timestamps are purged on every check; there is no background
/// eviction.
#[derive(Debug)]
pub struct SessionRateLimiter {
    max_requests: u32,
    window: Duration,
    sessions: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl Default for SessionRateLimiter {
    fn default() -> Self {
        Self {
            max_requests: DEFAULT_MAX_REQUESTS,
            window: Duration::from_secs(DEFAULT_WINDOW_SECONDS),
            sessions: Mutex::new(HashMap::new()),
        }
    }
}

impl SessionRateLimiter {
    pub fn new(max_requests: u32, window_seconds: u64) -> Result<Self, ConfigurationError> {
        if max_requests == 0 {
            return Err(ConfigurationError::ZeroMaxRequests);
        }
        if window_seconds == 0 {
            return Err(ConfigurationError::ZeroWindow);
        }
        Ok(Self {
            max_requests,
            window: Duration::from_secs(window_seconds),
            sessions: Mutex::new(HashMap::new()),
        })
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn window_seconds(&self) -> u64 {
        self.window.as_secs()
    }

    /// Returns `(true, "OK")` and records the request, or `(false, reason)`
    /// without recording it.
    pub fn is_allowed(&self, session_id: &str) -> (bool, String) {
        self.is_allowed_at(session_id, Instant::now())
    }

    fn is_allowed_at(&self, session_id: &str, now: Instant) -> (bool, String) {
        let mut sessions = self.lock();
        let count = purge_session(&mut sessions, session_id, now, self.window);
        if count >= self.max_requests as usize {
            debug!(session_id, count, "rate limit exceeded");
            return (
                false,
                format!(
                    "Rate limit exceeded: {}/{} requests in {}s",
                    count,
                    self.max_requests,
                    self.window.as_secs()
                ),
            );
        }

        sessions
            .entry(session_id.to_string())
            .or_default()
            .push_back(now);
        (true, "OK".to_string())
    }

    /// Forget every tracked request for a session.
    pub fn reset(&self, session_id: &str) {
        self.lock().remove(session_id);
    }

    /// Requests currently counted against a session's window.
    pub fn tracked_requests(&self, session_id: &str) -> usize {
        self.tracked_requests_at(session_id, Instant::now())
    }

    fn tracked_requests_at(&self, session_id: &str, now: Instant) -> usize {
        purge_session(&mut self.lock(), session_id, now, self.window)
    }

    /// Number of sessions with at least one request still in the map.
    pub fn tracked_sessions(&self) -> usize {
        self.lock().len()
    }

    /// The map only holds timestamps, so a panic mid-update can't leave it in a
    /// state worth refusing to read.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, VecDeque<Instant>>> {
        self.sessions.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Purge a session's expired timestamps and return how many remain. A session
/// left with none is removed from the map.
fn purge_session(
    sessions: &mut HashMap<String, VecDeque<Instant>>,
    session_id: &str,
    now: Instant,
    length: Duration,
) -> usize {
    let Some(window) = sessions.get_mut(session_id) else {
        return 0;
    };
    purge_expired(window, now, length);
    let count = window.len();
    if count == 0 {
        sessions.remove(session_id);
    }
    count
}

/// Drop timestamps at or before `now - window`.
fn purge_expired(window: &mut VecDeque<Instant>, now: Instant, length: Duration) {
    while let Some(&oldest) = window.front() {
        if now.saturating_duration_since(oldest) >= length {
            window.pop_front();
        } else {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;

    #[test]
    fn test_rejects_zero_config() {
        assert_eq!(
            SessionRateLimiter::new(0, 10).unwrap_err(),
            ConfigurationError::ZeroMaxRequests
        );
        assert_eq!(
            SessionRateLimiter::new(5, 0).unwrap_err(),
            ConfigurationError::ZeroWindow
        );
    }

    #[test]
    fn test_allow_then_deny() {
        let limiter = SessionRateLimiter::new(1, 10).unwrap();
        assert_eq!(limiter.is_allowed("s"), (true, "OK".to_string()));
        assert_eq!(
            limiter.is_allowed("s"),
            (false, "Rate limit exceeded: 1/1 requests in 10s".to_string())
        );
    }

    #[test]
    fn test_denial_does_not_record() {
        let limiter = SessionRateLimiter::new(2, 60).unwrap();
        let start = Instant::now();
        assert!(limiter.is_allowed_at("s", start).0);
        assert!(limiter.is_allowed_at("s", start).0);
        for _ in 0..5 {
            assert!(!limiter.is_allowed_at("s", start).0);
        }
        assert_eq!(limiter.tracked_requests_at("s", start), 2);
    }

    #[test]
    fn test_reset_readmits() {
        let limiter = SessionRateLimiter::new(1, 10).unwrap();
        assert!(limiter.is_allowed("s").0);
        assert!(!limiter.is_allowed("s").0);
        limiter.reset("s");
        assert_eq!(limiter.tracked_requests("s"), 0);
        assert!(limiter.is_allowed("s").0);
    }

    #[test]
    fn test_reset_unknown_session_is_noop() {
        let limiter = SessionRateLimiter::default();
        limiter.reset("never-seen");
        assert_eq!(limiter.tracked_requests("never-seen"), 0);
    }

    #[test]
    fn test_sessions_are_independent() {
        let limiter = SessionRateLimiter::new(2, 60).unwrap();
        assert!(limiter.is_allowed("a").0);
        assert!(limiter.is_allowed("a").0);
        assert!(!limiter.is_allowed("a").0);

        assert!(limiter.is_allowed("b").0);
        assert!(limiter.is_allowed("b").0);
        assert!(!limiter.is_allowed("b").0);
    }

    #[test]
    fn test_window_slides() {
        let limiter = SessionRateLimiter::new(2, 10).unwrap();
        let t0 = Instant::now();
        assert!(limiter.is_allowed_at("s", t0).0);
        assert!(limiter.is_allowed_at("s", t0 + Duration::from_secs(5)).0);
        assert!(!limiter.is_allowed_at("s", t0 + Duration::from_secs(9)).0);

        // First request has aged out, second is still inside the window.
        assert!(limiter.is_allowed_at("s", t0 + Duration::from_secs(10)).0);
        assert_eq!(limiter.tracked_requests_at("s", t0 + Duration::from_secs(10)), 2);
        assert!(!limiter.is_allowed_at("s", t0 + Duration::from_secs(11)).0);

        // Everything expired.
        assert_eq!(limiter.tracked_requests_at("s", t0 + Duration::from_secs(30)), 0);
    }

    #[test]
    fn test_denial_reason_reports_purged_count() {
        let limiter = SessionRateLimiter::new(3, 10).unwrap();
        let t0 = Instant::now();
        for i in 0..3 {
            assert!(limiter.is_allowed_at("s", t0 + Duration::from_secs(i)).0);
        }
        let (allowed, reason) = limiter.is_allowed_at("s", t0 + Duration::from_secs(5));
        assert!(!allowed);
        assert_eq!(reason, "Rate limit exceeded: 3/3 requests in 10s");
    }

    #[test]
    fn test_expired_sessions_leave_the_map() {
        let limiter = SessionRateLimiter::new(1, 1).unwrap();
        let t0 = Instant::now();
        for i in 0..1000 {
            assert!(limiter.is_allowed_at(&format!("session-{i}"), t0).0);
        }
        assert_eq!(limiter.tracked_sessions(), 1000);

        let later = t0 + Duration::from_secs(3600);
        for i in 0..1000 {
            assert_eq!(limiter.tracked_requests_at(&format!("session-{i}"), later), 0);
        }
        assert_eq!(limiter.tracked_sessions(), 0);
    }

    #[test]
    fn test_admission_after_expiry_replaces_session() {
        let limiter = SessionRateLimiter::new(1, 10).unwrap();
        let t0 = Instant::now();
        assert!(limiter.is_allowed_at("s", t0).0);
        assert!(limiter.is_allowed_at("s", t0 + Duration::from_secs(20)).0);
        assert_eq!(limiter.tracked_sessions(), 1);
        assert_eq!(limiter.tracked_requests_at("s", t0 + Duration::from_secs(20)), 1);
    }

    #[test]
    fn test_unknown_session_lookup_adds_nothing() {
        let limiter = SessionRateLimiter::default();
        assert_eq!(limiter.tracked_requests("ghost"), 0);
        assert_eq!(limiter.tracked_sessions(), 0);
        assert!(limiter.is_allowed("real").0);
        limiter.reset("real");
        assert_eq!(limiter.tracked_sessions(), 0);
    }

    #[test]
    fn test_concurrent_admission_is_exact() {
        const THREADS: usize = 32;
        const LIMIT: u32 = 7;

        let limiter = SessionRateLimiter::new(LIMIT, 60).unwrap();
        let admitted = AtomicUsize::new(0);
        let barrier = Barrier::new(THREADS);

        std::thread::scope(|scope| {
            for _ in 0..THREADS {
                scope.spawn(|| {
                    barrier.wait();
                    if limiter.is_allowed("shared").0 {
                        admitted.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
        });

        assert_eq!(admitted.load(Ordering::SeqCst), LIMIT as usize);
        assert_eq!(limiter.tracked_requests("shared"), LIMIT as usize);
    }

    #[test]
    fn test_concurrent_under_limit_admits_all() {
        const THREADS: usize = 5;

        let limiter = SessionRateLimiter::new(10, 60).unwrap();
        let admitted = AtomicUsize::new(0);
        let barrier = Barrier::new(THREADS);

        std::thread::scope(|scope| {
            for _ in 0..THREADS {
                scope.spawn(|| {
                    barrier.wait();
                    if limiter.is_allowed("shared").0 {
                        admitted.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
        });

        assert_eq!(admitted.load(Ordering::SeqCst), THREADS);
    }
}
