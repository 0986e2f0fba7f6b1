//! Resource governor
//!
//! Owns the per-caller rate-limit windows and enforces table/row quotas and
//! the statement deadline. One instance is shared by every caller of an
//! `Engine`; tests build their own.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::{EngineConfig, QuotaConfig, RateLimitConfig};
use crate::error::{EngineError, Result};

/// Optional shared limiter (e.g. a rate-limit service) consulted before the
/// local window
#[async_trait]
pub trait RemoteRateLimiter: Send + Sync {
    /// `Err(EngineError::RateLimitExceeded)` rejects the call. Any other error
    /// is logged and the local window decides.
    async fn check(&self, caller: &str) -> Result<()>;
}

#[derive(Debug, Clone, Copy)]
struct RateWindow {
    count: u32,
    window_start: Instant,
}

/// Fixed window counter per caller, reset every `window`. Expired windows
/// are dropped at most once per window.
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: DashMap<String, RateWindow>,
    last_prune: Mutex<Instant>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: DashMap::new(),
            last_prune: Mutex::new(Instant::now()),
        }
    }

    /// Consume one slot for `caller`
    pub fn check(&self, caller: &str) -> Result<()> {
        self.check_at(caller, Instant::now())
    }

    /// Consume one slot for `caller` as of `now`
    pub fn check_at(&self, caller: &str, now: Instant) -> Result<()> {
        let window = self.config.window();
        self.prune_expired(now, window);

        // The entry guard holds the shard lock, so the read-modify-write is atomic per caller
        let mut entry = self
            .windows
            .entry(caller.to_string())
            .or_insert(RateWindow {
                count: 0,
                window_start: now,
            });

        let elapsed = now.saturating_duration_since(entry.window_start);
        if elapsed >= window {
            entry.count = 0;
            entry.window_start = now;
        }

        if entry.count >= self.config.max_queries_per_window {
            let remaining = window.saturating_sub(now.saturating_duration_since(entry.window_start));
            let retry_after_seconds = (remaining.as_secs_f64().ceil() as u64).max(1);
            return Err(EngineError::RateLimitExceeded { retry_after_seconds });
        }

        entry.count += 1;
        Ok(())
    }

    /// Must run before taking an entry guard: `retain` locks every shard
    fn prune_expired(&self, now: Instant, window: Duration) {
        {
            let mut last = self.last_prune.lock();
            if now.saturating_duration_since(*last) < window {
                return;
            }
            *last = now;
        }
        self.windows
            .retain(|_, w| now.saturating_duration_since(w.window_start) < window);
    }

    /// Callers with a window currently tracked
    pub fn tracked_callers(&self) -> usize {
        self.windows.len()
    }

    /// Slots left for `caller` in its current window
    pub fn remaining(&self, caller: &str) -> u32 {
        let now = Instant::now();
        match self.windows.get(caller) {
            Some(w) if now.saturating_duration_since(w.window_start) < self.config.window() => {
                self.config.max_queries_per_window.saturating_sub(w.count)
            }
            _ => self.config.max_queries_per_window,
        }
    }
}

/// Absolute point after which a statement must stop issuing store calls
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    timeout: Duration,
}

impl Deadline {
    pub fn new(timeout: Duration) -> Self {
        Self {
            started: Instant::now(),
            timeout,
        }
    }

    pub fn remaining(&self) -> Duration {
        self.timeout.saturating_sub(self.started.elapsed())
    }

    pub fn is_expired(&self) -> bool {
        self.started.elapsed() >= self.timeout
    }

    /// Fails with `Timeout` once expired
    pub fn check(&self) -> Result<()> {
        if self.is_expired() {
            Err(self.timeout_error())
        } else {
            Ok(())
        }
    }

    fn timeout_error(&self) -> EngineError {
        EngineError::Timeout {
            timeout_ms: self.timeout.as_millis() as u64,
        }
    }
}

pub struct Governor {
    rate_limiter: RateLimiter,
    remote: Option<Arc<dyn RemoteRateLimiter>>,
    quotas: QuotaConfig,
    query_timeout: Duration,
}

impl Governor {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            rate_limiter: RateLimiter::new(config.rate_limit.clone()),
            remote: None,
            quotas: config.quotas.clone(),
            query_timeout: config.query_timeout(),
        }
    }

    pub fn with_remote_limiter(mut self, remote: Arc<dyn RemoteRateLimiter>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    /// Remote limiter first (when configured), then the local window
    pub async fn check_rate_limit(&self, caller: &str) -> Result<()> {
        if let Some(remote) = &self.remote {
            match remote.check(caller).await {
                Ok(()) => {}
                Err(e @ EngineError::RateLimitExceeded { .. }) => {
                    tracing::warn!(caller, "remote rate limiter rejected query");
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(caller, error = %e, "remote rate limiter unavailable, using local window");
                }
            }
        }

        self.rate_limiter.check(caller).map_err(|e| {
            tracing::warn!(caller, "rate limit exceeded");
            e
        })
    }

    /// Creating one more table must stay within `max_tables`
    pub fn check_table_quota(&self, current_tables: usize) -> Result<()> {
        if current_tables >= self.quotas.max_tables {
            return Err(EngineError::ConstraintViolation(format!(
                "table limit reached: at most {} tables allowed",
                self.quotas.max_tables
            )));
        }
        Ok(())
    }

    /// Adding `adding` rows to a table holding `current_rows` must stay within `max_rows_per_table`
    pub fn check_row_quota(&self, table: &str, current_rows: usize, adding: usize) -> Result<()> {
        if current_rows.saturating_add(adding) > self.quotas.max_rows_per_table {
            return Err(EngineError::ConstraintViolation(format!(
                "row limit reached for table '{}': at most {} rows allowed ({} present, {} requested)",
                table, self.quotas.max_rows_per_table, current_rows, adding
            )));
        }
        Ok(())
    }

    /// Deadline for a statement starting now
    pub fn deadline(&self) -> Deadline {
        Deadline::new(self.query_timeout)
    }

    /// Race `fut` against the deadline. The future is dropped on expiry; store
    /// calls it already issued are not rolled back.
    pub async fn with_timeout<F, T>(&self, deadline: Deadline, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(deadline.remaining(), fut).await {
            Ok(result) => result,
            Err(_) => Err(deadline.timeout_error()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max: u32) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            max_queries_per_window: max,
            window_secs: 60,
        })
    }

    #[test]
    fn test_rate_limit_n_plus_one_fails() {
        let limiter = limiter(3);
        let start = Instant::now();
        for i in 0..3 {
            limiter.check_at("alice", start + Duration::from_secs(i)).unwrap();
        }
        match limiter.check_at("alice", start + Duration::from_secs(10)) {
            Err(EngineError::RateLimitExceeded { retry_after_seconds }) => {
                assert_eq!(retry_after_seconds, 50);
            }
            other => panic!("Expected rate limit error, got {:?}", other),
        }
    }

    #[test]
    fn test_rate_limit_window_resets() {
        let limiter = limiter(1);
        let start = Instant::now();
        limiter.check_at("bob", start).unwrap();
        assert!(limiter.check_at("bob", start + Duration::from_secs(59)).is_err());
        limiter.check_at("bob", start + Duration::from_secs(60)).unwrap();
    }

    #[test]
    fn test_rate_limit_is_per_caller() {
        let limiter = limiter(1);
        let now = Instant::now();
        limiter.check_at("a", now).unwrap();
        limiter.check_at("b", now).unwrap();
        assert!(limiter.check_at("a", now).is_err());
        assert_eq!(limiter.remaining("b"), 0);
        assert_eq!(limiter.remaining("c"), 1);
    }

    #[test]
    fn test_expired_windows_are_pruned() {
        let limiter = limiter(5);
        let start = Instant::now();
        for caller in ["a", "b", "c"] {
            limiter.check_at(caller, start).unwrap();
        }
        assert_eq!(limiter.tracked_callers(), 3);

        limiter.check_at("a", start + Duration::from_secs(30)).unwrap();
        assert_eq!(limiter.tracked_callers(), 3);

        limiter.check_at("d", start + Duration::from_secs(61)).unwrap();
        assert_eq!(limiter.tracked_callers(), 1);
        assert_eq!(limiter.remaining("d"), 4);
    }

    #[test]
    fn test_retry_after_is_positive_at_window_edge() {
        let limiter = limiter(1);
        let start = Instant::now();
        limiter.check_at("x", start).unwrap();
        match limiter.check_at("x", start + Duration::from_millis(59_999)) {
            Err(EngineError::RateLimitExceeded { retry_after_seconds }) => {
                assert!(retry_after_seconds >= 1)
            }
            other => panic!("Expected rate limit error, got {:?}", other),
        }
    }

    #[test]
    fn test_concurrent_callers_share_window_atomically() {
        let limiter = Arc::new(limiter(100));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                std::thread::spawn(move || (0..50).filter(|_| limiter.check("shared").is_ok()).count())
            })
            .collect();
        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 100);
    }

    #[test]
    fn test_quotas() {
        let mut config = EngineConfig::default();
        config.quotas = QuotaConfig {
            max_tables: 2,
            max_rows_per_table: 5,
        };
        let governor = Governor::new(&config);
        governor.check_table_quota(1).unwrap();
        assert!(matches!(
            governor.check_table_quota(2),
            Err(EngineError::ConstraintViolation(_))
        ));
        governor.check_row_quota("t", 3, 2).unwrap();
        assert!(matches!(
            governor.check_row_quota("t", 3, 3),
            Err(EngineError::ConstraintViolation(_))
        ));
    }

    #[tokio::test]
    async fn test_with_timeout() {
        let governor = Governor::new(&EngineConfig::default());
        let ok = governor
            .with_timeout(Deadline::new(Duration::from_secs(1)), async { Ok(7) })
            .await;
        assert_eq!(ok.unwrap(), 7);

        let slow = governor
            .with_timeout(Deadline::new(Duration::from_millis(10)), async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        assert!(matches!(slow, Err(EngineError::Timeout { timeout_ms: 10 })));
    }

    #[test]
    fn test_deadline_check() {
        let expired = Deadline::new(Duration::ZERO);
        assert!(matches!(expired.check(), Err(EngineError::Timeout { .. })));
        assert!(Deadline::new(Duration::from_secs(60)).check().is_ok());
    }

    struct RejectAll;

    #[async_trait]
    impl RemoteRateLimiter for RejectAll {
        async fn check(&self, _caller: &str) -> Result<()> {
            Err(EngineError::RateLimitExceeded { retry_after_seconds: 9 })
        }
    }

    struct Unreachable;

    #[async_trait]
    impl RemoteRateLimiter for Unreachable {
        async fn check(&self, _caller: &str) -> Result<()> {
            Err(EngineError::Semantic("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn test_remote_limiter() {
        let config = EngineConfig::default();
        let rejecting = Governor::new(&config).with_remote_limiter(Arc::new(RejectAll));
        assert!(matches!(
            rejecting.check_rate_limit("a").await,
            Err(EngineError::RateLimitExceeded { retry_after_seconds: 9 })
        ));

        let falling_back = Governor::new(&config).with_remote_limiter(Arc::new(Unreachable));
        assert!(falling_back.check_rate_limit("a").await.is_ok());
    }
}
