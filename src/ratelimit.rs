//! Rate-limit gate shared by every provider instance.
//!
//! Grounded in `mgit/providers/base.py`'s `_get_rate_limiter_config`,
//! `_wait_for_rate_limit`, `_check_rate_limit`: tracks `{limit, remaining,
//! reset}` per provider, waits out a soon-to-reset window with exponential
//! backoff and jitter, and gives up once the projected wait exceeds the
//! configured budget.

use crate::config::RateLimitConfig;
use crate::error::{MgitError, Result};
use rand::Rng;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A provider's rate-limit window, as reported by its most recent response
/// headers (`X-RateLimit-*` / `X-Rate-Limit-*`).
#[derive(Debug, Clone, Copy, Default)]
pub struct RateLimitWindow {
    pub limit: Option<u32>,
    pub remaining: Option<u32>,
    /// Unix timestamp the window resets at.
    pub reset_at: Option<u64>,
}

/// Per-provider rate-limit state plus the retry counter used to compute
/// exponential backoff.
pub struct RateLimitGate {
    provider: String,
    config: RateLimitConfig,
    window: Mutex<RateLimitWindow>,
    retry_count: Mutex<u32>,
}

impl RateLimitGate {
    pub fn new(provider: impl Into<String>, config: RateLimitConfig) -> Self {
        Self {
            provider: provider.into(),
            config,
            window: Mutex::new(RateLimitWindow::default()),
            retry_count: Mutex::new(0),
        }
    }

    /// Record the rate-limit window reported by a provider response.
    pub fn update_window(&self, window: RateLimitWindow) {
        *self.window.lock().unwrap() = window;
    }

    fn now_unix() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }

    /// Block until the current rate-limit window has cleared, or fail if
    /// the projected wait would exceed `max_wait_secs`.
    ///
    /// Mirrors `_wait_for_rate_limit`: a window is "exhausted" once
    /// `remaining <= 1`; the wait is `reset_at - now + 1s` (the extra second
    /// covers clock skew between us and the provider), and is skipped
    /// entirely if `reset_at` has already passed.
    pub async fn wait_if_needed(&self) -> Result<()> {
        let window = *self.window.lock().unwrap();

        let (remaining, reset_at) = match (window.remaining, window.reset_at) {
            (Some(r), Some(reset)) => (r, reset),
            _ => return Ok(()),
        };

        if remaining > 1 {
            return Ok(());
        }

        let now = Self::now_unix();
        if reset_at <= now {
            return Ok(());
        }

        let wait_secs = reset_at - now + 1;
        if wait_secs > self.config.max_wait_secs {
            return Err(MgitError::RateLimit {
                provider: self.provider.clone(),
                wait_secs,
                max_wait_secs: self.config.max_wait_secs,
            });
        }

        tokio::time::sleep(Duration::from_secs(wait_secs)).await;
        Ok(())
    }

    /// Exponential backoff with jitter for a transient (non-rate-limit)
    /// failure. Grounded in `_wait_for_rate_limit`'s retry-count-driven
    /// sleep, generalized to cover any retryable provider error.
    pub async fn backoff(&self) {
        let attempt = {
            let mut count = self.retry_count.lock().unwrap();
            *count += 1;
            *count
        };

        let base = self.config.exponential_rate.powi(attempt as i32 - 1);
        let capped = base.min(self.config.backoff_max_secs);
        let sleep_secs = capped + rand::thread_rng().gen_range(0.1..1.0);

        tokio::time::sleep(Duration::from_secs_f64(sleep_secs)).await;
    }

    pub fn reset_retry_count(&self) {
        *self.retry_count.lock().unwrap() = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> RateLimitGate {
        RateLimitGate::new("test", RateLimitConfig::default())
    }

    #[tokio::test]
    async fn no_wait_when_window_has_headroom() {
        let gate = gate();
        gate.update_window(RateLimitWindow {
            limit: Some(5000),
            remaining: Some(100),
            reset_at: Some(RateLimitGate::now_unix() + 60),
        });
        assert!(gate.wait_if_needed().await.is_ok());
    }

    #[tokio::test]
    async fn no_wait_when_no_window_known() {
        let gate = gate();
        assert!(gate.wait_if_needed().await.is_ok());
    }

    #[tokio::test]
    async fn fails_when_wait_exceeds_budget() {
        let mut config = RateLimitConfig::default();
        config.max_wait_secs = 10;
        let gate = RateLimitGate::new("test", config);
        gate.update_window(RateLimitWindow {
            limit: Some(5000),
            remaining: Some(0),
            reset_at: Some(RateLimitGate::now_unix() + 3600),
        });
        let result = gate.wait_if_needed().await;
        assert!(matches!(result, Err(MgitError::RateLimit { .. })));
    }
}
