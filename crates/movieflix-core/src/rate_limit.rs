//! Request throttling for the TMDB client.
//!
//! Requests wait on a governor limiter. A 429 swaps in a slower limiter and
//! schedules a restore; the first request after that deadline puts the base
//! rate back.

use std::num::NonZeroU32;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

use crate::remote::RemoteError;

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Largest slowdown applied after repeated 429s.
const MAX_SLOWDOWN: u32 = 16;

/// Minimum time spent slowed down after a 429.
const RESTORE_AFTER: Duration = Duration::from_secs(60);

fn limiter_for(period: Duration) -> Arc<DirectLimiter> {
    let quota = Quota::with_period(period).unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN));
    Arc::new(DirectLimiter::direct(quota))
}

#[derive(Debug, Clone, Copy)]
struct Backoff {
    /// Period multiplier: 1 is the configured rate.
    factor: u32,
    restore_at: Option<Instant>,
}

/// Rate limiter that slows down while TMDB is answering 429.
pub struct AdaptiveLimiter {
    limiter: ArcSwap<DirectLimiter>,
    base_period: Duration,
    backoff: Mutex<Backoff>,
}

impl AdaptiveLimiter {
    pub fn new(period: Duration) -> Self {
        Self {
            limiter: ArcSwap::new(limiter_for(period)),
            base_period: period,
            backoff: Mutex::new(Backoff {
                factor: 1,
                restore_at: None,
            }),
        }
    }

    /// Allow `n` requests per second.
    pub fn per_second(n: u32) -> Self {
        let ms = 1000 / n.max(1) as u64;
        Self::new(Duration::from_millis(ms.max(1)))
    }

    /// Wait until a request may be sent.
    pub async fn acquire(&self) {
        self.restore_if_due(Instant::now());
        let limiter = self.limiter.load_full();
        limiter.until_ready().await;
    }

    pub fn slowdown_factor(&self) -> u32 {
        self.backoff.lock().map(|b| b.factor).unwrap_or(1)
    }

    /// Halve the rate (down to 1/16th) and stay there for at least a minute,
    /// or for `retry_after` if the server asked for longer.
    pub fn on_rate_limited(&self, retry_after: Option<Duration>) {
        let Ok(mut backoff) = self.backoff.lock() else {
            return;
        };
        backoff.factor = (backoff.factor * 2).min(MAX_SLOWDOWN);
        let hold = retry_after.map_or(RESTORE_AFTER, |d| d.max(RESTORE_AFTER));
        backoff.restore_at = Some(Instant::now() + hold);

        let period = self.base_period.saturating_mul(backoff.factor);
        tracing::debug!(factor = backoff.factor, hold_secs = hold.as_secs(), "tmdb rate limited, slowing down");
        self.limiter.store(limiter_for(period));
    }

    fn restore_if_due(&self, now: Instant) {
        let Ok(mut backoff) = self.backoff.lock() else {
            return;
        };
        if let Some(at) = backoff.restore_at
            && now >= at
        {
            *backoff = Backoff {
                factor: 1,
                restore_at: None,
            };
            tracing::debug!("tmdb rate limit lifted, restoring base rate");
            self.limiter.store(limiter_for(self.base_period));
        }
    }
}

impl std::fmt::Debug for AdaptiveLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdaptiveLimiter")
            .field("base_period", &self.base_period)
            .field("factor", &self.slowdown_factor())
            .finish()
    }
}

/// Turn a 429 into [`RemoteError::RateLimited`], honouring `Retry-After`.
pub fn check_rate_limit_response(resp: &reqwest::Response) -> Result<(), RemoteError> {
    if resp.status().as_u16() == 429 {
        let retry_after = resp
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);
        Err(RemoteError::RateLimited { retry_after })
    } else {
        Ok(())
    }
}

/// Parse a Retry-After header value (seconds or HTTP-date).
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    if let Ok(secs) = value.trim().parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    // HTTP-date form: wait a conservative fixed amount
    if value.contains(',') || value.contains("GMT") {
        return Some(Duration::from_secs(5));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_integer_seconds() {
        assert_eq!(parse_retry_after("5"), Some(Duration::from_secs(5)));
        assert_eq!(parse_retry_after(" 12 "), Some(Duration::from_secs(12)));
    }

    #[test]
    fn parse_http_date_uses_fallback() {
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"),
            Some(Duration::from_secs(5))
        );
    }

    #[test]
    fn parse_garbage() {
        assert_eq!(parse_retry_after("soon"), None);
    }

    #[test]
    fn slowdown_doubles_and_caps() {
        let limiter = AdaptiveLimiter::per_second(10);
        assert_eq!(limiter.slowdown_factor(), 1);
        limiter.on_rate_limited(None);
        assert_eq!(limiter.slowdown_factor(), 2);
        for _ in 0..10 {
            limiter.on_rate_limited(None);
        }
        assert_eq!(limiter.slowdown_factor(), MAX_SLOWDOWN);
    }

    #[test]
    fn base_rate_returns_only_after_the_hold() {
        let limiter = AdaptiveLimiter::per_second(10);
        limiter.on_rate_limited(Some(Duration::from_secs(120)));
        let now = Instant::now();

        limiter.restore_if_due(now + Duration::from_secs(90));
        assert_eq!(limiter.slowdown_factor(), 2);

        limiter.restore_if_due(now + Duration::from_secs(121));
        assert_eq!(limiter.slowdown_factor(), 1);
    }

    #[tokio::test]
    async fn acquire_succeeds_immediately_when_idle() {
        let limiter = AdaptiveLimiter::per_second(100);
        tokio::time::timeout(Duration::from_secs(1), limiter.acquire())
            .await
            .unwrap();
    }
}
