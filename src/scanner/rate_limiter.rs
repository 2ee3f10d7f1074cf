//! Optional pacing of probe starts.
//!
//! Token bucket rate limiting on top of the concurrency limiter, for scans
//! that must not open connections faster than a fixed rate.

use governor::{Quota, RateLimiter as GovLimiter};
use nonzero_ext::nonzero;
use std::num::NonZeroU32;
use std::sync::Arc;

type DirectLimiter = GovLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// A shared probes-per-second limit.
#[derive(Clone)]
pub struct RateLimiter {
    limiter: Arc<DirectLimiter>,
}

impl RateLimiter {
    /// Create a limiter for `rate` probe starts per second.
    ///
    /// Returns `None` for a rate of 0, which means unlimited.
    pub fn new(rate: u32) -> Option<Self> {
        let rate = NonZeroU32::new(rate)?;
        let quota = Quota::per_second(rate).allow_burst(nonzero!(1u32));

        Some(Self {
            limiter: Arc::new(GovLimiter::direct(quota)),
        })
    }

    /// Wait until the rate limit allows another probe.
    pub async fn wait(&self) {
        self.limiter.until_ready().await;
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn test_zero_rate_is_unlimited() {
        assert!(RateLimiter::new(0).is_none());
    }

    #[tokio::test]
    async fn test_waits_are_spaced_out() {
        let limiter = RateLimiter::new(20).unwrap();
        let start = Instant::now();
        for _ in 0..3 {
            limiter.wait().await;
        }
        // Burst of one: the second and third starts are 50ms apart each
        assert!(start.elapsed() >= Duration::from_millis(80));
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let a = RateLimiter::new(20).unwrap();
        let b = a.clone();
        let start = Instant::now();
        a.wait().await;
        b.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn test_wait_completes_at_high_rate() {
        let limiter = RateLimiter::new(10_000).unwrap();
        limiter.wait().await;
        limiter.wait().await;
    }
}
