use std::time::Duration;

use tokio::time::{Instant, sleep};

/// Spaces out requests to one host.
///
/// Providers keep it behind an `Arc<tokio::sync::Mutex<_>>` so concurrent
/// requests queue on the lock.
#[derive(Debug)]
pub struct RateLimiter {
    last_request: Instant,
    min_interval: Duration,
}

impl RateLimiter {
    /// Limiter allowing one request per `min_interval`. The first request
    /// goes through immediately.
    #[must_use]
    pub fn new(min_interval: Duration) -> Self {
        let now = Instant::now();
        Self {
            last_request: now.checked_sub(min_interval).unwrap_or(now),
            min_interval,
        }
    }

    /// Minimum spacing between requests.
    #[must_use]
    pub const fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Sleeps until `min_interval` has passed since the previous request.
    pub async fn wait(&mut self) {
        let elapsed = self.last_request.elapsed();
        if elapsed < self.min_interval {
            sleep(self.min_interval - elapsed).await;
        }
        self.last_request = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_spaces_out_requests() {
        let interval = Duration::from_millis(40);
        let mut limiter = RateLimiter::new(interval);
        assert_eq!(limiter.min_interval(), interval);

        let start = Instant::now();
        limiter.wait().await;
        assert!(start.elapsed() < interval);

        limiter.wait().await;
        limiter.wait().await;
        assert!(start.elapsed() >= interval * 2);
    }

    #[tokio::test]
    async fn test_zero_interval_never_sleeps() {
        let mut limiter = RateLimiter::new(Duration::ZERO);
        let start = Instant::now();
        for _ in 0..5 {
            limiter.wait().await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
