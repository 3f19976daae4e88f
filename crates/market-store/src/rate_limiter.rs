//! Token-bucket rate limiter shared by all tasks hitting one external
//! source.

use std::sync::Mutex;
use std::time::{Duration, Instant};

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket allowing `max_calls` per `period_seconds`, refilled
/// continuously. `acquire` suspends the task until a token is free;
/// `try_acquire` never blocks.
pub struct RateLimiter {
    max_calls: f64,
    period_seconds: f64,
    state: Mutex<BucketState>,
}

impl RateLimiter {
    pub fn new(max_calls: u32, period_seconds: f64) -> Self {
        Self {
            max_calls: max_calls as f64,
            period_seconds,
            state: Mutex::new(BucketState {
                tokens: max_calls as f64,
                last_refill: Instant::now(),
            }),
        }
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        let new_tokens = elapsed * (self.max_calls / self.period_seconds);
        state.tokens = (state.tokens + new_tokens).min(self.max_calls);
        state.last_refill = now;
    }

    /// Wait until a token is available, then consume it.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().unwrap();
                self.refill(&mut state);
                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    return;
                }
                (1.0 - state.tokens) / (self.max_calls / self.period_seconds)
            };
            tracing::debug!("rate limiter waiting {:.2}s for next token", wait);
            tokio::time::sleep(Duration::from_secs_f64(wait)).await;
        }
    }

    /// Consume a token if one is free; false otherwise.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        self.refill(&mut state);
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_acquire_exhausts_the_bucket() {
        let limiter = RateLimiter::new(3, 60.0);
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
    }

    #[tokio::test]
    async fn acquire_succeeds_within_budget() {
        let limiter = RateLimiter::new(5, 1.0);
        for _ in 0..5 {
            limiter.acquire().await;
        }
        assert!(!limiter.try_acquire());
    }

    #[tokio::test]
    async fn tokens_refill_over_time() {
        let limiter = RateLimiter::new(10, 0.2);
        for _ in 0..10 {
            assert!(limiter.try_acquire());
        }
        assert!(!limiter.try_acquire());
        // Full refill after one period
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(limiter.try_acquire());
    }

    #[tokio::test]
    async fn acquire_blocks_until_refill() {
        let limiter = RateLimiter::new(1, 0.1);
        limiter.acquire().await;
        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(50));
    }
}
