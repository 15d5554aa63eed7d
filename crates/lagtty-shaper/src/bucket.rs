//! Token-bucket rate limiter for bursty output shaping.

use std::time::Duration;

use tokio::time::Instant;

/// A token bucket: tokens accrue at `rate` per second up to `burst`, and
/// each emitted byte consumes one token.
///
/// The bucket starts full, so short interactive writes pass untouched while
/// sustained traffic converges on `rate` bytes per second. Time comes from
/// [`tokio::time::Instant`] so the paused-clock test harness can drive the
/// limiter deterministically.
#[derive(Debug)]
pub struct TokenBucket {
    rate: f64,
    burst: usize,
    tokens: f64,
    updated: Instant,
}

impl TokenBucket {
    /// Create a bucket refilling at `rate` bytes per second with capacity
    /// `burst` bytes. `rate` must be non-zero; a zero rate is the caller's
    /// signal to skip rate limiting entirely.
    pub fn new(rate: u64, burst: usize) -> Self {
        Self {
            rate: rate as f64,
            burst,
            tokens: burst as f64,
            updated: Instant::now(),
        }
    }

    /// Bucket capacity in bytes.
    pub fn burst(&self) -> usize {
        self.burst
    }

    /// Credit tokens for the time elapsed since the last update, capped at
    /// the burst capacity.
    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.updated);
        self.tokens = (self.tokens + elapsed.as_secs_f64() * self.rate).min(self.burst as f64);
        self.updated = now;
    }

    /// Wait until `n` tokens are available, then consume them.
    ///
    /// Callers split writes so that `n` never exceeds [`burst`](Self::burst).
    /// After rounding, the balance may dip fractionally below zero; the
    /// deficit carries into the next wait.
    pub async fn wait_n(&mut self, n: usize) {
        self.refill(Instant::now());
        let need = n as f64;
        if self.tokens < need {
            let wait = Duration::from_secs_f64((need - self.tokens) / self.rate);
            tokio::time::sleep(wait).await;
            self.refill(Instant::now());
        }
        self.tokens -= need;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn initial_burst_is_free() {
        let mut bucket = TokenBucket::new(100, 10);
        let start = Instant::now();
        bucket.wait_n(10).await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn sustained_traffic_paces_at_rate() {
        let mut bucket = TokenBucket::new(100, 10);
        let start = Instant::now();
        // 30 bytes at 100 B/s with a 10-byte burst: the first 10 are free,
        // the remaining 20 take 200ms.
        for _ in 0..3 {
            bucket.wait_n(10).await;
        }
        let elapsed = start.elapsed();
        assert!(
            elapsed >= Duration::from_millis(195) && elapsed <= Duration::from_millis(220),
            "elapsed {elapsed:?} outside ~200ms"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn idle_gap_refills_at_most_one_burst() {
        let mut bucket = TokenBucket::new(100, 10);
        bucket.wait_n(10).await;
        tokio::time::sleep(Duration::from_secs(60)).await;

        // A long idle period must not bank more than `burst` tokens.
        let start = Instant::now();
        bucket.wait_n(10).await;
        assert_eq!(start.elapsed(), Duration::ZERO);

        let start = Instant::now();
        bucket.wait_n(10).await;
        assert!(start.elapsed() >= Duration::from_millis(95));
    }
}
