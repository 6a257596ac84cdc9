//! Token bucket for client-side request pacing.

use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

/// Token bucket shared by every request of one fetcher.
///
/// Tokens are added at a constant rate and consumed per request. The bucket
/// starts full, so the first `requests_per_minute` requests go out at once.
pub struct TokenBucket {
    state: Mutex<BucketState>,
    capacity: f64,
    /// Tokens added per second.
    refill_rate: f64,
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// `requests_per_minute` must be non-zero.
    pub fn new(requests_per_minute: u32) -> Self {
        let capacity = requests_per_minute.max(1) as f64;
        Self {
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
            capacity,
            refill_rate: capacity / 60.0,
        }
    }

    /// Take a token without waiting.
    ///
    /// Returns `Err(wait)` with the time until a token is available.
    pub async fn try_acquire(&self) -> Result<(), Duration> {
        let mut state = self.state.lock().await;
        self.refill(&mut state);

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            Ok(())
        } else {
            let needed = 1.0 - state.tokens;
            Err(Duration::from_secs_f64(needed / self.refill_rate))
        }
    }

    /// Wait until a token is available, then take it.
    pub async fn acquire(&self) {
        while let Err(wait) = self.try_acquire().await {
            tokio::time::sleep(wait).await;
        }
    }

    pub async fn available(&self) -> f64 {
        let mut state = self.state.lock().await;
        self.refill(&mut state);
        state.tokens
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_rate).min(self.capacity);
        state.last_refill = now;
    }
}
