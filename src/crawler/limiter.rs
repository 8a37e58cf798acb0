//! Request pacing shared by the crawler and the batch downloader
//!
//! The limiter enforces a minimum delay between consecutive requests and a
//! short-burst allowance: after `burst_limit` requests inside one burst
//! window the next request pays a double delay penalty.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

/// Length of one burst window
const BURST_WINDOW: Duration = Duration::from_secs(10);

#[derive(Debug)]
struct LimiterState {
    delay: Duration,
    last_request: Option<Instant>,
    burst_count: u32,
    burst_start: Option<Instant>,
}

/// Delay gate with a burst allowance
///
/// Cloning is cheap and every clone shares the same timers. The internal
/// lock is held while waiting, so concurrent callers are released one at a
/// time.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    state: Arc<Mutex<LimiterState>>,
    burst_limit: u32,
}

impl RateLimiter {
    /// Creates a limiter allowing `requests_per_second` on average
    ///
    /// `requests_per_second` must be positive; configuration validation
    /// rejects anything else before a limiter is built. A rate too small
    /// for its delay to be represented saturates to [`Duration::MAX`].
    pub fn new(requests_per_second: f64, burst_limit: u32) -> Self {
        let delay = Duration::try_from_secs_f64(1.0 / requests_per_second).unwrap_or(Duration::MAX);
        Self::with_delay(delay, burst_limit)
    }

    /// Creates a limiter with an explicit base delay between requests
    pub fn with_delay(delay: Duration, burst_limit: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(LimiterState {
                delay,
                last_request: None,
                burst_count: 0,
                burst_start: None,
            })),
            burst_limit: burst_limit.max(1),
        }
    }

    /// Waits until the next request may be sent, then records it
    ///
    /// The burst penalty and the regular delay are both measured from the
    /// moment this call started, so a penalized request waits for the
    /// penalty and then for the full base delay as well.
    pub async fn wait_if_needed(&self) {
        let mut state = self.state.lock().await;
        let now = Instant::now();

        let window_expired = state
            .burst_start
            .map_or(true, |start| now.duration_since(start) > BURST_WINDOW);
        if window_expired {
            state.burst_count = 0;
            state.burst_start = Some(now);
        }

        if state.burst_count >= self.burst_limit {
            let penalty = state.delay.saturating_mul(2);
            tracing::debug!("Burst limit reached, waiting {:.2}s", penalty.as_secs_f64());
            sleep(penalty).await;
            state.burst_count = 0;
            state.burst_start = Some(now);
        }

        if let Some(last) = state.last_request {
            let since_last = now.saturating_duration_since(last);
            if since_last < state.delay {
                let wait = state.delay - since_last;
                tracing::trace!("Rate limiting: waiting {:.2}s", wait.as_secs_f64());
                sleep(wait).await;
            }
        }

        state.last_request = Some(Instant::now());
        state.burst_count += 1;
    }

    /// Current base delay
    pub async fn delay(&self) -> Duration {
        self.state.lock().await.delay
    }

    /// Replaces the base delay
    pub async fn set_delay(&self, delay: Duration) {
        self.state.lock().await.delay = delay;
    }

    /// Clears all timers and counters
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        state.last_request = None;
        state.burst_count = 0;
        state.burst_start = None;
    }
}
