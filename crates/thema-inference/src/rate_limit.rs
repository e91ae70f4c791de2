//! Rolling-window rate limiter shared by the inference backends (§4.C):
//! blocks the caller once more than `limit` calls have landed within the
//! trailing window, rather than rejecting the request outright.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::warn;

/// A sliding-window limiter over a fixed period (60s by default).
pub struct RollingWindowLimiter {
    window: Mutex<VecDeque<Instant>>,
    limit: u32,
    period: Duration,
}

impl RollingWindowLimiter {
    pub fn new(limit: u32) -> Self {
        Self::with_period(limit, Duration::from_secs(60))
    }

    pub fn with_period(limit: u32, period: Duration) -> Self {
        Self {
            window: Mutex::new(VecDeque::new()),
            limit,
            period,
        }
    }

    /// Blocks until a slot is free, then reserves it.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut window = self.window.lock().await;
                let now = Instant::now();
                while window
                    .front()
                    .is_some_and(|t| now.duration_since(*t) > self.period)
                {
                    window.pop_front();
                }
                if (window.len() as u32) < self.limit {
                    window.push_back(now);
                    None
                } else {
                    let oldest = *window.front().unwrap();
                    Some(self.period.saturating_sub(now.duration_since(oldest)))
                }
            };
            match wait {
                None => return,
                Some(d) => {
                    warn!(wait_ms = d.as_millis() as u64, "rate limit reached, waiting");
                    tokio::time::sleep(d).await;
                }
            }
        }
    }

    /// Current number of calls counted within the window (test hook).
    pub async fn current_count(&self) -> usize {
        self.window.lock().await.len()
    }
}
