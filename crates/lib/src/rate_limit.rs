//! # Call-Rate Governor
//!
//! A sliding-window limiter for calls to an external API. Each instance owns the
//! timestamps of its own past calls; one instance is meant to govern one
//! credential. Callers `acquire()` before each call and are suspended until the
//! call fits the configured budget.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::debug;

/// The default window used by [`RateLimiter::per_minute`].
pub const ONE_MINUTE: Duration = Duration::from_secs(60);

#[derive(Debug)]
pub struct RateLimiter {
    max_calls: usize,
    window: Duration,
    history: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Creates a limiter allowing at most `max_calls` calls per `window`.
    ///
    /// A budget of zero is treated as one call per window.
    pub fn new(max_calls: u32, window: Duration) -> Self {
        Self {
            max_calls: max_calls.max(1) as usize,
            window,
            history: Mutex::new(VecDeque::new()),
        }
    }

    /// Creates a limiter allowing at most `max_calls` calls per minute.
    pub fn per_minute(max_calls: u32) -> Self {
        Self::new(max_calls, ONE_MINUTE)
    }

    pub fn max_calls(&self) -> usize {
        self.max_calls
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Waits until another call is allowed, then records it.
    ///
    /// Once the window is full, the caller waits for the evenly spaced interval
    /// (`window / max_calls`) since the most recent call, and never less than the
    /// time it takes for the oldest retained call to leave the window. The lock
    /// is held while waiting, so tasks sharing a limiter are served in turn.
    pub async fn acquire(&self) {
        let mut history = self.history.lock().await;
        let now = Instant::now();
        self.prune(&mut history, now);

        if history.len() >= self.max_calls {
            let wait = self.required_wait(&history, now);
            if !wait.is_zero() {
                debug!(
                    wait_ms = wait.as_millis() as u64,
                    recent_calls = history.len(),
                    "Rate limit reached, suspending caller"
                );
                sleep(wait).await;
            }
            self.prune(&mut history, Instant::now());
        }

        history.push_back(Instant::now());
    }

    /// The number of calls recorded within the current window.
    pub async fn recent_calls(&self) -> usize {
        let mut history = self.history.lock().await;
        self.prune(&mut history, Instant::now());
        history.len()
    }

    fn prune(&self, history: &mut VecDeque<Instant>, now: Instant) {
        while let Some(oldest) = history.front() {
            if now.saturating_duration_since(*oldest) >= self.window {
                history.pop_front();
            } else {
                break;
            }
        }
    }

    fn required_wait(&self, history: &VecDeque<Instant>, now: Instant) -> Duration {
        let spacing = self.window / self.max_calls as u32;
        let since_last = history
            .back()
            .map(|last| now.saturating_duration_since(*last))
            .unwrap_or(spacing);
        let spaced = spacing.saturating_sub(since_last);

        // The oldest call still inside the window bounds how soon a slot frees up.
        let expiry = history
            .get(history.len() - self.max_calls)
            .map(|oldest| (*oldest + self.window).saturating_duration_since(now))
            .unwrap_or_default();

        spaced.max(expiry)
    }
}
