//! Process-wide spacing of outbound model calls.
//!
//! The hosted service rate-limits per account, not per conversation, so a
//! single [`Throttle`] is shared by every session. Callers queue on one
//! async mutex; each waits until the minimum interval since the previous
//! call has elapsed, then stamps the new call time.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};
use tracing::trace;

/// Serializes outbound calls to at most one per `min_interval`.
#[derive(Debug)]
pub struct Throttle {
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl Throttle {
    /// Create a throttle with the given minimum spacing.
    #[must_use]
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    /// Minimum spacing between calls.
    #[must_use]
    pub const fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait for the gate to open and claim the next call slot.
    ///
    /// The lock is held while sleeping so that racing callers are released
    /// strictly one interval apart.
    pub async fn acquire(&self) {
        let mut last_call = self.last_call.lock().await;
        if let Some(previous) = *last_call {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                trace!(wait_ms = wait.as_millis(), "throttling model call");
                sleep(wait).await;
            }
        }
        *last_call = Some(Instant::now());
    }
}

impl Default for Throttle {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}
