//! Minimum inter-request spacing per platform.
//!
//! Each adapter owns one [`RequestGate`]; every outbound call waits its turn
//! before hitting the platform. The gate serializes callers, so a burst of
//! concurrent jobs against one platform drains at the configured spacing.
//! State is in-memory only and resets on restart.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// A simple spacing gate: consecutive `wait_turn` calls are at least
/// `min_spacing` apart.
pub struct RequestGate {
    min_spacing: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RequestGate {
    #[must_use]
    pub fn new(min_spacing_ms: u64) -> Self {
        Self {
            min_spacing: Duration::from_millis(min_spacing_ms),
            last_request: Mutex::new(None),
        }
    }

    /// Waits until at least `min_spacing` has elapsed since the previous
    /// caller's turn, then records this one.
    pub async fn wait_turn(&self) {
        if self.min_spacing.is_zero() {
            return;
        }
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let ready_at = previous + self.min_spacing;
            let now = Instant::now();
            if ready_at > now {
                tokio::time::sleep(ready_at - now).await;
            }
        }
        *last = Some(Instant::now());
    }
}
