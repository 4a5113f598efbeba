//! Fixed inter-request delays.

use std::time::Duration;

use tracing::debug;

/// Delay between identity-resolution calls (username lookup, then profile/feed).
pub const IDENTITY_DELAY: Duration = Duration::from_millis(1500);
/// Delay between reels pages.
pub const REELS_DELAY: Duration = Duration::from_secs(2);
/// Delay between feed and video pages.
pub const PAGINATION_DELAY: Duration = Duration::from_secs(3);

/// Static throttle applied before every upstream call except the first of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateGovernor {
    delay: Duration,
}

impl RateGovernor {
    #[must_use]
    pub const fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// A governor that never waits.
    #[must_use]
    pub const fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    pub async fn wait_before_next_call(&self) {
        if self.delay.is_zero() {
            return;
        }
        debug!(
            delay_ms = self.delay.as_millis() as u64,
            "Throttling before next upstream call"
        );
        tokio::time::sleep(self.delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_configured_delay() {
        let governor = RateGovernor::new(PAGINATION_DELAY);
        let start = Instant::now();
        governor.wait_before_next_call().await;
        let elapsed = start.elapsed();
        assert!(elapsed >= PAGINATION_DELAY);
        assert!(elapsed < PAGINATION_DELAY + Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_does_not_wait() {
        let start = Instant::now();
        RateGovernor::disabled().wait_before_next_call().await;
        assert!(start.elapsed() < Duration::from_millis(1));
    }
}
