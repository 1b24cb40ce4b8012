//! Bounded cursor polls

use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

/// Bounds how long a single cursor advance may block.
///
/// An elapsed poll drops the in-flight future and reports no row, so the
/// polled future must be cancel safe.
#[derive(Debug, Clone, Copy)]
pub struct PollGuard {
    timeout: Duration,
}

impl PollGuard {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// `None` if `poll` did not finish within the bound
    pub async fn poll<F: Future>(&self, poll: F) -> Option<F::Output> {
        timeout(self.timeout, poll).await.ok()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_ready_future_passes_through() {
        let guard = PollGuard::new(Duration::from_secs(1));
        assert_eq!(guard.poll(async { 7 }).await, Some(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_future_is_abandoned() {
        let guard = PollGuard::new(Duration::from_secs(1));
        let started = tokio::time::Instant::now();
        let result = guard.poll(std::future::pending::<u8>()).await;
        assert_eq!(result, None);
        assert_eq!(started.elapsed(), Duration::from_secs(1));
    }
}
