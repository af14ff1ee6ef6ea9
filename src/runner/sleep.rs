//! Injectable sleeping for retry backoff.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

/// Waits out a backoff delay.
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Sleep for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Real timer backed by `tokio::time::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Returns immediately and remembers every requested delay.
#[derive(Debug, Default, Clone)]
pub struct InstantSleeper {
    requested: Arc<Mutex<Vec<Duration>>>,
}

impl InstantSleeper {
    /// Create a new instant sleeper.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays requested so far, in order.
    pub fn requested(&self) -> Vec<Duration> {
        self.requested
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl Sleeper for InstantSleeper {
    async fn sleep(&self, duration: Duration) {
        self.requested
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn instant_sleeper_records_delays() {
        let sleeper = InstantSleeper::new();
        sleeper.sleep(Duration::from_millis(100)).await;
        sleeper.sleep(Duration::from_millis(200)).await;
        assert_eq!(
            sleeper.requested(),
            vec![Duration::from_millis(100), Duration::from_millis(200)]
        );
    }

    #[tokio::test]
    async fn tokio_sleeper_zero_returns() {
        TokioSleeper.sleep(Duration::ZERO).await;
    }
}
