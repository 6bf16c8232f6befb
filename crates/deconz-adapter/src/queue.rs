//! Bounded-concurrency submit queue

use std::future::Future;
use std::time::Duration;
use tokio::sync::Semaphore;

/// TX-options bit requesting an APS acknowledgement
pub const TX_OPTIONS_APS_ACK: u8 = 0x04;

/// Pacing delay at or above which APS ACKs are requested on every send
pub const APS_ACK_DELAY_THRESHOLD_MS: u64 = 200;

/// Throttles driver submissions: at most `concurrent` submissions are in
/// flight, waiters are admitted in FIFO order, and each admission is paced
/// by the configured delay.
pub struct SubmitQueue {
    permits: Semaphore,
    delay: Duration,
}

impl SubmitQueue {
    #[must_use]
    pub fn new(concurrent: usize, delay_ms: u64) -> Self {
        Self {
            permits: Semaphore::new(concurrent.max(1)),
            delay: Duration::from_millis(delay_ms),
        }
    }

    /// The default tx-options value for the given pacing delay.
    #[must_use]
    pub fn default_tx_options(delay_ms: u64) -> u8 {
        if delay_ms >= APS_ACK_DELAY_THRESHOLD_MS {
            TX_OPTIONS_APS_ACK
        } else {
            0x00
        }
    }

    /// Run a submission under the concurrency bound.
    pub async fn run<F, T>(&self, submit: F) -> T
    where
        F: Future<Output = T>,
    {
        let _permit = match self.permits.acquire().await {
            Ok(permit) => permit,
            // The semaphore is never closed; if it somehow is, run anyway.
            Err(_) => return submit.await,
        };
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        submit.await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn tx_options_follow_delay_threshold() {
        assert_eq!(SubmitQueue::default_tx_options(0), 0x00);
        assert_eq!(SubmitQueue::default_tx_options(199), 0x00);
        assert_eq!(SubmitQueue::default_tx_options(200), TX_OPTIONS_APS_ACK);
        assert_eq!(SubmitQueue::default_tx_options(1000), TX_OPTIONS_APS_ACK);
    }

    #[tokio::test(start_paused = true)]
    async fn bounds_concurrent_submissions() {
        let queue = Arc::new(SubmitQueue::new(2, 0));
        let active = Arc::new(AtomicUsize::new(0));
        let high_water = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let queue = queue.clone();
            let active = active.clone();
            let high_water = high_water.clone();
            handles.push(tokio::spawn(async move {
                queue
                    .run(async {
                        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                        high_water.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        active.fetch_sub(1, Ordering::SeqCst);
                    })
                    .await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(high_water.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn paces_submissions_by_delay() {
        let queue = SubmitQueue::new(1, 250);
        let started = tokio::time::Instant::now();
        queue.run(async {}).await;
        assert!(started.elapsed() >= Duration::from_millis(250));
    }
}
