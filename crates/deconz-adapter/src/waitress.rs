//! One-shot matcher for callers awaiting arbitrary ZCL payloads
//!
//! Independent of the pending-request table: the dispatcher correlates ZDP
//! replies by cluster alone, while `wait_for` callers need multi-field
//! header matching. The two matchers stay separate.

use crate::error::AdapterError;
use crate::events::{PayloadAddress, ZclPayload};
use crate::zcl::{Direction, FrameType};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use tokio::time::Instant;

/// Match criteria for a waiting future
#[derive(Debug, Clone)]
pub struct ZclMatcher {
    /// Source address; `None` matches any sender
    pub address: Option<PayloadAddress>,
    pub endpoint: u8,
    /// Transaction sequence number; `None` skips the check
    pub tsn: Option<u8>,
    pub frame_type: FrameType,
    pub cluster_id: u16,
    pub command_id: u8,
    pub direction: Direction,
}

impl ZclMatcher {
    fn matches(&self, payload: &ZclPayload) -> bool {
        let Some(header) = &payload.header else {
            return false;
        };
        (self.address.is_none() || self.address.as_ref() == Some(&payload.address))
            && self.endpoint == payload.endpoint
            && (self.tsn.is_none() || self.tsn == Some(header.transaction_sequence_number))
            && self.frame_type == header.frame_control.frame_type
            && self.cluster_id == payload.cluster_id
            && self.command_id == header.command_id
            && self.direction == header.frame_control.direction
    }
}

impl std::fmt::Display for ZclMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let address = self
            .address
            .as_ref()
            .map_or_else(|| "*".to_string(), ToString::to_string);
        let tsn = self
            .tsn
            .map_or_else(|| "*".to_string(), |tsn| tsn.to_string());
        write!(
            f,
            "{} - {} - {} - {:#06x} - {}",
            address, self.endpoint, tsn, self.cluster_id, self.command_id
        )
    }
}

struct Waiter {
    id: u64,
    matcher: ZclMatcher,
    deadline: Instant,
    tx: oneshot::Sender<ZclPayload>,
}

/// Fan-out point for ZCL payloads awaited outside the send path.
///
/// The first matching waiter (insertion order) wins a payload; every
/// payload is still forwarded to the event stream afterwards.
#[derive(Default)]
pub struct Waitress {
    next_id: AtomicU64,
    waiters: Mutex<Vec<Waiter>>,
}

impl Waitress {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a waiter. The returned handle resolves with the first
    /// matching payload, errs after `timeout`, and can be cancelled.
    pub async fn wait_for(self: Arc<Self>, matcher: ZclMatcher, timeout: Duration) -> WaitFor {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        let description = format!("{matcher} after {}ms", timeout.as_millis());

        {
            let mut waiters = self.waiters.lock().await;
            waiters.push(Waiter {
                id,
                matcher,
                deadline: Instant::now() + timeout,
                tx,
            });
        }

        WaitFor {
            id,
            waitress: self,
            rx,
            description,
        }
    }

    /// Offer a payload. Resolves and removes the first matching waiter.
    /// Returns whether a waiter consumed it.
    pub async fn resolve(&self, payload: &ZclPayload) -> bool {
        let mut waiters = self.waiters.lock().await;
        if let Some(pos) = waiters.iter().position(|w| w.matcher.matches(payload)) {
            let waiter = waiters.remove(pos);
            let _ = waiter.tx.send(payload.clone());
            true
        } else {
            false
        }
    }

    /// Drop waiters whose deadline has passed; their futures err.
    pub async fn sweep(&self, now: Instant) -> usize {
        let mut waiters = self.waiters.lock().await;
        let before = waiters.len();
        waiters.retain(|w| w.deadline > now);
        before - waiters.len()
    }

    async fn remove(&self, id: u64) {
        let mut waiters = self.waiters.lock().await;
        waiters.retain(|w| w.id != id);
    }

    pub async fn len(&self) -> usize {
        self.waiters.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.waiters.lock().await.is_empty()
    }
}

/// Handle to a registered waiter
pub struct WaitFor {
    id: u64,
    waitress: Arc<Waitress>,
    rx: oneshot::Receiver<ZclPayload>,
    description: String,
}

impl WaitFor {
    /// Remove the waiter without resolving it.
    pub async fn cancel(self) {
        self.waitress.remove(self.id).await;
    }

    /// Await the matching payload.
    pub async fn wait(self) -> Result<ZclPayload, AdapterError> {
        match self.rx.await {
            Ok(payload) => Ok(payload),
            Err(_) => Err(AdapterError::WaitTimeout(self.description)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zcl::{FrameControl, ZclHeader};

    fn payload(address: u16, endpoint: u8, cluster_id: u16, tsn: u8, command_id: u8) -> ZclPayload {
        let header = ZclHeader {
            frame_control: FrameControl {
                frame_type: FrameType::ClusterSpecific,
                manufacturer_specific: false,
                direction: Direction::ServerToClient,
                disable_default_response: false,
            },
            manufacturer_code: None,
            transaction_sequence_number: tsn,
            command_id,
        };
        let data = header.serialize();
        ZclPayload {
            address: PayloadAddress::Nwk(address),
            data,
            cluster_id,
            header: Some(header),
            endpoint,
            linkquality: 255,
            group_id: 0,
            was_broadcast: false,
            destination_endpoint: 1,
        }
    }

    fn matcher(address: Option<u16>, endpoint: u8, cluster_id: u16, tsn: Option<u8>) -> ZclMatcher {
        ZclMatcher {
            address: address.map(PayloadAddress::Nwk),
            endpoint,
            tsn,
            frame_type: FrameType::ClusterSpecific,
            cluster_id,
            command_id: 0x01,
            direction: Direction::ServerToClient,
        }
    }

    #[tokio::test]
    async fn resolves_matching_waiter() {
        let waitress = Arc::new(Waitress::new());
        let wait = waitress
            .clone()
            .wait_for(
                matcher(Some(0x1234), 1, 0x0006, Some(9)),
                Duration::from_secs(10),
            )
            .await;

        assert!(!waitress.resolve(&payload(0x1234, 1, 0x0006, 8, 0x01)).await);
        assert!(!waitress.resolve(&payload(0x1234, 2, 0x0006, 9, 0x01)).await);
        assert!(waitress.resolve(&payload(0x1234, 1, 0x0006, 9, 0x01)).await);

        let resolved = wait.wait().await.unwrap();
        assert_eq!(resolved.cluster_id, 0x0006);
        assert!(waitress.is_empty().await);
    }

    #[tokio::test]
    async fn wildcard_address_and_tsn() {
        let waitress = Arc::new(Waitress::new());
        let wait = waitress
            .clone()
            .wait_for(matcher(None, 1, 0x0006, None), Duration::from_secs(10))
            .await;
        assert!(waitress.resolve(&payload(0xABCD, 1, 0x0006, 77, 0x01)).await);
        assert!(wait.wait().await.is_ok());
    }

    #[tokio::test]
    async fn headerless_payload_never_matches() {
        let waitress = Arc::new(Waitress::new());
        let _wait = waitress
            .clone()
            .wait_for(matcher(None, 1, 0x0006, None), Duration::from_secs(10))
            .await;
        let mut p = payload(0x1234, 1, 0x0006, 1, 0x01);
        p.header = None;
        assert!(!waitress.resolve(&p).await);
    }

    #[tokio::test]
    async fn first_waiter_in_insertion_order_wins() {
        let waitress = Arc::new(Waitress::new());
        let first = waitress
            .clone()
            .wait_for(matcher(None, 1, 0x0006, None), Duration::from_secs(10))
            .await;
        let second = waitress
            .clone()
            .wait_for(matcher(None, 1, 0x0006, None), Duration::from_secs(10))
            .await;

        waitress.resolve(&payload(0x1234, 1, 0x0006, 1, 0x01)).await;
        assert!(first.wait().await.is_ok());
        assert_eq!(waitress.len().await, 1);
        second.cancel().await;
        assert!(waitress.is_empty().await);
    }

    #[tokio::test]
    async fn cancel_removes_waiter() {
        let waitress = Arc::new(Waitress::new());
        let wait = waitress
            .clone()
            .wait_for(matcher(Some(0x1234), 1, 0x0006, None), Duration::from_secs(10))
            .await;
        wait.cancel().await;
        assert!(!waitress.resolve(&payload(0x1234, 1, 0x0006, 1, 0x01)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_expires_waiters() {
        let waitress = Arc::new(Waitress::new());
        let wait = waitress
            .clone()
            .wait_for(matcher(None, 1, 0x0006, Some(3)), Duration::from_millis(500))
            .await;

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(waitress.sweep(Instant::now()).await, 1);

        let err = wait.wait().await.unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("Timeout - "), "{message}");
        assert!(message.contains("after 500ms"), "{message}");
    }
}
