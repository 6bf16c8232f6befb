//! Table of in-flight requests awaiting a correlated data indication

use crate::error::AdapterError;
use deconz_driver::ReceivedDataResponse;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use tokio::time::Instant;

/// Wait window applied when the caller does not specify one
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(60);

struct Entry {
    addr16: u16,
    profile_id: u16,
    cluster_id: u16,
    tsn: Option<u8>,
    deadline: Instant,
    tx: oneshot::Sender<Result<ReceivedDataResponse, AdapterError>>,
}

impl Entry {
    fn matches(&self, response: &ReceivedDataResponse, src: u16, header_tsn: Option<u8>) -> bool {
        self.addr16 == src
            && self.profile_id == response.profile_id
            && self.cluster_id == response.cluster_id
            && (self.tsn.is_none() || self.tsn == header_tsn)
    }
}

/// Pending-request table.
///
/// Entries are resolved by the inbound router on a matching indication and
/// expired by the 1 Hz sweeper; there is no explicit cancel. A linear scan
/// in insertion order is fine at the expected in-flight sizes.
#[derive(Default)]
pub struct PendingRequests {
    entries: Mutex<Vec<Entry>>,
}

impl PendingRequests {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest in the next indication matching the key. The entry
    /// must be registered *before* the request is submitted so the reply
    /// cannot race the registration.
    pub async fn register(
        &self,
        addr16: u16,
        profile_id: u16,
        cluster_id: u16,
        tsn: Option<u8>,
        timeout: Option<Duration>,
    ) -> oneshot::Receiver<Result<ReceivedDataResponse, AdapterError>> {
        let timeout = timeout.unwrap_or(DEFAULT_WAIT_TIMEOUT);
        let (tx, rx) = oneshot::channel();
        let mut entries = self.entries.lock().await;
        entries.push(Entry {
            addr16,
            profile_id,
            cluster_id,
            tsn,
            deadline: Instant::now() + timeout,
            tx,
        });
        rx
    }

    /// Offer an indication. The first matching entry (insertion order) is
    /// resolved with the response and removed. Returns whether an entry
    /// consumed the indication.
    pub async fn resolve(
        &self,
        response: &ReceivedDataResponse,
        header_tsn: Option<u8>,
    ) -> bool {
        let Some(src) = response.src_addr16 else {
            return false;
        };

        let mut entries = self.entries.lock().await;
        if let Some(pos) = entries
            .iter()
            .position(|entry| entry.matches(response, src, header_tsn))
        {
            let entry = entries.remove(pos);
            let _ = entry.tx.send(Ok(response.clone()));
            true
        } else {
            false
        }
    }

    /// Expire entries whose deadline has passed. Returns how many expired.
    pub async fn sweep(&self, now: Instant) -> usize {
        let mut entries = self.entries.lock().await;
        let mut expired = 0;
        let mut i = 0;
        while i < entries.len() {
            if entries[i].deadline <= now {
                let entry = entries.remove(i);
                let _ = entry.tx.send(Err(AdapterError::ResponseTimeout));
                expired += 1;
            } else {
                i += 1;
            }
        }
        expired
    }

    /// Number of in-flight entries
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}
