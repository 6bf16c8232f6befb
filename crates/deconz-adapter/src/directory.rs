//! IEEE to network-address resolution

use dashmap::DashMap;

/// Resolves IEEE addresses to network short addresses.
///
/// Some firmware revisions deliver indications with only the 64-bit source
/// address; the inbound router uses this directory to recover the short
/// address before correlation.
pub trait DeviceDirectory: Send + Sync {
    /// Look up the short address for a wire-order IEEE address.
    fn short_address(&self, ieee: &[u8; 8]) -> Option<u16>;

    /// Record a fresh IEEE to short-address mapping.
    fn remember(&self, _ieee: [u8; 8], _network_address: u16) {}
}

/// In-memory directory fed by device announcements.
#[derive(Default)]
pub struct AddressBook {
    map: DashMap<[u8; 8], u16>,
}

impl AddressBook {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, ieee: [u8; 8], network_address: u16) {
        self.map.insert(ieee, network_address);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl DeviceDirectory for AddressBook {
    fn short_address(&self, ieee: &[u8; 8]) -> Option<u16> {
        self.map.get(ieee).map(|entry| *entry.value())
    }

    fn remember(&self, ieee: [u8; 8], network_address: u16) {
        self.insert(ieee, network_address);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_after_remember() {
        let book = AddressBook::new();
        let ieee = [1, 2, 3, 4, 5, 6, 7, 8];
        assert_eq!(book.short_address(&ieee), None);
        book.remember(ieee, 0x1234);
        assert_eq!(book.short_address(&ieee), Some(0x1234));
    }

    #[test]
    fn remember_updates_existing_entry() {
        let book = AddressBook::new();
        let ieee = [1, 2, 3, 4, 5, 6, 7, 8];
        book.remember(ieee, 0x1111);
        book.remember(ieee, 0x2222);
        assert_eq!(book.short_address(&ieee), Some(0x2222));
        assert_eq!(book.len(), 1);
    }
}
