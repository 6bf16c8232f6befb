//! Events the adapter surfaces to its consumer

use crate::zcl::ZclHeader;

/// Source address of a ZCL payload: short network address, or the
/// formatted IEEE address when the radio delivered an extended-addressed
/// frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadAddress {
    Nwk(u16),
    Ieee(String),
}

impl std::fmt::Display for PayloadAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PayloadAddress::Nwk(addr) => write!(f, "{addr:#06x}"),
            PayloadAddress::Ieee(addr) => write!(f, "{addr}"),
        }
    }
}

/// An application-layer payload received from the network
#[derive(Debug, Clone)]
pub struct ZclPayload {
    pub address: PayloadAddress,
    /// Full ASDU bytes, header included
    pub data: Vec<u8>,
    pub cluster_id: u16,
    /// Parsed ZCL header, when the ASDU starts with one
    pub header: Option<ZclHeader>,
    /// Source endpoint
    pub endpoint: u8,
    pub linkquality: u8,
    pub group_id: u16,
    pub was_broadcast: bool,
    pub destination_endpoint: u8,
}

/// Adapter events
#[derive(Debug, Clone)]
pub enum Event {
    /// A device joined while joining was permitted
    DeviceJoined {
        network_address: u16,
        ieee_addr: String,
    },
    /// A device announced itself outside a permit-join window
    DeviceAnnounce {
        network_address: u16,
        ieee_addr: String,
    },
    /// A device was removed from the network
    DeviceLeave {
        network_address: u16,
        ieee_addr: String,
    },
    /// An application-layer payload arrived
    ZclPayload(ZclPayload),
}
