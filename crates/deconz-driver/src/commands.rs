//! deCONZ serial protocol command and parameter identifiers

/// Command IDs for the deCONZ serial protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandId {
    /// APS data confirm (transmit status of a prior request)
    ApsDataConfirm = 0x04,
    /// Query device state
    DeviceState = 0x07,
    /// Change network state (offline/connected)
    ChangeNetworkState = 0x08,
    /// Read network parameter
    ReadParameter = 0x0A,
    /// Write network parameter
    WriteParameter = 0x0B,
    /// Query firmware version
    Version = 0x0D,
    /// Device state changed notification
    DeviceStateChanged = 0x0E,
    /// Send APS data request
    ApsDataRequest = 0x12,
    /// APS data indication (incoming data)
    ApsDataIndication = 0x17,
    /// Green Power data indication
    GreenPower = 0x19,
    /// MAC poll indication
    MacPoll = 0x1C,
    /// MAC beacon indication
    MacBeaconIndication = 0x1F,
}

impl CommandId {
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x04 => Some(CommandId::ApsDataConfirm),
            0x07 => Some(CommandId::DeviceState),
            0x08 => Some(CommandId::ChangeNetworkState),
            0x0A => Some(CommandId::ReadParameter),
            0x0B => Some(CommandId::WriteParameter),
            0x0D => Some(CommandId::Version),
            0x0E => Some(CommandId::DeviceStateChanged),
            0x12 => Some(CommandId::ApsDataRequest),
            0x17 => Some(CommandId::ApsDataIndication),
            0x19 => Some(CommandId::GreenPower),
            0x1C => Some(CommandId::MacPoll),
            0x1F => Some(CommandId::MacBeaconIndication),
            _ => None,
        }
    }
}

/// Network parameters that can be read/written on the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Parameter {
    /// MAC address (IEEE address, 8 bytes)
    MacAddress = 0x01,
    /// Network PAN ID (2 bytes)
    NwkPanId = 0x05,
    /// Network short address (2 bytes)
    NwkAddress = 0x07,
    /// Network extended PAN ID (8 bytes)
    NwkExtendedPanId = 0x08,
    /// Coordinator flag (1 byte)
    ApsDesignedCoordinator = 0x09,
    /// Channel mask (4 bytes)
    ChannelMask = 0x0A,
    /// APS extended PAN ID (8 bytes)
    ApsExtendedPanId = 0x0B,
    /// Trust center address (8 bytes)
    TrustCenterAddress = 0x0E,
    /// Security mode (1 byte)
    SecurityMode = 0x10,
    /// Stack endpoint descriptor (variable)
    Endpoint = 0x13,
    /// Predefined network PAN ID (1 byte, bool)
    PredefinedNwkPanId = 0x15,
    /// Network key (16 bytes)
    NetworkKey = 0x18,
    /// Link key (16 bytes)
    LinkKey = 0x19,
    /// Current operating channel (1 byte)
    CurrentChannel = 0x1C,
    /// Permit join duration (1 byte)
    PermitJoin = 0x21,
    /// Protocol version (2 bytes)
    ProtocolVersion = 0x22,
    /// Network update ID (1 byte)
    NwkUpdateId = 0x24,
    /// Watchdog TTL in seconds (4 bytes)
    WatchdogTtl = 0x26,
}

impl Parameter {
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Parameter::MacAddress),
            0x05 => Some(Parameter::NwkPanId),
            0x07 => Some(Parameter::NwkAddress),
            0x08 => Some(Parameter::NwkExtendedPanId),
            0x09 => Some(Parameter::ApsDesignedCoordinator),
            0x0A => Some(Parameter::ChannelMask),
            0x0B => Some(Parameter::ApsExtendedPanId),
            0x0E => Some(Parameter::TrustCenterAddress),
            0x10 => Some(Parameter::SecurityMode),
            0x13 => Some(Parameter::Endpoint),
            0x15 => Some(Parameter::PredefinedNwkPanId),
            0x18 => Some(Parameter::NetworkKey),
            0x19 => Some(Parameter::LinkKey),
            0x1C => Some(Parameter::CurrentChannel),
            0x21 => Some(Parameter::PermitJoin),
            0x22 => Some(Parameter::ProtocolVersion),
            0x24 => Some(Parameter::NwkUpdateId),
            0x26 => Some(Parameter::WatchdogTtl),
            _ => None,
        }
    }
}

/// Network state change targets for `ChangeNetworkState`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NetworkStateCommand {
    /// Bring the network offline
    Offline = 0x00,
    /// Start the network / connect
    Connected = 0x02,
}
