//! Wire types shared between the serial driver and its consumers

use thiserror::Error;

/// Driver errors
#[derive(Error, Debug)]
pub enum DriverError {
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("CRC mismatch: expected {expected:04X}, got {actual:04X}")]
    CrcMismatch { expected: u16, actual: u16 },

    #[error("Frame too short: {0} bytes")]
    FrameTooShort(usize),

    #[error("Unknown command ID: {0:#04X}")]
    UnknownCommand(u8),

    #[error("Serial port error: {0}")]
    SerialError(#[from] std::io::Error),

    #[error("Request timeout")]
    Timeout,

    #[error("Driver not connected")]
    NotConnected,

    #[error("Device returned error status: {0:?}")]
    DeviceError(Status),
}

/// Device status codes from deCONZ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    Success = 0x00,
    Failure = 0x01,
    Busy = 0x02,
    Timeout = 0x03,
    Unsupported = 0x04,
    Error = 0x05,
    NoNetwork = 0x06,
    InvalidValue = 0x07,
}

impl TryFrom<u8> for Status {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        match value {
            0x00 => Ok(Status::Success),
            0x01 => Ok(Status::Failure),
            0x02 => Ok(Status::Busy),
            0x03 => Ok(Status::Timeout),
            0x04 => Ok(Status::Unsupported),
            0x05 => Ok(Status::Error),
            0x06 => Ok(Status::NoNetwork),
            0x07 => Ok(Status::InvalidValue),
            _ => Err(value),
        }
    }
}

/// Device state flags carried in state-changed notifications
#[derive(Debug, Clone, Copy)]
pub struct DeviceState {
    pub network_state: NetworkState,
    pub aps_data_confirm: bool,
    pub aps_data_indication: bool,
    pub configuration_changed: bool,
    pub aps_request_free_slots: bool,
}

impl DeviceState {
    #[must_use]
    pub fn from_byte(byte: u8) -> Self {
        Self {
            network_state: NetworkState::from_bits(byte & 0x03),
            aps_data_confirm: (byte & 0x04) != 0,
            aps_data_indication: (byte & 0x08) != 0,
            configuration_changed: (byte & 0x10) != 0,
            aps_request_free_slots: (byte & 0x20) != 0,
        }
    }
}

/// Network state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkState {
    Offline = 0,
    Joining = 1,
    Connected = 2,
    Leaving = 3,
}

impl NetworkState {
    #[must_use]
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => NetworkState::Offline,
            1 => NetworkState::Joining,
            2 => NetworkState::Connected,
            3 => NetworkState::Leaving,
            _ => unreachable!(),
        }
    }
}

/// Hardware family, decoded from byte 1 of the firmware version word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// ConBee / RaspBee (family 5)
    ConBee,
    /// ConBee II / RaspBee II (family 7)
    ConBee2,
    /// Anything newer reports as ConBee III
    ConBee3,
}

impl From<u8> for Platform {
    fn from(value: u8) -> Self {
        match value {
            0x05 => Platform::ConBee,
            0x07 => Platform::ConBee2,
            _ => Platform::ConBee3,
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::ConBee => write!(f, "ConBee/RaspBee"),
            Platform::ConBee2 => write!(f, "ConBee2/RaspBee2"),
            Platform::ConBee3 => write!(f, "ConBee3"),
        }
    }
}

/// Firmware version information
///
/// The device reports a little-endian u32: byte 1 is the hardware family,
/// bytes 2 and 3 the minor and major firmware version.
#[derive(Debug, Clone, Copy)]
pub struct FirmwareVersion {
    pub revision: u32,
    pub major: u8,
    pub minor: u8,
    pub platform: Platform,
}

impl FirmwareVersion {
    #[must_use]
    pub fn from_u32(raw: u32) -> Self {
        let bytes = raw.to_le_bytes();
        Self {
            revision: raw,
            major: bytes[3],
            minor: bytes[2],
            platform: Platform::from(bytes[1]),
        }
    }
}

impl std::fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{} ({})", self.major, self.minor, self.platform)
    }
}

/// Address mode for APS frames
///
/// `Broadcast` exists only in the host API; on the wire broadcasts are
/// NWK-addressed frames carrying a broadcast short address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AddressMode {
    Group = 0x01,
    Nwk = 0x02,
    Ieee = 0x03,
    NwkAndIeee = 0x04,
    Broadcast = 0x0F,
}

impl TryFrom<u8> for AddressMode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        match value {
            0x01 => Ok(AddressMode::Group),
            0x02 => Ok(AddressMode::Nwk),
            0x03 => Ok(AddressMode::Ieee),
            0x04 => Ok(AddressMode::NwkAndIeee),
            0x0F => Ok(AddressMode::Broadcast),
            _ => Err(value),
        }
    }
}

/// NWK hop budget for unicast requests
pub const DEFAULT_RADIUS: u8 = 30;
/// Hop budget for group and broadcast sends: the stack floods network-wide
pub const UNLIMITED_RADIUS: u8 = 0;

/// An outbound APS data request.
#[derive(Debug, Clone)]
pub struct ApsDataRequest {
    pub request_id: u8,
    pub dest_addr_mode: AddressMode,
    pub dest_addr16: Option<u16>,
    pub dest_addr64: Option<[u8; 8]>,
    pub dest_endpoint: Option<u8>,
    pub profile_id: u16,
    pub cluster_id: u16,
    pub src_endpoint: u8,
    pub asdu: Vec<u8>,
    pub tx_options: u8,
    pub radius: u8,
    /// Seconds the driver keeps the request alive waiting for the confirm
    pub timeout_secs: u16,
}

impl ApsDataRequest {
    /// Serialize into the `ApsDataRequest` command payload.
    pub fn serialize(&self) -> Result<Vec<u8>, DriverError> {
        let mut data = Vec::with_capacity(20 + self.asdu.len());

        // Payload length placeholder, filled in at the end
        data.extend_from_slice(&0u16.to_le_bytes());

        data.push(self.request_id);
        data.push(0x00); // flags

        match self.dest_addr_mode {
            AddressMode::Group => {
                let addr = self.dest_addr16.ok_or_else(|| {
                    DriverError::InvalidRequest("group request without group address".into())
                })?;
                data.push(AddressMode::Group as u8);
                data.extend_from_slice(&addr.to_le_bytes());
                // Group frames carry no destination endpoint
            }
            AddressMode::Nwk | AddressMode::Broadcast => {
                let addr = self.dest_addr16.ok_or_else(|| {
                    DriverError::InvalidRequest("nwk request without short address".into())
                })?;
                data.push(AddressMode::Nwk as u8);
                data.extend_from_slice(&addr.to_le_bytes());
                data.push(self.dest_endpoint.ok_or_else(|| {
                    DriverError::InvalidRequest("nwk request without destination endpoint".into())
                })?);
            }
            AddressMode::Ieee => {
                let addr = self.dest_addr64.ok_or_else(|| {
                    DriverError::InvalidRequest("ieee request without extended address".into())
                })?;
                data.push(AddressMode::Ieee as u8);
                data.extend_from_slice(&addr);
                data.push(self.dest_endpoint.ok_or_else(|| {
                    DriverError::InvalidRequest("ieee request without destination endpoint".into())
                })?);
            }
            AddressMode::NwkAndIeee => {
                return Err(DriverError::InvalidRequest(
                    "combined addressing is only valid on receive".into(),
                ));
            }
        }

        data.extend_from_slice(&self.profile_id.to_le_bytes());
        data.extend_from_slice(&self.cluster_id.to_le_bytes());
        data.push(self.src_endpoint);

        let asdu_len = u16::try_from(self.asdu.len())
            .map_err(|_| DriverError::InvalidRequest("ASDU exceeds 64 KiB".into()))?;
        data.extend_from_slice(&asdu_len.to_le_bytes());
        data.extend_from_slice(&self.asdu);

        data.push(self.tx_options);
        data.push(self.radius);

        let payload_len = (data.len() - 2) as u16;
        data[0..2].copy_from_slice(&payload_len.to_le_bytes());

        Ok(data)
    }
}

/// A parsed inbound APS data indication.
#[derive(Debug, Clone)]
pub struct ReceivedDataResponse {
    pub device_state: DeviceState,
    pub dest_addr_mode: AddressMode,
    pub dest_addr16: Option<u16>,
    pub dest_endpoint: u8,
    pub src_addr_mode: AddressMode,
    pub src_addr16: Option<u16>,
    pub src_addr64: Option<[u8; 8]>,
    pub src_endpoint: u8,
    pub profile_id: u16,
    pub cluster_id: u16,
    pub asdu: Vec<u8>,
    pub lqi: u8,
    pub rssi: i8,
}

impl ReceivedDataResponse {
    /// Parse an APS data indication command payload.
    pub fn parse(data: &[u8]) -> Result<Self, DriverError> {
        if data.len() < 15 {
            return Err(DriverError::FrameTooShort(data.len()));
        }

        let mut idx = 0;

        let _payload_len = u16::from_le_bytes([data[idx], data[idx + 1]]);
        idx += 2;

        let device_state = DeviceState::from_byte(data[idx]);
        idx += 1;

        let dest_addr_mode = AddressMode::try_from(data[idx])
            .map_err(|v| DriverError::InvalidFrame(format!("unknown dest addr mode: {v}")))?;
        idx += 1;

        let dest_addr16 = match dest_addr_mode {
            AddressMode::Nwk | AddressMode::Group | AddressMode::Broadcast => {
                let addr = u16::from_le_bytes([data[idx], data[idx + 1]]);
                idx += 2;
                Some(addr)
            }
            AddressMode::Ieee => {
                idx += 8;
                None
            }
            AddressMode::NwkAndIeee => {
                let addr = u16::from_le_bytes([data[idx], data[idx + 1]]);
                idx += 10;
                Some(addr)
            }
        };

        if idx >= data.len() {
            return Err(DriverError::FrameTooShort(data.len()));
        }
        let dest_endpoint = data[idx];
        idx += 1;

        let src_addr_mode = AddressMode::try_from(data[idx])
            .map_err(|v| DriverError::InvalidFrame(format!("unknown src addr mode: {v}")))?;
        idx += 1;

        let (src_addr16, src_addr64) = match src_addr_mode {
            AddressMode::Nwk | AddressMode::Group | AddressMode::Broadcast => {
                let addr = u16::from_le_bytes([data[idx], data[idx + 1]]);
                idx += 2;
                (Some(addr), None)
            }
            AddressMode::Ieee => {
                let mut ieee = [0u8; 8];
                ieee.copy_from_slice(&data[idx..idx + 8]);
                idx += 8;
                (None, Some(ieee))
            }
            AddressMode::NwkAndIeee => {
                let short = u16::from_le_bytes([data[idx], data[idx + 1]]);
                idx += 2;
                let mut ieee = [0u8; 8];
                ieee.copy_from_slice(&data[idx..idx + 8]);
                idx += 8;
                (Some(short), Some(ieee))
            }
        };

        if idx + 7 > data.len() {
            return Err(DriverError::FrameTooShort(data.len()));
        }

        let src_endpoint = data[idx];
        idx += 1;

        let profile_id = u16::from_le_bytes([data[idx], data[idx + 1]]);
        idx += 2;
        let cluster_id = u16::from_le_bytes([data[idx], data[idx + 1]]);
        idx += 2;

        let asdu_len = u16::from_le_bytes([data[idx], data[idx + 1]]) as usize;
        idx += 2;

        if idx + asdu_len > data.len() {
            return Err(DriverError::FrameTooShort(data.len()));
        }

        let asdu = data[idx..idx + asdu_len].to_vec();
        idx += asdu_len;

        // LQI and RSSI are absent on some firmware revisions
        let lqi = if idx < data.len() { data[idx] } else { 0 };
        let rssi = if idx + 1 < data.len() {
            data[idx + 1] as i8
        } else {
            0
        };

        Ok(Self {
            device_state,
            dest_addr_mode,
            dest_addr16,
            dest_endpoint,
            src_addr_mode,
            src_addr16,
            src_addr64,
            src_endpoint,
            profile_id,
            cluster_id,
            asdu,
            lqi,
            rssi,
        })
    }
}

/// A Green-Power data indication from the radio.
///
/// Payload layout after the command frame header:
/// `seqNr(1) id(1) options(2 LE) srcId(4 LE) frameCounter(4 LE)
///  commandId(1) commandFrameSize(1) commandFrame(N)`
#[derive(Debug, Clone)]
pub struct GpDataInd {
    pub seq_nr: u8,
    pub id: u8,
    pub options: u16,
    pub src_id: u32,
    pub frame_counter: u32,
    pub command_id: u8,
    pub command_frame_size: u8,
    pub command_frame: Vec<u8>,
}

impl GpDataInd {
    pub fn parse(data: &[u8]) -> Result<Self, DriverError> {
        if data.len() < 14 {
            return Err(DriverError::FrameTooShort(data.len()));
        }

        let seq_nr = data[0];
        let id = data[1];
        let options = u16::from_le_bytes([data[2], data[3]]);
        let src_id = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
        let frame_counter = u32::from_le_bytes([data[8], data[9], data[10], data[11]]);
        let command_id = data[12];
        let command_frame_size = data[13];

        let end = 14 + command_frame_size as usize;
        if end > data.len() {
            return Err(DriverError::FrameTooShort(data.len()));
        }
        let command_frame = data[14..end].to_vec();

        Ok(Self {
            seq_nr,
            id,
            options,
            src_id,
            frame_counter,
            command_id,
            command_frame_size,
            command_frame,
        })
    }

    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(14 + self.command_frame.len());
        data.push(self.seq_nr);
        data.push(self.id);
        data.extend_from_slice(&self.options.to_le_bytes());
        data.extend_from_slice(&self.src_id.to_le_bytes());
        data.extend_from_slice(&self.frame_counter.to_le_bytes());
        data.push(self.command_id);
        data.push(self.command_frame_size);
        data.extend_from_slice(&self.command_frame);
        data
    }
}

/// Parse a `0x`-prefixed MAC address string into wire byte order.
pub fn mac_addr_string_to_array(address: &str) -> Result<[u8; 8], DriverError> {
    let hex = address.strip_prefix("0x").unwrap_or(address);
    if hex.len() != 16 || !hex.is_ascii() {
        return Err(DriverError::InvalidAddress(address.to_string()));
    }

    let mut out = [0u8; 8];
    for (i, slot) in out.iter_mut().enumerate() {
        *slot = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
            .map_err(|_| DriverError::InvalidAddress(address.to_string()))?;
    }
    out.reverse(); // display order is the reverse of wire order
    Ok(out)
}

/// Format a wire-order MAC address as a `0x`-prefixed hex string.
#[must_use]
pub fn mac_addr_array_to_string(address: &[u8; 8]) -> String {
    let mut out = String::with_capacity(18);
    out.push_str("0x");
    for byte in address.iter().rev() {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Format an arbitrary byte slice as a `0x`-prefixed hex string, in order.
#[must_use]
pub fn general_array_to_string(data: &[u8]) -> String {
    let mut out = String::with_capacity(2 + data.len() * 2);
    out.push_str("0x");
    for byte in data {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn firmware_version_decodes_platform_and_revision() {
        // 0x26780700: family 7 (ConBee2), minor 0x78, major 0x26
        let version = FirmwareVersion::from_u32(0x2678_0700);
        assert_eq!(version.platform, Platform::ConBee2);
        assert_eq!(version.major, 0x26);
        assert_eq!(version.minor, 0x78);
        assert_eq!(version.revision, 0x2678_0700);

        let old = FirmwareVersion::from_u32(0x1234_0500);
        assert_eq!(old.platform, Platform::ConBee);

        let new = FirmwareVersion::from_u32(0x1234_0900);
        assert_eq!(new.platform, Platform::ConBee3);
    }

    #[test]
    fn device_state_flags() {
        let state = DeviceState::from_byte(0x2A);
        assert_eq!(state.network_state, NetworkState::Connected);
        assert!(!state.aps_data_confirm);
        assert!(state.aps_data_indication);
        assert!(state.aps_request_free_slots);
    }

    fn nwk_request(asdu: Vec<u8>) -> ApsDataRequest {
        ApsDataRequest {
            request_id: 5,
            dest_addr_mode: AddressMode::Nwk,
            dest_addr16: Some(0x1234),
            dest_addr64: None,
            dest_endpoint: Some(1),
            profile_id: 0x0104,
            cluster_id: 0x0006,
            src_endpoint: 1,
            asdu,
            tx_options: 0x04,
            radius: DEFAULT_RADIUS,
            timeout_secs: 30,
        }
    }

    #[test]
    fn aps_request_serializes_nwk_addressing() {
        let asdu = vec![0x01, 0x02, 0x03];
        let data = nwk_request(asdu.clone()).serialize().unwrap();

        let payload_len = u16::from_le_bytes([data[0], data[1]]) as usize;
        assert_eq!(payload_len, data.len() - 2);
        assert_eq!(data[2], 5); // request id
        assert_eq!(data[4], AddressMode::Nwk as u8);
        assert_eq!(u16::from_le_bytes([data[5], data[6]]), 0x1234);
        assert_eq!(data[7], 1); // dest endpoint
        assert_eq!(u16::from_le_bytes([data[8], data[9]]), 0x0104);
        assert_eq!(u16::from_le_bytes([data[10], data[11]]), 0x0006);
        assert_eq!(data[12], 1); // src endpoint
        assert_eq!(u16::from_le_bytes([data[13], data[14]]) as usize, asdu.len());
        assert_eq!(&data[15..15 + asdu.len()], asdu.as_slice());
    }

    #[test]
    fn aps_request_group_mode_omits_endpoint() {
        let req = ApsDataRequest {
            dest_addr_mode: AddressMode::Group,
            dest_addr16: Some(0x000A),
            dest_endpoint: None,
            radius: UNLIMITED_RADIUS,
            ..nwk_request(vec![0xAA])
        };
        let data = req.serialize().unwrap();
        assert_eq!(data[4], AddressMode::Group as u8);
        // profile id follows the group address directly
        assert_eq!(u16::from_le_bytes([data[7], data[8]]), 0x0104);
    }

    #[test]
    fn aps_request_broadcast_serializes_as_nwk() {
        let req = ApsDataRequest {
            dest_addr_mode: AddressMode::Broadcast,
            dest_addr16: Some(0xFFFD),
            ..nwk_request(vec![])
        };
        let data = req.serialize().unwrap();
        assert_eq!(data[4], AddressMode::Nwk as u8);
        assert_eq!(u16::from_le_bytes([data[5], data[6]]), 0xFFFD);
    }

    #[test]
    fn aps_request_missing_address_rejected() {
        let req = ApsDataRequest {
            dest_addr16: None,
            ..nwk_request(vec![])
        };
        assert!(matches!(
            req.serialize(),
            Err(DriverError::InvalidRequest(_))
        ));
    }

    /// Build indication bytes the way the radio would, carrying `asdu` back.
    fn indication_bytes(asdu: &[u8]) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&0u16.to_le_bytes()); // payload len (unchecked)
        data.push(0x22); // device state
        data.push(AddressMode::Nwk as u8);
        data.extend_from_slice(&0x0000u16.to_le_bytes()); // dest: coordinator
        data.push(1); // dest endpoint
        data.push(AddressMode::NwkAndIeee as u8);
        data.extend_from_slice(&0x1234u16.to_le_bytes());
        data.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        data.push(1); // src endpoint
        data.extend_from_slice(&0x0104u16.to_le_bytes());
        data.extend_from_slice(&0x0006u16.to_le_bytes());
        data.extend_from_slice(&(asdu.len() as u16).to_le_bytes());
        data.extend_from_slice(asdu);
        data.push(200); // lqi
        data.push(0xD8); // rssi -40
        data
    }

    #[test]
    fn request_then_indication_recovers_payload() {
        let asdu = vec![0x11, 0x22, 0x33, 0x44];

        // Outbound: the serialized request embeds the ASDU verbatim.
        let tx = nwk_request(asdu.clone()).serialize().unwrap();
        let tx_asdu_len = u16::from_le_bytes([tx[13], tx[14]]) as usize;
        assert_eq!(&tx[15..15 + tx_asdu_len], asdu.as_slice());

        // Inbound: a matching indication parses back to the same bytes.
        let rx = ReceivedDataResponse::parse(&indication_bytes(&asdu)).unwrap();
        assert_eq!(rx.asdu, asdu);
        assert_eq!(rx.src_addr16, Some(0x1234));
        assert_eq!(rx.src_addr64, Some([1, 2, 3, 4, 5, 6, 7, 8]));
        assert_eq!(rx.profile_id, 0x0104);
        assert_eq!(rx.cluster_id, 0x0006);
        assert_eq!(rx.lqi, 200);
        assert_eq!(rx.rssi, -40);
    }

    #[test]
    fn indication_with_ieee_only_source() {
        let mut data = Vec::new();
        data.extend_from_slice(&0u16.to_le_bytes());
        data.push(0x22);
        data.push(AddressMode::Nwk as u8);
        data.extend_from_slice(&0x0000u16.to_le_bytes());
        data.push(1);
        data.push(AddressMode::Ieee as u8);
        data.extend_from_slice(&[8, 7, 6, 5, 4, 3, 2, 1]);
        data.push(2);
        data.extend_from_slice(&0x0104u16.to_le_bytes());
        data.extend_from_slice(&0x0000u16.to_le_bytes());
        data.extend_from_slice(&1u16.to_le_bytes());
        data.push(0xAB);

        let rx = ReceivedDataResponse::parse(&data).unwrap();
        assert_eq!(rx.src_addr16, None);
        assert_eq!(rx.src_addr64, Some([8, 7, 6, 5, 4, 3, 2, 1]));
        assert_eq!(rx.asdu, vec![0xAB]);
        // lqi/rssi absent on this firmware
        assert_eq!(rx.lqi, 0);
        assert_eq!(rx.rssi, 0);
    }

    #[test]
    fn gp_data_ind_roundtrip() {
        let ind = GpDataInd {
            seq_nr: 7,
            id: 0x10,
            options: 0,
            src_id: 0xDEAD_BEEF,
            frame_counter: 42,
            command_id: 0x22,
            command_frame_size: 3,
            command_frame: vec![0x01, 0x02, 0x03],
        };
        let parsed = GpDataInd::parse(&ind.serialize()).unwrap();
        assert_eq!(parsed.seq_nr, 7);
        assert_eq!(parsed.src_id, 0xDEAD_BEEF);
        assert_eq!(parsed.frame_counter, 42);
        assert_eq!(parsed.command_id, 0x22);
        assert_eq!(parsed.command_frame, vec![0x01, 0x02, 0x03]);
    }

    #[test]
    fn mac_addr_string_roundtrip() {
        let array = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        let string = mac_addr_array_to_string(&array);
        assert_eq!(string, "0x0807060504030201");
        assert_eq!(mac_addr_string_to_array(&string).unwrap(), array);
    }

    #[test]
    fn mac_addr_string_rejects_garbage() {
        assert!(mac_addr_string_to_array("0x123").is_err());
        assert!(mac_addr_string_to_array("0xzz07060504030201").is_err());
    }

    #[test]
    fn general_array_formats_in_order() {
        assert_eq!(general_array_to_string(&[0xDE, 0xAD]), "0xdead");
    }
}
