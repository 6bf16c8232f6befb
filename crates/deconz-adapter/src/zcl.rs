//! Minimal ZCL (Zigbee Cluster Library) frame codec
//!
//! The adapter only needs the header: frame control, optional manufacturer
//! code, transaction sequence number and command identifier. Payload bytes
//! are carried opaquely.

use crate::error::AdapterError;

/// ZCL frame types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameType {
    Global = 0x00,
    ClusterSpecific = 0x01,
}

/// ZCL direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Direction {
    ClientToServer = 0x00,
    ServerToClient = 0x01,
}

/// ZCL global commands
pub mod global_commands {
    pub const READ_ATTRIBUTES: u8 = 0x00;
    pub const READ_ATTRIBUTES_RSP: u8 = 0x01;
    pub const WRITE_ATTRIBUTES: u8 = 0x02;
    pub const WRITE_ATTRIBUTES_UNDIVIDED: u8 = 0x03;
    pub const WRITE_ATTRIBUTES_RSP: u8 = 0x04;
    pub const WRITE_ATTRIBUTES_NO_RSP: u8 = 0x05;
    pub const CONFIGURE_REPORTING: u8 = 0x06;
    pub const CONFIGURE_REPORTING_RSP: u8 = 0x07;
    pub const READ_REPORTING_CONFIG: u8 = 0x08;
    pub const READ_REPORTING_CONFIG_RSP: u8 = 0x09;
    pub const REPORT_ATTRIBUTES: u8 = 0x0A;
    pub const DEFAULT_RSP: u8 = 0x0B;
    pub const DISCOVER_ATTRIBUTES: u8 = 0x0C;
    pub const DISCOVER_ATTRIBUTES_RSP: u8 = 0x0D;
}

/// The response command a global command is answered with, if any.
#[must_use]
pub fn global_response_for(command_id: u8) -> Option<u8> {
    use global_commands as cmd;
    match command_id {
        cmd::READ_ATTRIBUTES => Some(cmd::READ_ATTRIBUTES_RSP),
        cmd::WRITE_ATTRIBUTES | cmd::WRITE_ATTRIBUTES_UNDIVIDED => {
            Some(cmd::WRITE_ATTRIBUTES_RSP)
        }
        cmd::CONFIGURE_REPORTING => Some(cmd::CONFIGURE_REPORTING_RSP),
        cmd::READ_REPORTING_CONFIG => Some(cmd::READ_REPORTING_CONFIG_RSP),
        cmd::DISCOVER_ATTRIBUTES => Some(cmd::DISCOVER_ATTRIBUTES_RSP),
        _ => None,
    }
}

/// Decoded frame-control byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameControl {
    pub frame_type: FrameType,
    pub manufacturer_specific: bool,
    pub direction: Direction,
    pub disable_default_response: bool,
}

impl FrameControl {
    pub fn from_byte(byte: u8) -> Result<Self, AdapterError> {
        let frame_type = match byte & 0x03 {
            0x00 => FrameType::Global,
            0x01 => FrameType::ClusterSpecific,
            other => {
                return Err(AdapterError::InvalidResponse(format!(
                    "reserved ZCL frame type {other}"
                )))
            }
        };
        Ok(Self {
            frame_type,
            manufacturer_specific: (byte & 0x04) != 0,
            direction: if (byte & 0x08) != 0 {
                Direction::ServerToClient
            } else {
                Direction::ClientToServer
            },
            disable_default_response: (byte & 0x10) != 0,
        })
    }

    #[must_use]
    pub fn to_byte(self) -> u8 {
        let mut byte = self.frame_type as u8;
        if self.manufacturer_specific {
            byte |= 0x04;
        }
        if self.direction == Direction::ServerToClient {
            byte |= 0x08;
        }
        if self.disable_default_response {
            byte |= 0x10;
        }
        byte
    }
}

/// Parsed ZCL frame header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZclHeader {
    pub frame_control: FrameControl,
    pub manufacturer_code: Option<u16>,
    pub transaction_sequence_number: u8,
    pub command_id: u8,
}

impl ZclHeader {
    /// Parse a header from the start of an ASDU.
    pub fn parse(data: &[u8]) -> Result<Self, AdapterError> {
        if data.len() < 3 {
            return Err(AdapterError::InvalidResponse(format!(
                "ZCL header too short: {} bytes",
                data.len()
            )));
        }

        let frame_control = FrameControl::from_byte(data[0])?;
        let mut idx = 1;

        let manufacturer_code = if frame_control.manufacturer_specific {
            if data.len() < 5 {
                return Err(AdapterError::InvalidResponse(
                    "truncated manufacturer-specific ZCL header".to_string(),
                ));
            }
            let code = u16::from_le_bytes([data[idx], data[idx + 1]]);
            idx += 2;
            Some(code)
        } else {
            None
        };

        let transaction_sequence_number = data[idx];
        let command_id = data[idx + 1];

        Ok(Self {
            frame_control,
            manufacturer_code,
            transaction_sequence_number,
            command_id,
        })
    }

    /// Serialized header length in bytes
    #[must_use]
    pub fn serialized_len(&self) -> usize {
        if self.manufacturer_code.is_some() {
            5
        } else {
            3
        }
    }

    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(self.serialized_len());
        data.push(self.frame_control.to_byte());
        if let Some(code) = self.manufacturer_code {
            data.extend_from_slice(&code.to_le_bytes());
        }
        data.push(self.transaction_sequence_number);
        data.push(self.command_id);
        data
    }
}

/// A full ZCL frame: header plus opaque payload, bound to a cluster.
#[derive(Debug, Clone)]
pub struct ZclFrame {
    pub cluster_id: u16,
    pub header: ZclHeader,
    pub payload: Vec<u8>,
}

impl ZclFrame {
    /// Build a cluster-specific client-to-server command frame.
    #[must_use]
    pub fn cluster_command(cluster_id: u16, tsn: u8, command_id: u8, payload: Vec<u8>) -> Self {
        Self {
            cluster_id,
            header: ZclHeader {
                frame_control: FrameControl {
                    frame_type: FrameType::ClusterSpecific,
                    manufacturer_specific: false,
                    direction: Direction::ClientToServer,
                    disable_default_response: false,
                },
                manufacturer_code: None,
                transaction_sequence_number: tsn,
                command_id,
            },
            payload,
        }
    }

    /// Build a global command frame.
    #[must_use]
    pub fn global_command(cluster_id: u16, tsn: u8, command_id: u8, payload: Vec<u8>) -> Self {
        Self {
            cluster_id,
            header: ZclHeader {
                frame_control: FrameControl {
                    frame_type: FrameType::Global,
                    manufacturer_specific: false,
                    direction: Direction::ClientToServer,
                    disable_default_response: false,
                },
                manufacturer_code: None,
                transaction_sequence_number: tsn,
                command_id,
            },
            payload,
        }
    }

    /// Whether this command is answered by a dedicated response command.
    #[must_use]
    pub fn has_declared_response(&self) -> bool {
        self.header.frame_control.frame_type == FrameType::Global
            && global_response_for(self.header.command_id).is_some()
    }

    /// Serialize header and payload into ASDU bytes.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut data = self.header.serialize();
        data.extend_from_slice(&self.payload);
        data
    }
}
