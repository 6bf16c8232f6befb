//! deCONZ command frame structure and CRC handling

use crate::commands::CommandId;
use crate::types::DriverError;

/// Minimum frame size: cmd(1) + seq(1) + status(1) + len(2) + crc(2)
pub const MIN_FRAME_SIZE: usize = 7;

/// A deCONZ protocol frame, after SLIP decoding.
///
/// Wire layout:
/// ```text
/// [Command ID: 1 byte]
/// [Sequence:   1 byte]
/// [Status:     1 byte]  (0 reserved in requests, device status in responses)
/// [Length:     2 bytes LE]  (frame size excluding CRC)
/// [Payload:    variable]
/// [CRC:        2 bytes LE]
/// ```
#[derive(Debug, Clone)]
pub struct Frame {
    pub command_id: CommandId,
    pub sequence: u8,
    pub status: u8,
    pub payload: Vec<u8>,
}

impl Frame {
    /// Build a request frame (status byte is reserved and sent as zero).
    #[must_use]
    pub fn request(command_id: CommandId, sequence: u8, payload: Vec<u8>) -> Self {
        Self {
            command_id,
            sequence,
            status: 0,
            payload,
        }
    }

    /// Serialize to bytes, ready for SLIP encoding.
    #[must_use]
    #[allow(clippy::missing_panics_doc)] // Panic only on protocol-violating payload size
    pub fn serialize(&self) -> Vec<u8> {
        // The length field counts everything except the trailing CRC.
        let frame_len =
            u16::try_from(5 + self.payload.len()).expect("payload exceeds protocol maximum");

        let mut data = Vec::with_capacity(frame_len as usize + 2);

        data.push(self.command_id as u8);
        data.push(self.sequence);
        data.push(0x00);
        data.extend_from_slice(&frame_len.to_le_bytes());
        data.extend_from_slice(&self.payload);

        let crc = crc16(&data);
        data.extend_from_slice(&crc.to_le_bytes());

        data
    }

    /// Deserialize from bytes (after SLIP decoding).
    pub fn deserialize(data: &[u8]) -> Result<Self, DriverError> {
        if data.len() < MIN_FRAME_SIZE {
            return Err(DriverError::FrameTooShort(data.len()));
        }

        let crc_offset = data.len() - 2;
        let received_crc = u16::from_le_bytes([data[crc_offset], data[crc_offset + 1]]);
        let calculated_crc = crc16(&data[..crc_offset]);

        if received_crc != calculated_crc {
            return Err(DriverError::CrcMismatch {
                expected: calculated_crc,
                actual: received_crc,
            });
        }

        let command_id =
            CommandId::from_u8(data[0]).ok_or(DriverError::UnknownCommand(data[0]))?;
        let sequence = data[1];
        let status = data[2];

        let frame_len = u16::from_le_bytes([data[3], data[4]]) as usize;
        if frame_len + 2 != data.len() {
            return Err(DriverError::InvalidFrame(format!(
                "length field says {} (+2 CRC), got {} bytes",
                frame_len,
                data.len()
            )));
        }

        let payload = data[5..crc_offset].to_vec();

        Ok(Self {
            command_id,
            sequence,
            status,
            payload,
        })
    }
}

/// 16-bit CRC used by the deCONZ protocol: two's complement of the byte sum.
#[must_use]
pub fn crc16(data: &[u8]) -> u16 {
    let sum = data
        .iter()
        .fold(0u16, |acc, &b| acc.wrapping_add(u16::from(b)));
    (!sum).wrapping_add(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc_is_twos_complement_of_sum() {
        let data = [0x0D, 0x01, 0x00, 0x09, 0x00, 0x00, 0x00];
        let sum: u16 = data.iter().map(|&b| u16::from(b)).sum();
        assert_eq!(crc16(&data), (!sum).wrapping_add(1));
    }

    #[test]
    fn serialize_deserialize_roundtrip() {
        let frame = Frame::request(CommandId::ReadParameter, 7, vec![0x01, 0x00, 0x05]);
        let bytes = frame.serialize();
        let parsed = Frame::deserialize(&bytes).unwrap();
        assert_eq!(parsed.command_id, CommandId::ReadParameter);
        assert_eq!(parsed.sequence, 7);
        assert_eq!(parsed.status, 0);
        assert_eq!(parsed.payload, vec![0x01, 0x00, 0x05]);
    }

    #[test]
    fn rejects_short_frame() {
        let result = Frame::deserialize(&[0x01, 0x02]);
        assert!(matches!(result, Err(DriverError::FrameTooShort(_))));
    }

    #[test]
    fn rejects_corrupted_crc() {
        let mut bytes = Frame::request(CommandId::DeviceState, 1, vec![0x00]).serialize();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        assert!(matches!(
            Frame::deserialize(&bytes),
            Err(DriverError::CrcMismatch { .. })
        ));
    }

    #[test]
    fn rejects_length_mismatch() {
        let mut bytes = Frame::request(CommandId::DeviceState, 1, vec![0x00]).serialize();
        // Corrupt the length field, then fix up the CRC so only the length check fires.
        bytes[3] = bytes[3].wrapping_add(1);
        let crc_offset = bytes.len() - 2;
        let crc = crc16(&bytes[..crc_offset]);
        bytes[crc_offset..].copy_from_slice(&crc.to_le_bytes());
        assert!(matches!(
            Frame::deserialize(&bytes),
            Err(DriverError::InvalidFrame(_))
        ));
    }
}
