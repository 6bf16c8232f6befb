//! SLIP (Serial Line Internet Protocol) framing - RFC 1055
//!
//! The deCONZ serial protocol wraps every command frame in SLIP framing.

use bytes::BytesMut;

/// SLIP END byte - marks frame boundaries
pub const SLIP_END: u8 = 0xC0;
/// SLIP ESC byte - escape character
pub const SLIP_ESC: u8 = 0xDB;
/// SLIP ESC_END - escaped form of END
pub const SLIP_ESC_END: u8 = 0xDC;
/// SLIP ESC_ESC - escaped form of ESC
pub const SLIP_ESC_ESC: u8 = 0xDD;

/// Encode a frame with SLIP framing.
///
/// Prefixes and suffixes with END (Phil Karn's improvement) so any line
/// noise preceding the frame is flushed at the receiver.
#[must_use]
pub fn encode(frame: &[u8]) -> Vec<u8> {
    let mut encoded = Vec::with_capacity(frame.len() * 2 + 2);
    encoded.push(SLIP_END);

    for &byte in frame {
        match byte {
            SLIP_END => {
                encoded.push(SLIP_ESC);
                encoded.push(SLIP_ESC_END);
            }
            SLIP_ESC => {
                encoded.push(SLIP_ESC);
                encoded.push(SLIP_ESC_ESC);
            }
            _ => encoded.push(byte),
        }
    }

    encoded.push(SLIP_END);
    encoded
}

/// Incremental SLIP decoder for the serial read loop.
#[derive(Default)]
pub struct Decoder {
    buffer: BytesMut,
    in_escape: bool,
}

impl Decoder {
    /// Create a new decoder
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(256),
            in_escape: false,
        }
    }

    /// Feed bytes into the decoder, returning every completed frame.
    pub fn feed(&mut self, data: &[u8]) -> Vec<Vec<u8>> {
        let mut frames = Vec::new();

        for &byte in data {
            if self.in_escape {
                self.in_escape = false;
                match byte {
                    SLIP_ESC_END => self.buffer.extend_from_slice(&[SLIP_END]),
                    SLIP_ESC_ESC => self.buffer.extend_from_slice(&[SLIP_ESC]),
                    // Invalid escape sequence - keep both bytes
                    _ => self.buffer.extend_from_slice(&[SLIP_ESC, byte]),
                }
            } else {
                match byte {
                    SLIP_END => {
                        if !self.buffer.is_empty() {
                            frames.push(self.buffer.split().to_vec());
                        }
                    }
                    SLIP_ESC => {
                        self.in_escape = true;
                    }
                    _ => self.buffer.extend_from_slice(&[byte]),
                }
            }
        }

        frames
    }

    /// Drop any partial frame and escape state.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.in_escape = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_simple() {
        let encoded = encode(&[0x01, 0x02, 0x03]);
        assert_eq!(encoded, vec![SLIP_END, 0x01, 0x02, 0x03, SLIP_END]);
    }

    #[test]
    fn encode_escapes_end_byte() {
        let encoded = encode(&[0x01, SLIP_END, 0x03]);
        assert_eq!(
            encoded,
            vec![SLIP_END, 0x01, SLIP_ESC, SLIP_ESC_END, 0x03, SLIP_END]
        );
    }

    #[test]
    fn encode_escapes_esc_byte() {
        let encoded = encode(&[0x01, SLIP_ESC, 0x03]);
        assert_eq!(
            encoded,
            vec![SLIP_END, 0x01, SLIP_ESC, SLIP_ESC_ESC, 0x03, SLIP_END]
        );
    }

    #[test]
    fn decode_simple() {
        let mut decoder = Decoder::new();
        let frames = decoder.feed(&[SLIP_END, 0x01, 0x02, 0x03, SLIP_END]);
        assert_eq!(frames, vec![vec![0x01, 0x02, 0x03]]);
    }

    #[test]
    fn decode_with_escapes() {
        let mut decoder = Decoder::new();
        let frames = decoder.feed(&[
            SLIP_END,
            0x01,
            SLIP_ESC,
            SLIP_ESC_END,
            SLIP_ESC,
            SLIP_ESC_ESC,
            SLIP_END,
        ]);
        assert_eq!(frames, vec![vec![0x01, SLIP_END, SLIP_ESC]]);
    }

    #[test]
    fn decode_across_reads() {
        let mut decoder = Decoder::new();

        let frames = decoder.feed(&[SLIP_END, 0x01, 0x02]);
        assert!(frames.is_empty());

        let frames = decoder.feed(&[0x03, SLIP_END]);
        assert_eq!(frames, vec![vec![0x01, 0x02, 0x03]]);
    }

    #[test]
    fn roundtrip() {
        let original = vec![0x01, SLIP_END, 0x02, SLIP_ESC, 0x03, 0x00, 0xFF];
        let encoded = encode(&original);
        let mut decoder = Decoder::new();
        let decoded = decoder.feed(&encoded);
        assert_eq!(decoded, vec![original]);
    }
}
