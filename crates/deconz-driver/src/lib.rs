//! deCONZ serial driver for ConBee / RaspBee Zigbee coordinators
//!
//! Implements the byte-oriented serial protocol spoken by Dresden
//! Elektronik coordinator radios: SLIP framing, command frames with CRC,
//! parameter access, and APS data submission/indication.

pub mod commands;
pub mod frame;
pub mod serial;
pub mod slip;
pub mod types;

pub use commands::{CommandId, NetworkStateCommand, Parameter};
pub use frame::Frame;
pub use serial::{DriverEvent, SerialDriver, DEFAULT_BAUD_RATE};
pub use types::*;
