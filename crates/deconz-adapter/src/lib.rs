//! Host-side adapter core for deCONZ (ConBee / RaspBee) coordinators
//!
//! Translates between a higher-level Zigbee stack and the byte-oriented
//! serial driver: request dispatch with bounded concurrency, correlation
//! of inbound data indications to pending requests, a generic ZCL payload
//! matcher, and startup reconciliation of network parameters.

pub mod adapter;
pub mod config;
pub mod directory;
pub mod driver;
pub mod error;
pub mod events;
pub mod pending;
pub mod queue;
pub mod sequence;
pub mod waitress;
pub mod zcl;

pub use adapter::{
    Adapter, BindTarget, Coordinator, CoordinatorEndpoint, DeviceType, Lqi, Neighbor,
    NetworkParameters, NodeDescriptor, RouteStatus, RoutingEntry, RoutingTable, SimpleDescriptor,
    StartResult, GP_ENDPOINT, GP_GROUP_ID,
};
pub use config::{AdapterOptions, Config, NetworkOptions, SerialPortOptions};
pub use directory::{AddressBook, DeviceDirectory};
pub use driver::Driver;
pub use error::AdapterError;
pub use events::{Event, PayloadAddress, ZclPayload};
pub use waitress::{WaitFor, ZclMatcher};
pub use zcl::{Direction, FrameType, ZclFrame, ZclHeader};
