//! Abstract driver seam between the adapter core and the serial transport

use async_trait::async_trait;
use deconz_driver::{
    ApsDataRequest, DriverError, DriverEvent, FirmwareVersion, NetworkStateCommand, Parameter,
    SerialDriver,
};
use tokio::sync::broadcast;

/// The byte-level radio driver surface the adapter core consumes.
///
/// Object-safe so tests can substitute a scripted implementation.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Open the serial device at the given baud rate
    async fn open(&self, baud_rate: u32) -> Result<(), DriverError>;

    /// Close the serial device
    async fn close(&self);

    /// Read a device parameter
    async fn read_parameter(&self, param: Parameter) -> Result<Vec<u8>, DriverError>;

    /// Write a device parameter
    async fn write_parameter(&self, param: Parameter, value: &[u8]) -> Result<(), DriverError>;

    /// Read the firmware version word
    async fn read_firmware_version(&self) -> Result<FirmwareVersion, DriverError>;

    /// Move the network offline or online
    async fn change_network_state(&self, target: NetworkStateCommand) -> Result<(), DriverError>;

    /// Submit an APS data request and await the device confirm
    async fn enqueue_send_data_request(&self, request: ApsDataRequest) -> Result<(), DriverError>;

    /// Subscribe to the driver's event stream
    fn subscribe(&self) -> broadcast::Receiver<DriverEvent>;
}

#[async_trait]
impl Driver for SerialDriver {
    async fn open(&self, baud_rate: u32) -> Result<(), DriverError> {
        SerialDriver::open(self, baud_rate).await
    }

    async fn close(&self) {
        SerialDriver::close(self).await;
    }

    async fn read_parameter(&self, param: Parameter) -> Result<Vec<u8>, DriverError> {
        SerialDriver::read_parameter(self, param).await
    }

    async fn write_parameter(&self, param: Parameter, value: &[u8]) -> Result<(), DriverError> {
        SerialDriver::write_parameter(self, param, value).await
    }

    async fn read_firmware_version(&self) -> Result<FirmwareVersion, DriverError> {
        SerialDriver::read_firmware_version(self).await
    }

    async fn change_network_state(&self, target: NetworkStateCommand) -> Result<(), DriverError> {
        SerialDriver::change_network_state(self, target).await
    }

    async fn enqueue_send_data_request(&self, request: ApsDataRequest) -> Result<(), DriverError> {
        SerialDriver::enqueue_send_data_request(self, request).await
    }

    fn subscribe(&self) -> broadcast::Receiver<DriverEvent> {
        SerialDriver::subscribe(self)
    }
}
