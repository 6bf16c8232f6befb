//! Async serial driver for deCONZ coordinator radios

use crate::commands::{CommandId, NetworkStateCommand, Parameter};
use crate::frame::Frame;
use crate::slip;
use crate::types::{
    ApsDataRequest, DeviceState, DriverError, FirmwareVersion, GpDataInd, ReceivedDataResponse,
    Status,
};

use serial2::SerialPort;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, Mutex};

/// Default baud rate for ConBee / RaspBee devices
pub const DEFAULT_BAUD_RATE: u32 = 38400;

/// Default request timeout for serial commands
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Logical events surfaced to the driver's consumer
#[derive(Debug, Clone)]
pub enum DriverEvent {
    /// A parsed APS data indication arrived
    ReceivedDataPayload(ReceivedDataResponse),
    /// A Green-Power indication arrived
    ReceivedGreenPowerIndication(GpDataInd),
}

/// Command to the writer task
enum WriteCommand {
    Send(Vec<u8>),
    Shutdown,
}

/// An open serial connection: writer channel, sequence counter and the
/// per-sequence map of requests awaiting their response frame.
struct Connection {
    write_tx: mpsc::Sender<WriteCommand>,
    sequence: AtomicU8,
    pending: Mutex<HashMap<u8, oneshot::Sender<Result<Frame, DriverError>>>>,
    shutdown: Arc<AtomicBool>,
}

impl Connection {
    /// Send a request frame and wait for the response with the same sequence.
    async fn request(
        &self,
        command_id: CommandId,
        payload: Vec<u8>,
        timeout: Duration,
    ) -> Result<Frame, DriverError> {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        let frame = Frame::request(command_id, sequence, payload);
        let data = slip::encode(&frame.serialize());

        let (response_tx, response_rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            pending.insert(sequence, response_tx);
        }

        self.write_tx
            .send(WriteCommand::Send(data))
            .await
            .map_err(|_| DriverError::NotConnected)?;

        tracing::debug!(
            "Sent frame: cmd={:?} seq={} payload_len={}",
            command_id,
            sequence,
            frame.payload.len()
        );

        match tokio::time::timeout(timeout, response_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(DriverError::Timeout),
            Err(_) => {
                let mut pending = self.pending.lock().await;
                pending.remove(&sequence);
                Err(DriverError::Timeout)
            }
        }
    }
}

/// Serial driver for a deCONZ coordinator.
///
/// Owns the port lifecycle: a writer task and a blocking reader thread are
/// spawned on `open`, incoming frames are matched against pending requests
/// by sequence number, and unsolicited indications are published on the
/// event stream. Pending APS data signalled via device-state flags is
/// fetched by the driver itself, so consumers only see parsed indications.
pub struct SerialDriver {
    path: String,
    event_tx: broadcast::Sender<DriverEvent>,
    connection: Mutex<Option<Arc<Connection>>>,
}

impl SerialDriver {
    /// Create a driver for the serial device at `path`. The port is not
    /// touched until `open` is called.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        let (event_tx, _) = broadcast::channel(64);
        Self {
            path: path.into(),
            event_tx,
            connection: Mutex::new(None),
        }
    }

    /// Subscribe to driver events
    pub fn subscribe(&self) -> broadcast::Receiver<DriverEvent> {
        self.event_tx.subscribe()
    }

    /// Open the serial port and start the I/O tasks.
    pub async fn open(&self, baud_rate: u32) -> Result<(), DriverError> {
        let mut guard = self.connection.lock().await;
        if guard.is_some() {
            return Ok(());
        }

        tracing::info!("Opening deCONZ device at {} ({} baud)", self.path, baud_rate);

        let mut port =
            SerialPort::open(&self.path, baud_rate).map_err(DriverError::SerialError)?;
        // Short read timeout so the reader thread can poll its shutdown flag
        port.set_read_timeout(Duration::from_millis(100))
            .map_err(DriverError::SerialError)?;
        let reader_port = port.try_clone().map_err(DriverError::SerialError)?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let (write_tx, write_rx) = mpsc::channel(32);
        let (frame_tx, frame_rx) = mpsc::channel::<Vec<u8>>(64);
        let (poll_tx, poll_rx) = mpsc::channel::<()>(4);

        let connection = Arc::new(Connection {
            write_tx,
            sequence: AtomicU8::new(1),
            pending: Mutex::new(HashMap::new()),
            shutdown: shutdown.clone(),
        });

        tokio::spawn(Self::writer_task(port, write_rx));

        let reader_shutdown = shutdown.clone();
        std::thread::spawn(move || {
            Self::reader_thread(reader_port, frame_tx, reader_shutdown);
        });

        tokio::spawn(Self::frame_handler_task(
            frame_rx,
            connection.clone(),
            self.event_tx.clone(),
            poll_tx,
        ));

        tokio::spawn(Self::poll_task(
            poll_rx,
            connection.clone(),
            self.event_tx.clone(),
        ));

        *guard = Some(connection);
        tracing::info!("Connected to deCONZ device");
        Ok(())
    }

    /// Close the port and stop the I/O tasks.
    pub async fn close(&self) {
        let mut guard = self.connection.lock().await;
        if let Some(connection) = guard.take() {
            connection.shutdown.store(true, Ordering::SeqCst);
            let _ = connection.write_tx.send(WriteCommand::Shutdown).await;
            tracing::info!("Closed deCONZ device at {}", self.path);
        }
    }

    async fn connected(&self) -> Result<Arc<Connection>, DriverError> {
        self.connection
            .lock()
            .await
            .as_ref()
            .cloned()
            .ok_or(DriverError::NotConnected)
    }

    /// Writer task - serializes port writes
    async fn writer_task(port: SerialPort, mut rx: mpsc::Receiver<WriteCommand>) {
        while let Some(cmd) = rx.recv().await {
            match cmd {
                WriteCommand::Send(data) => {
                    tracing::trace!("Writing {} bytes to serial port", data.len());
                    if let Err(e) = port.write_all(&data) {
                        tracing::error!("Write error: {}", e);
                    }
                    if let Err(e) = port.flush() {
                        tracing::error!("Flush error: {}", e);
                    }
                }
                WriteCommand::Shutdown => break,
            }
        }
        tracing::debug!("Writer task shutting down");
    }

    /// Reader thread - blocking I/O, frames forwarded over a channel
    fn reader_thread(port: SerialPort, frame_tx: mpsc::Sender<Vec<u8>>, shutdown: Arc<AtomicBool>) {
        tracing::debug!("Reader thread started");
        let mut buffer = [0u8; 1024];
        let mut decoder = slip::Decoder::new();

        loop {
            if shutdown.load(Ordering::SeqCst) {
                break;
            }
            match port.read(&mut buffer) {
                Ok(0) => {
                    tracing::warn!("Serial port closed");
                    break;
                }
                Ok(n) => {
                    for frame_data in decoder.feed(&buffer[..n]) {
                        tracing::trace!("Decoded frame: {:02X?}", &frame_data);
                        if frame_tx.blocking_send(frame_data).is_err() {
                            tracing::warn!("Frame channel closed");
                            return;
                        }
                    }
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
                Err(ref e) if e.raw_os_error() == Some(libc::EAGAIN) => continue,
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    std::thread::sleep(Duration::from_millis(10));
                }
                Err(e) => {
                    tracing::error!("Serial read error: {}", e);
                    break;
                }
            }
        }
        tracing::debug!("Reader thread shutting down");
    }

    /// Frame handler task - routes decoded frames
    async fn frame_handler_task(
        mut frame_rx: mpsc::Receiver<Vec<u8>>,
        connection: Arc<Connection>,
        event_tx: broadcast::Sender<DriverEvent>,
        poll_tx: mpsc::Sender<()>,
    ) {
        while let Some(data) = frame_rx.recv().await {
            if let Err(e) = Self::handle_frame(&data, &connection, &event_tx, &poll_tx).await {
                tracing::warn!("Error handling frame: {}", e);
            }
        }
        tracing::debug!("Frame handler task shutting down");
    }

    async fn handle_frame(
        data: &[u8],
        connection: &Arc<Connection>,
        event_tx: &broadcast::Sender<DriverEvent>,
        poll_tx: &mpsc::Sender<()>,
    ) -> Result<(), DriverError> {
        let frame = Frame::deserialize(data)?;
        tracing::debug!(
            "Received frame: cmd={:?} seq={} status={} payload_len={}",
            frame.command_id,
            frame.sequence,
            frame.status,
            frame.payload.len()
        );

        // Response to a pending request?
        let mut pending = connection.pending.lock().await;
        if let Some(tx) = pending.remove(&frame.sequence) {
            drop(pending);
            let _ = tx.send(Ok(frame));
            return Ok(());
        }
        drop(pending);

        // Unsolicited frames
        match frame.command_id {
            CommandId::DeviceStateChanged => {
                if !frame.payload.is_empty() {
                    let state = DeviceState::from_byte(frame.payload[0]);
                    if state.aps_data_indication {
                        let _ = poll_tx.try_send(());
                    }
                }
            }
            CommandId::ApsDataIndication => {
                match ReceivedDataResponse::parse(&frame.payload) {
                    Ok(indication) => {
                        let _ = event_tx.send(DriverEvent::ReceivedDataPayload(indication));
                    }
                    Err(e) => tracing::warn!("Bad APS indication: {}", e),
                }
            }
            CommandId::GreenPower => match GpDataInd::parse(&frame.payload) {
                Ok(ind) => {
                    let _ = event_tx.send(DriverEvent::ReceivedGreenPowerIndication(ind));
                }
                Err(e) => tracing::warn!("Bad Green-Power indication: {}", e),
            },
            other => {
                tracing::debug!("Unhandled unsolicited frame: {:?}", other);
            }
        }

        Ok(())
    }

    /// Poll task - drains pending APS data whenever the device signals it
    async fn poll_task(
        mut poll_rx: mpsc::Receiver<()>,
        connection: Arc<Connection>,
        event_tx: broadcast::Sender<DriverEvent>,
    ) {
        while poll_rx.recv().await.is_some() {
            loop {
                match Self::fetch_aps_data(&connection).await {
                    Ok(indication) => {
                        let more = indication.device_state.aps_data_indication;
                        let _ = event_tx.send(DriverEvent::ReceivedDataPayload(indication));
                        if !more {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Failed to fetch APS data: {}", e);
                        break;
                    }
                }
            }
        }
        tracing::debug!("Poll task shutting down");
    }

    /// Fetch one pending APS data indication from the device
    async fn fetch_aps_data(connection: &Arc<Connection>) -> Result<ReceivedDataResponse, DriverError> {
        let mut payload = Vec::new();
        payload.extend_from_slice(&1u16.to_le_bytes());
        payload.push(0x04); // flags: request data

        let response = connection
            .request(CommandId::ApsDataIndication, payload, DEFAULT_TIMEOUT)
            .await?;

        let status = Status::try_from(response.status).unwrap_or(Status::Error);
        if status != Status::Success {
            return Err(DriverError::DeviceError(status));
        }

        ReceivedDataResponse::parse(&response.payload)
    }

    /// Read a network parameter from the device.
    pub async fn read_parameter(&self, param: Parameter) -> Result<Vec<u8>, DriverError> {
        let connection = self.connected().await?;

        // payload_len(2 LE) + param_id(1)
        let mut payload = Vec::new();
        payload.extend_from_slice(&1u16.to_le_bytes());
        payload.push(param as u8);

        let response = connection
            .request(CommandId::ReadParameter, payload, DEFAULT_TIMEOUT)
            .await?;

        tracing::debug!(
            "ReadParameter({:?}) status={} payload={:02X?}",
            param,
            response.status,
            response.payload
        );

        let status = Status::try_from(response.status).unwrap_or(Status::Error);
        if status != Status::Success {
            return Err(DriverError::DeviceError(status));
        }

        // Response: payload_len(2) + param_id(1) + value(N)
        if response.payload.len() < 3 {
            return Err(DriverError::InvalidFrame(
                "parameter response too short".to_string(),
            ));
        }
        Ok(response.payload[3..].to_vec())
    }

    /// Write a network parameter to the device.
    pub async fn write_parameter(&self, param: Parameter, value: &[u8]) -> Result<(), DriverError> {
        let connection = self.connected().await?;

        // payload_len(2 LE) + param_id(1) + value(N)
        let payload_len = (1 + value.len()) as u16;
        let mut payload = Vec::new();
        payload.extend_from_slice(&payload_len.to_le_bytes());
        payload.push(param as u8);
        payload.extend_from_slice(value);

        let response = connection
            .request(CommandId::WriteParameter, payload, DEFAULT_TIMEOUT)
            .await?;

        tracing::debug!("WriteParameter({:?}) status={}", param, response.status);

        let status = Status::try_from(response.status).unwrap_or(Status::Error);
        if status != Status::Success {
            return Err(DriverError::DeviceError(status));
        }
        Ok(())
    }

    /// Read the 4-byte firmware version word.
    pub async fn read_firmware_version(&self) -> Result<FirmwareVersion, DriverError> {
        let connection = self.connected().await?;

        let response = connection
            .request(CommandId::Version, vec![0, 0, 0, 0], DEFAULT_TIMEOUT)
            .await?;

        if response.payload.len() < 4 {
            return Err(DriverError::InvalidFrame(
                "version response too short".to_string(),
            ));
        }

        let raw = u32::from_le_bytes([
            response.payload[0],
            response.payload[1],
            response.payload[2],
            response.payload[3],
        ]);
        let version = FirmwareVersion::from_u32(raw);
        tracing::info!("Firmware version {}", version);
        Ok(version)
    }

    /// Move the network to the requested state.
    pub async fn change_network_state(
        &self,
        target: NetworkStateCommand,
    ) -> Result<(), DriverError> {
        let connection = self.connected().await?;

        let response = connection
            .request(
                CommandId::ChangeNetworkState,
                vec![target as u8],
                DEFAULT_TIMEOUT,
            )
            .await?;

        let status = Status::try_from(response.status).unwrap_or(Status::Error);
        if status != Status::Success {
            return Err(DriverError::DeviceError(status));
        }
        Ok(())
    }

    /// Submit an APS data request and await the device's confirm.
    pub async fn enqueue_send_data_request(
        &self,
        request: ApsDataRequest,
    ) -> Result<(), DriverError> {
        let connection = self.connected().await?;
        let payload = request.serialize()?;

        tracing::debug!(
            "APS request id={} cluster={:#06x} profile={:#06x} dest={:?}/{:?}",
            request.request_id,
            request.cluster_id,
            request.profile_id,
            request.dest_addr16,
            request.dest_addr64,
        );

        let timeout = if request.timeout_secs == 0 {
            DEFAULT_TIMEOUT
        } else {
            Duration::from_secs(u64::from(request.timeout_secs))
        };

        let response = connection
            .request(CommandId::ApsDataRequest, payload, timeout)
            .await?;

        let status = Status::try_from(response.status).unwrap_or(Status::Error);
        if status != Status::Success {
            return Err(DriverError::DeviceError(status));
        }
        Ok(())
    }
}
