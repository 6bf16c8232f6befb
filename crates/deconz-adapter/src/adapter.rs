//! Adapter core: request dispatch, inbound correlation and startup
//! reconciliation for a deCONZ coordinator.

use crate::config::{channel_to_mask, Config};
use crate::directory::DeviceDirectory;
use crate::driver::Driver;
use crate::error::AdapterError;
use crate::events::{Event, PayloadAddress, ZclPayload};
use crate::pending::PendingRequests;
use crate::queue::{SubmitQueue, TX_OPTIONS_APS_ACK};
use crate::sequence::TransactionSequence;
use crate::waitress::{WaitFor, Waitress, ZclMatcher};
use crate::zcl::{ZclFrame, ZclHeader};
use deconz_driver::{
    mac_addr_array_to_string, mac_addr_string_to_array, AddressMode, ApsDataRequest, DriverEvent,
    FirmwareVersion, GpDataInd, NetworkStateCommand, Parameter, ReceivedDataResponse,
    DEFAULT_RADIUS, UNLIMITED_RADIUS,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// ZDP cluster identifiers
pub mod zdp {
    pub const NODE_DESC_REQ: u16 = 0x0002;
    pub const NODE_DESC_RSP: u16 = 0x8002;
    pub const SIMPLE_DESC_REQ: u16 = 0x0004;
    pub const SIMPLE_DESC_RSP: u16 = 0x8004;
    pub const ACTIVE_EP_REQ: u16 = 0x0005;
    pub const ACTIVE_EP_RSP: u16 = 0x8005;
    pub const DEVICE_ANNCE: u16 = 0x0013;
    pub const BIND_REQ: u16 = 0x0021;
    pub const BIND_RSP: u16 = 0x8021;
    pub const UNBIND_REQ: u16 = 0x0022;
    pub const UNBIND_RSP: u16 = 0x8022;
    pub const MGMT_LQI_REQ: u16 = 0x0031;
    pub const MGMT_LQI_RSP: u16 = 0x8031;
    pub const MGMT_RTG_REQ: u16 = 0x0032;
    pub const MGMT_RTG_RSP: u16 = 0x8032;
    pub const MGMT_LEAVE_REQ: u16 = 0x0034;
    pub const MGMT_LEAVE_RSP: u16 = 0x8034;
    pub const MGMT_PERMIT_JOINING_REQ: u16 = 0x0036;
}

/// ZDP device profile
pub const ZDP_PROFILE_ID: u16 = 0x0000;
/// Home Automation profile
pub const HA_PROFILE_ID: u16 = 0x0104;
/// Green-Power profile
pub const GP_PROFILE_ID: u16 = 0xA1E0;

/// Well-known Green-Power endpoint
pub const GP_ENDPOINT: u8 = 242;
/// Well-known Green-Power group
pub const GP_GROUP_ID: u16 = 0x0B84;
/// Green-Power cluster
pub const GP_CLUSTER_ID: u16 = 0x0021;

/// Dresden Elektronik manufacturer code
const COORDINATOR_MANUFACTURER_ID: u16 = 0x1135;

const ZDP_SEND_TIMEOUT_SECS: u16 = 30;
const PERMIT_JOIN_SEND_TIMEOUT_SECS: u16 = 5;
const WATCHDOG_TTL_SECS: u32 = 600;
const WATCHDOG_INTERVAL: Duration = Duration::from_secs(300);
const SWEEP_INTERVAL: Duration = Duration::from_secs(1);
const ENDPOINT_CHECK_DELAY: Duration = Duration::from_secs(3);
const NETWORK_SETTLE_DELAY: Duration = Duration::from_secs(2);

/// Clusters endpoint 1 of the coordinator must serve
const COORDINATOR_EP1_INPUT: [u16; 5] = [0x0000, 0x0006, 0x000A, 0x0019, 0x0501];
/// Clusters endpoint 1 of the coordinator must emit
const COORDINATOR_EP1_OUTPUT: [u16; 4] = [0x0001, 0x0020, 0x0500, 0x0502];

/// Stack endpoint descriptor for endpoint 1: slot, endpoint, profile,
/// device, version, then the input and output cluster lists. The stack
/// consumes it least-significant byte first, so it is reversed on write.
const COORDINATOR_ENDPOINT_DESCRIPTOR: [u8; 27] = [
    0x00, // descriptor slot
    0x01, // endpoint
    0x04, 0x01, // profile 0x0104
    0x05, 0x00, // device 0x0005
    0x00, // version
    0x05, // input cluster count
    0x00, 0x00, 0x06, 0x00, 0x0A, 0x00, 0x19, 0x00, 0x01, 0x05,
    0x04, // output cluster count
    0x01, 0x00, 0x20, 0x00, 0x00, 0x05, 0x02, 0x05,
];

/// Result of a successful `start`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartResult {
    Resumed,
}

impl std::fmt::Display for StartResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "resumed")
    }
}

/// Logical device type from the node descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceType {
    Coordinator,
    Router,
    EndDevice,
    Unknown,
}

/// Decoded ZDP node descriptor
#[derive(Debug, Clone)]
pub struct NodeDescriptor {
    pub device_type: DeviceType,
    pub manufacturer_code: u16,
}

/// One neighbor-table entry from a Mgmt_Lqi query
#[derive(Debug, Clone)]
pub struct Neighbor {
    pub network_address: u16,
    pub ieee_addr: String,
    pub relationship: u8,
    pub depth: u8,
    pub link_quality: u8,
}

/// Complete neighbor table
#[derive(Debug, Clone)]
pub struct Lqi {
    pub neighbors: Vec<Neighbor>,
}

/// Routing-table entry status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteStatus {
    Active,
    DiscoveryUnderway,
    DiscoveryFailed,
    Inactive,
    Reserved,
}

impl RouteStatus {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x07 {
            0 => RouteStatus::Active,
            1 => RouteStatus::DiscoveryUnderway,
            2 => RouteStatus::DiscoveryFailed,
            3 => RouteStatus::Inactive,
            _ => RouteStatus::Reserved,
        }
    }
}

/// One routing-table entry from a Mgmt_Rtg query
#[derive(Debug, Clone)]
pub struct RoutingEntry {
    pub destination_address: u16,
    pub status: RouteStatus,
    pub next_hop: u16,
}

/// Complete routing table
#[derive(Debug, Clone)]
pub struct RoutingTable {
    pub entries: Vec<RoutingEntry>,
}

/// Decoded ZDP simple descriptor
#[derive(Debug, Clone)]
pub struct SimpleDescriptor {
    pub endpoint_id: u8,
    pub profile_id: u16,
    pub device_id: u16,
    pub input_clusters: Vec<u16>,
    pub output_clusters: Vec<u16>,
}

/// Binding destination
#[derive(Debug, Clone)]
pub enum BindTarget {
    Endpoint { ieee_addr: String, endpoint: u8 },
    Group { group_id: u16 },
}

/// Coordinator endpoint description
#[derive(Debug, Clone)]
pub struct CoordinatorEndpoint {
    pub id: u8,
    pub profile_id: u16,
    pub device_id: u16,
    pub input_clusters: Vec<u16>,
    pub output_clusters: Vec<u16>,
}

/// Coordinator identity and endpoints
#[derive(Debug, Clone)]
pub struct Coordinator {
    pub network_address: u16,
    pub manufacturer_id: u16,
    pub ieee_addr: String,
    pub endpoints: Vec<CoordinatorEndpoint>,
}

/// Current network parameters read from the radio
#[derive(Debug, Clone)]
pub struct NetworkParameters {
    pub pan_id: u16,
    pub extended_pan_id: String,
    pub channel: u8,
}

struct Inner {
    driver: Arc<dyn Driver>,
    directory: Arc<dyn DeviceDirectory>,
    config: Config,
    sequence: TransactionSequence,
    queue: SubmitQueue,
    pending: PendingRequests,
    waitress: Arc<Waitress>,
    events: broadcast::Sender<Event>,
    join_permitted: AtomicBool,
    tx_options: u8,
    version_cache: Mutex<Option<FirmwareVersion>>,
    tasks: StdMutex<Vec<JoinHandle<()>>>,
}

/// Host-side adapter for a deCONZ coordinator radio.
///
/// Cheap to clone; all state is shared behind the handle.
#[derive(Clone)]
pub struct Adapter {
    inner: Arc<Inner>,
}

impl Adapter {
    #[must_use]
    pub fn new(
        driver: Arc<dyn Driver>,
        directory: Arc<dyn DeviceDirectory>,
        config: Config,
    ) -> Self {
        let (events, _) = broadcast::channel(64);
        let queue = SubmitQueue::new(config.adapter.concurrent, config.adapter.delay_ms);
        let tx_options = SubmitQueue::default_tx_options(config.adapter.delay_ms);

        Self {
            inner: Arc::new(Inner {
                driver,
                directory,
                config,
                sequence: TransactionSequence::new(),
                queue,
                pending: PendingRequests::new(),
                waitress: Arc::new(Waitress::new()),
                events,
                join_permitted: AtomicBool::new(false),
                tx_options,
                version_cache: Mutex::new(None),
                tasks: StdMutex::new(Vec::new()),
            }),
        }
    }

    /// Subscribe to adapter events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.inner.events.subscribe()
    }

    /// Open the radio, reconcile network parameters and start the
    /// background tasks.
    pub async fn start(&self) -> Result<StartResult, AdapterError> {
        self.inner
            .driver
            .open(self.inner.config.serial_port.baud_rate)
            .await?;

        self.spawn_inbound_router();
        self.spawn_sweeper();

        if self.reconcile_network_parameters().await {
            tracing::info!("Network parameters changed, restarting network");
            if let Err(e) = self
                .inner
                .driver
                .change_network_state(NetworkStateCommand::Offline)
                .await
            {
                tracing::debug!("Failed to take network offline: {}", e);
            }
            tokio::time::sleep(NETWORK_SETTLE_DELAY).await;
            if let Err(e) = self
                .inner
                .driver
                .change_network_state(NetworkStateCommand::Connected)
                .await
            {
                tracing::debug!("Failed to bring network online: {}", e);
            }
            tokio::time::sleep(NETWORK_SETTLE_DELAY).await;
        }

        self.spawn_endpoint_installer();
        self.spawn_watchdog();

        Ok(StartResult::Resumed)
    }

    /// Stop the background tasks and close the radio.
    pub async fn stop(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut tasks = self
                .inner
                .tasks
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            tasks.drain(..).collect()
        };
        for handle in handles {
            handle.abort();
        }
        self.inner.driver.close().await;
    }

    fn track(&self, handle: JoinHandle<()>) {
        self.inner
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle);
    }

    fn next_sequence(&self) -> u8 {
        self.inner.sequence.next()
    }

    /// Submit without awaiting the transmit confirm; used when the
    /// semantic reply is a correlated indication registered beforehand.
    fn submit_detached(&self, request: ApsDataRequest) {
        let adapter = self.clone();
        tokio::spawn(async move {
            let submit = adapter.inner.driver.enqueue_send_data_request(request);
            if let Err(e) = adapter.inner.queue.run(submit).await {
                tracing::debug!("APS submit failed: {}", e);
            }
        });
    }

    /// Submit and await the transmit confirm.
    async fn submit(&self, request: ApsDataRequest) -> Result<(), AdapterError> {
        let submit = self.inner.driver.enqueue_send_data_request(request);
        self.inner.queue.run(submit).await?;
        Ok(())
    }

    fn zdp_request(&self, network_address: u16, cluster_id: u16, asdu: Vec<u8>) -> ApsDataRequest {
        ApsDataRequest {
            request_id: asdu[0],
            dest_addr_mode: AddressMode::Nwk,
            dest_addr16: Some(network_address),
            dest_addr64: None,
            dest_endpoint: Some(0),
            profile_id: ZDP_PROFILE_ID,
            cluster_id,
            src_endpoint: 0,
            asdu,
            tx_options: 0,
            radius: DEFAULT_RADIUS,
            timeout_secs: ZDP_SEND_TIMEOUT_SECS,
        }
    }

    /// Issue a ZDP request and await the correlated response cluster.
    async fn zdp_query(
        &self,
        network_address: u16,
        request_cluster: u16,
        response_cluster: u16,
        asdu: Vec<u8>,
        tx_options: u8,
    ) -> Result<ReceivedDataResponse, AdapterError> {
        let mut request = self.zdp_request(network_address, request_cluster, asdu);
        request.tx_options = tx_options;

        // Register before submitting so the reply cannot race us.
        let rx = self
            .inner
            .pending
            .register(network_address, ZDP_PROFILE_ID, response_cluster, None, None)
            .await;
        self.submit_detached(request);

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(AdapterError::ResponseTimeout),
        }
    }

    /// Permit (or deny, with zero seconds) joining for the given duration.
    ///
    /// Retries until the coordinator accepts the request.
    pub async fn permit_join(
        &self,
        seconds: u8,
        network_address: Option<u16>,
    ) -> Result<(), AdapterError> {
        loop {
            match self.try_permit_join(seconds, network_address).await {
                Ok(()) => break,
                Err(e) => {
                    tracing::debug!("permitJoin failed, retrying: {}", e);
                }
            }
        }
        self.inner
            .join_permitted
            .store(seconds > 0, Ordering::SeqCst);
        Ok(())
    }

    async fn try_permit_join(
        &self,
        seconds: u8,
        network_address: Option<u16>,
    ) -> Result<(), AdapterError> {
        let tsn = self.next_sequence();
        // tc_significance stays zero
        let asdu = vec![tsn, seconds, 0];
        let mut request = self.zdp_request(
            network_address.unwrap_or(0xFFFC),
            zdp::MGMT_PERMIT_JOINING_REQ,
            asdu,
        );
        request.timeout_secs = PERMIT_JOIN_SEND_TIMEOUT_SECS;

        self.submit(request).await?;
        self.inner
            .driver
            .write_parameter(Parameter::PermitJoin, &[seconds])
            .await?;
        tracing::info!("Permit join for {}s", seconds);
        Ok(())
    }

    /// Query the ZDP node descriptor.
    pub async fn node_descriptor(
        &self,
        network_address: u16,
    ) -> Result<NodeDescriptor, AdapterError> {
        let tsn = self.next_sequence();
        let mut asdu = vec![tsn];
        asdu.extend_from_slice(&network_address.to_le_bytes());

        let response = self
            .zdp_query(network_address, zdp::NODE_DESC_REQ, zdp::NODE_DESC_RSP, asdu, 0)
            .await?;
        let data = &response.asdu;

        zdp_status(data)?;
        if data.len() < 9 {
            return Err(AdapterError::InvalidResponse(format!(
                "node descriptor too short: {} bytes",
                data.len()
            )));
        }

        let device_type = match data[4] & 0x07 {
            0 => DeviceType::Coordinator,
            1 => DeviceType::Router,
            2 => DeviceType::EndDevice,
            _ => DeviceType::Unknown,
        };
        let manufacturer_code = u16::from_le_bytes([data[7], data[8]]);

        tracing::debug!(
            "Node descriptor {:#06x}: {:?} manufacturer={:#06x}",
            network_address,
            device_type,
            manufacturer_code
        );
        Ok(NodeDescriptor {
            device_type,
            manufacturer_code,
        })
    }

    /// Query the active endpoints of a device.
    pub async fn active_endpoints(&self, network_address: u16) -> Result<Vec<u8>, AdapterError> {
        let tsn = self.next_sequence();
        let mut asdu = vec![tsn];
        asdu.extend_from_slice(&network_address.to_le_bytes());

        let response = self
            .zdp_query(network_address, zdp::ACTIVE_EP_REQ, zdp::ACTIVE_EP_RSP, asdu, 0)
            .await?;
        let data = &response.asdu;

        zdp_status(data)?;
        if data.len() < 5 {
            return Err(AdapterError::InvalidResponse(format!(
                "active endpoints response too short: {} bytes",
                data.len()
            )));
        }

        let count = data[4] as usize;
        if data.len() < 5 + count {
            return Err(AdapterError::InvalidResponse(
                "truncated endpoint list".to_string(),
            ));
        }
        Ok(data[5..5 + count].to_vec())
    }

    /// Query the simple descriptor of one endpoint.
    pub async fn simple_descriptor(
        &self,
        network_address: u16,
        endpoint: u8,
    ) -> Result<SimpleDescriptor, AdapterError> {
        let tsn = self.next_sequence();
        let mut asdu = vec![tsn];
        asdu.extend_from_slice(&network_address.to_le_bytes());
        asdu.push(endpoint);

        let response = self
            .zdp_query(
                network_address,
                zdp::SIMPLE_DESC_REQ,
                zdp::SIMPLE_DESC_RSP,
                asdu,
                0,
            )
            .await?;
        let data = &response.asdu;

        zdp_status(data)?;
        if data.len() < 12 {
            return Err(AdapterError::InvalidResponse(format!(
                "simple descriptor too short: {} bytes",
                data.len()
            )));
        }

        let endpoint_id = data[5];
        let profile_id = u16::from_le_bytes([data[6], data[7]]);
        let device_id = u16::from_le_bytes([data[8], data[9]]);

        let in_count = data[11] as usize;
        let out_count_idx = 12 + 2 * in_count;
        if data.len() < out_count_idx + 1 {
            return Err(AdapterError::InvalidResponse(
                "truncated input cluster list".to_string(),
            ));
        }
        let mut input_clusters = Vec::with_capacity(in_count);
        for i in 0..in_count {
            let idx = 12 + 2 * i;
            input_clusters.push(u16::from_le_bytes([data[idx], data[idx + 1]]));
        }

        let out_count = data[out_count_idx] as usize;
        if data.len() < out_count_idx + 1 + 2 * out_count {
            return Err(AdapterError::InvalidResponse(
                "truncated output cluster list".to_string(),
            ));
        }
        let mut output_clusters = Vec::with_capacity(out_count);
        for i in 0..out_count {
            let idx = out_count_idx + 1 + 2 * i;
            output_clusters.push(u16::from_le_bytes([data[idx], data[idx + 1]]));
        }

        Ok(SimpleDescriptor {
            endpoint_id,
            profile_id,
            device_id,
            input_clusters,
            output_clusters,
        })
    }

    /// Read the complete neighbor table, paging until the reported total
    /// is reached. Pages are fetched strictly serially.
    pub async fn lqi(&self, network_address: u16) -> Result<Lqi, AdapterError> {
        let mut neighbors: Vec<Neighbor> = Vec::new();
        loop {
            let start_index = neighbors.len() as u8;
            let tsn = self.next_sequence();
            let asdu = vec![tsn, start_index];

            let response = self
                .zdp_query(network_address, zdp::MGMT_LQI_REQ, zdp::MGMT_LQI_RSP, asdu, 0)
                .await?;
            let data = &response.asdu;

            zdp_status(data)?;
            if data.len() < 5 {
                return Err(AdapterError::InvalidResponse(format!(
                    "neighbor table response too short: {} bytes",
                    data.len()
                )));
            }

            let total = data[2] as usize;
            let count = data[4] as usize;
            if data.len() < 5 + count * 22 {
                return Err(AdapterError::InvalidResponse(
                    "truncated neighbor table entries".to_string(),
                ));
            }

            for i in 0..count {
                let entry = &data[5 + i * 22..5 + (i + 1) * 22];
                let mut ieee = [0u8; 8];
                ieee.copy_from_slice(&entry[8..16]);
                neighbors.push(Neighbor {
                    network_address: u16::from_le_bytes([entry[16], entry[17]]),
                    ieee_addr: mac_addr_array_to_string(&ieee),
                    relationship: (entry[18] >> 1) & 0x07,
                    depth: entry[20],
                    link_quality: entry[21],
                });
            }

            if neighbors.len() >= total || count == 0 {
                break;
            }
        }
        Ok(Lqi { neighbors })
    }

    /// Read the complete routing table, paging like `lqi`.
    pub async fn routing_table(&self, network_address: u16) -> Result<RoutingTable, AdapterError> {
        let mut entries: Vec<RoutingEntry> = Vec::new();
        loop {
            let start_index = entries.len() as u8;
            let tsn = self.next_sequence();
            let asdu = vec![tsn, start_index];

            let response = self
                .zdp_query(network_address, zdp::MGMT_RTG_REQ, zdp::MGMT_RTG_RSP, asdu, 0)
                .await?;
            let data = &response.asdu;

            zdp_status(data)?;
            if data.len() < 5 {
                return Err(AdapterError::InvalidResponse(format!(
                    "routing table response too short: {} bytes",
                    data.len()
                )));
            }

            let total = data[2] as usize;
            let count = data[4] as usize;
            if data.len() < 5 + count * 5 {
                return Err(AdapterError::InvalidResponse(
                    "truncated routing table entries".to_string(),
                ));
            }

            for i in 0..count {
                let entry = &data[5 + i * 5..5 + (i + 1) * 5];
                entries.push(RoutingEntry {
                    destination_address: u16::from_le_bytes([entry[0], entry[1]]),
                    status: RouteStatus::from_bits((entry[2] >> 5) & 0x07),
                    next_hop: u16::from_le_bytes([entry[3], entry[4]]),
                });
            }

            if entries.len() >= total || count == 0 {
                break;
            }
        }
        Ok(RoutingTable { entries })
    }

    /// Create a binding on a remote device.
    pub async fn bind(
        &self,
        destination_network_address: u16,
        source_ieee_addr: &str,
        source_endpoint: u8,
        cluster_id: u16,
        target: &BindTarget,
    ) -> Result<(), AdapterError> {
        self.bind_or_unbind(
            zdp::BIND_REQ,
            zdp::BIND_RSP,
            destination_network_address,
            source_ieee_addr,
            source_endpoint,
            cluster_id,
            target,
        )
        .await
    }

    /// Remove a binding from a remote device.
    pub async fn unbind(
        &self,
        destination_network_address: u16,
        source_ieee_addr: &str,
        source_endpoint: u8,
        cluster_id: u16,
        target: &BindTarget,
    ) -> Result<(), AdapterError> {
        self.bind_or_unbind(
            zdp::UNBIND_REQ,
            zdp::UNBIND_RSP,
            destination_network_address,
            source_ieee_addr,
            source_endpoint,
            cluster_id,
            target,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn bind_or_unbind(
        &self,
        request_cluster: u16,
        response_cluster: u16,
        destination_network_address: u16,
        source_ieee_addr: &str,
        source_endpoint: u8,
        cluster_id: u16,
        target: &BindTarget,
    ) -> Result<(), AdapterError> {
        let tsn = self.next_sequence();
        let source_ieee = mac_addr_string_to_array(source_ieee_addr)?;

        let mut asdu = vec![tsn];
        asdu.extend_from_slice(&source_ieee);
        asdu.push(source_endpoint);
        asdu.extend_from_slice(&cluster_id.to_le_bytes());
        match target {
            BindTarget::Group { group_id } => {
                asdu.push(AddressMode::Group as u8);
                asdu.extend_from_slice(&group_id.to_le_bytes());
            }
            BindTarget::Endpoint {
                ieee_addr,
                endpoint,
            } => {
                asdu.push(AddressMode::Ieee as u8);
                asdu.extend_from_slice(&mac_addr_string_to_array(ieee_addr)?);
                asdu.push(*endpoint);
            }
        }

        // Bind management always requests an APS ACK
        let response = self
            .zdp_query(
                destination_network_address,
                request_cluster,
                response_cluster,
                asdu,
                TX_OPTIONS_APS_ACK,
            )
            .await?;
        zdp_status(&response.asdu)
    }

    /// Ask a device to leave the network.
    pub async fn remove_device(
        &self,
        network_address: u16,
        ieee_addr: &str,
    ) -> Result<(), AdapterError> {
        let tsn = self.next_sequence();
        let mut asdu = vec![tsn];
        // The device IEEE field is sent zeroed; the stack resolves the
        // target from the NWK destination.
        asdu.extend_from_slice(&[0u8; 8]);
        asdu.push(0); // remove-children / rejoin flags

        let response = self
            .zdp_query(network_address, zdp::MGMT_LEAVE_REQ, zdp::MGMT_LEAVE_RSP, asdu, 0)
            .await?;
        zdp_status(&response.asdu)?;

        let _ = self.inner.events.send(Event::DeviceLeave {
            network_address,
            ieee_addr: ieee_addr.to_string(),
        });
        Ok(())
    }

    /// Send a ZCL frame to a device endpoint. When the command is answered
    /// by a declared response, responses are enabled and the frame does not
    /// suppress the default response, the correlated reply is awaited and
    /// returned.
    pub async fn send_zcl_frame_to_endpoint(
        &self,
        network_address: u16,
        endpoint: u8,
        frame: &ZclFrame,
        timeout: Duration,
        disable_response: bool,
        source_endpoint: Option<u8>,
    ) -> Result<Option<ZclPayload>, AdapterError> {
        let source_endpoint = source_endpoint.unwrap_or(1);
        let profile_id = if source_endpoint == GP_ENDPOINT && endpoint == GP_ENDPOINT {
            GP_PROFILE_ID
        } else {
            HA_PROFILE_ID
        };

        let request = ApsDataRequest {
            request_id: self.next_sequence(),
            dest_addr_mode: AddressMode::Nwk,
            dest_addr16: Some(network_address),
            dest_addr64: None,
            dest_endpoint: Some(endpoint),
            profile_id,
            cluster_id: frame.cluster_id,
            src_endpoint: source_endpoint,
            asdu: frame.to_bytes(),
            tx_options: self.inner.tx_options,
            radius: DEFAULT_RADIUS,
            timeout_secs: send_timeout_secs(timeout),
        };

        let await_response = frame.has_declared_response()
            && !disable_response
            && !frame.header.frame_control.disable_default_response;

        if await_response {
            let rx = self
                .inner
                .pending
                .register(
                    network_address,
                    HA_PROFILE_ID,
                    frame.cluster_id,
                    Some(frame.header.transaction_sequence_number),
                    Some(timeout),
                )
                .await;
            self.submit_detached(request);
            let response = match rx.await {
                Ok(result) => result?,
                Err(_) => return Err(AdapterError::ResponseTimeout),
            };
            Ok(make_zcl_payload(&response))
        } else {
            self.submit(request).await?;
            Ok(None)
        }
    }

    /// Send a ZCL frame to a group. Fire-and-forget.
    pub async fn send_zcl_frame_to_group(
        &self,
        group_id: u16,
        frame: &ZclFrame,
        source_endpoint: Option<u8>,
    ) -> Result<(), AdapterError> {
        let request = ApsDataRequest {
            request_id: self.next_sequence(),
            dest_addr_mode: AddressMode::Group,
            dest_addr16: Some(group_id),
            dest_addr64: None,
            dest_endpoint: None,
            profile_id: HA_PROFILE_ID,
            cluster_id: frame.cluster_id,
            src_endpoint: source_endpoint.unwrap_or(1),
            asdu: frame.to_bytes(),
            tx_options: 0,
            radius: UNLIMITED_RADIUS,
            timeout_secs: ZDP_SEND_TIMEOUT_SECS,
        };
        self.submit(request)
            .await
            .map_err(|e| AdapterError::Transport(format!("group send to {group_id:#06x}: {e}")))
    }

    /// Broadcast a ZCL frame. Fire-and-forget.
    pub async fn send_zcl_frame_to_all(
        &self,
        endpoint: u8,
        frame: &ZclFrame,
        source_endpoint: u8,
        destination: u16,
    ) -> Result<(), AdapterError> {
        let profile_id = if source_endpoint == GP_ENDPOINT && endpoint == GP_ENDPOINT {
            GP_PROFILE_ID
        } else {
            HA_PROFILE_ID
        };
        let request = ApsDataRequest {
            request_id: self.next_sequence(),
            dest_addr_mode: AddressMode::Broadcast,
            dest_addr16: Some(destination),
            dest_addr64: None,
            dest_endpoint: Some(endpoint),
            profile_id,
            cluster_id: frame.cluster_id,
            src_endpoint: source_endpoint,
            asdu: frame.to_bytes(),
            tx_options: 0,
            radius: UNLIMITED_RADIUS,
            timeout_secs: ZDP_SEND_TIMEOUT_SECS,
        };
        self.submit(request)
            .await
            .map_err(|e| AdapterError::Transport(format!("broadcast to {destination:#06x}: {e}")))
    }

    /// Register a future resolved by the next ZCL payload matching the
    /// given criteria. The handle supports cancellation.
    pub async fn wait_for(&self, matcher: ZclMatcher, timeout: Duration) -> WaitFor {
        self.inner.waitress.clone().wait_for(matcher, timeout).await
    }

    /// Identity and endpoint layout of the coordinator itself.
    pub async fn get_coordinator(&self) -> Result<Coordinator, AdapterError> {
        let mac = self.inner.driver.read_parameter(Parameter::MacAddress).await?;
        let ieee: [u8; 8] = mac.as_slice().try_into().map_err(|_| {
            AdapterError::InvalidResponse(format!("MAC address of {} bytes", mac.len()))
        })?;

        let nwk = self
            .inner
            .driver
            .read_parameter(Parameter::NwkAddress)
            .await?;
        if nwk.len() < 2 {
            return Err(AdapterError::InvalidResponse(
                "short network address read".to_string(),
            ));
        }

        Ok(Coordinator {
            network_address: u16::from_le_bytes([nwk[0], nwk[1]]),
            manufacturer_id: COORDINATOR_MANUFACTURER_ID,
            ieee_addr: mac_addr_array_to_string(&ieee),
            endpoints: coordinator_endpoints(),
        })
    }

    /// Firmware version, read once and cached.
    pub async fn get_coordinator_version(&self) -> Result<FirmwareVersion, AdapterError> {
        let mut cache = self.inner.version_cache.lock().await;
        if let Some(version) = *cache {
            return Ok(version);
        }
        let version = self.inner.driver.read_firmware_version().await?;
        *cache = Some(version);
        Ok(version)
    }

    /// Current network parameters from the radio.
    pub async fn get_network_parameters(&self) -> Result<NetworkParameters, AdapterError> {
        let pan = self.inner.driver.read_parameter(Parameter::NwkPanId).await?;
        if pan.len() < 2 {
            return Err(AdapterError::InvalidResponse("short PAN ID read".to_string()));
        }
        let pan_id = u16::from_le_bytes([pan[0], pan[1]]);

        let ext = self
            .inner
            .driver
            .read_parameter(Parameter::ApsExtendedPanId)
            .await?;
        let ext: [u8; 8] = ext.as_slice().try_into().map_err(|_| {
            AdapterError::InvalidResponse(format!("extended PAN ID of {} bytes", ext.len()))
        })?;

        let channel = self
            .inner
            .driver
            .read_parameter(Parameter::CurrentChannel)
            .await?;
        let channel = channel.first().copied().ok_or_else(|| {
            AdapterError::InvalidResponse("empty channel read".to_string())
        })?;

        Ok(NetworkParameters {
            pan_id,
            extended_pan_id: mac_addr_array_to_string(&ext),
            channel,
        })
    }

    /// Backups are not implemented for this coordinator.
    #[must_use]
    pub fn supports_backup(&self) -> bool {
        false
    }

    pub async fn backup(&self) -> Result<(), AdapterError> {
        Err(AdapterError::NotSupported)
    }

    pub async fn reset(&self) -> Result<(), AdapterError> {
        Err(AdapterError::NotSupported)
    }

    pub async fn add_install_code(
        &self,
        _ieee_addr: &str,
        _key: &[u8],
    ) -> Result<(), AdapterError> {
        Err(AdapterError::NotSupported)
    }

    pub async fn change_channel(&self, _channel: u8) -> Result<(), AdapterError> {
        Err(AdapterError::NotSupported)
    }

    pub async fn set_transmit_power(&self, _value: i8) -> Result<(), AdapterError> {
        Err(AdapterError::NotSupported)
    }

    pub async fn set_channel_inter_pan(&self, _channel: u8) -> Result<(), AdapterError> {
        Err(AdapterError::NotSupported)
    }

    pub async fn send_zcl_frame_inter_pan(
        &self,
        _frame: &ZclFrame,
        _ieee_addr: Option<&str>,
    ) -> Result<(), AdapterError> {
        Err(AdapterError::NotSupported)
    }

    pub async fn restore_channel_inter_pan(&self) -> Result<(), AdapterError> {
        Err(AdapterError::NotSupported)
    }

    /// Compare the radio's network parameters against the desired
    /// configuration and write the deltas. Returns whether anything
    /// changed. Failed writes are logged and swallowed; the device may
    /// already be operational.
    async fn reconcile_network_parameters(&self) -> bool {
        let desired = self.inner.config.network.clone();
        let driver = &self.inner.driver;
        let mut changed = false;

        match driver.read_parameter(Parameter::NwkPanId).await {
            Ok(value) if value.len() >= 2 => {
                let current = u16::from_le_bytes([value[0], value[1]]);
                if current != desired.pan_id {
                    tracing::info!("PAN ID {:#06x} -> {:#06x}", current, desired.pan_id);
                    changed = true;
                    if let Err(e) = driver
                        .write_parameter(Parameter::NwkPanId, &desired.pan_id.to_le_bytes())
                        .await
                    {
                        tracing::debug!("Failed to write PAN ID: {}", e);
                    }
                }
            }
            Ok(_) => tracing::debug!("Short PAN ID read"),
            Err(e) => tracing::debug!("Failed to read PAN ID: {}", e),
        }

        match driver.read_parameter(Parameter::ApsExtendedPanId).await {
            Ok(value) if value.as_slice() != desired.extended_pan_id.as_slice() => {
                tracing::info!("Extended PAN ID differs, rewriting");
                changed = true;
                if let Err(e) = driver
                    .write_parameter(Parameter::ApsExtendedPanId, &desired.extended_pan_id)
                    .await
                {
                    tracing::debug!("Failed to write extended PAN ID: {}", e);
                }
            }
            Ok(_) => {}
            Err(e) => tracing::debug!("Failed to read extended PAN ID: {}", e),
        }

        match driver.read_parameter(Parameter::CurrentChannel).await {
            Ok(value) if !value.is_empty() => {
                let current = value[0];
                let wanted = desired.channel();
                if current != wanted {
                    tracing::info!("Channel {} -> {}", current, wanted);
                    changed = true;
                    let mask = channel_to_mask(wanted);
                    if let Err(e) = driver
                        .write_parameter(Parameter::ChannelMask, &mask.to_le_bytes())
                        .await
                    {
                        tracing::debug!("Failed to write channel mask: {}", e);
                    }
                }
            }
            Ok(_) => tracing::debug!("Empty channel read"),
            Err(e) => tracing::debug!("Failed to read channel: {}", e),
        }

        match driver.read_parameter(Parameter::NetworkKey).await {
            Ok(value) if value.as_slice() != desired.network_key.as_slice() => {
                tracing::info!("Network key differs, rewriting");
                changed = true;
                if let Err(e) = driver
                    .write_parameter(Parameter::NetworkKey, &desired.network_key)
                    .await
                {
                    tracing::debug!("Failed to write network key: {}", e);
                }
            }
            Ok(_) => {}
            Err(e) => tracing::debug!("Failed to read network key: {}", e),
        }

        changed
    }

    fn spawn_inbound_router(&self) {
        let adapter = self.clone();
        let mut events = self.inner.driver.subscribe();
        let handle = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(DriverEvent::ReceivedDataPayload(response)) => {
                        adapter.handle_data_indication(response).await;
                    }
                    Ok(DriverEvent::ReceivedGreenPowerIndication(indication)) => {
                        adapter.handle_green_power(indication).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("Inbound router lagged by {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            tracing::debug!("Inbound router shutting down");
        });
        self.track(handle);
    }

    fn spawn_sweeper(&self) {
        let adapter = self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let now = tokio::time::Instant::now();
                let expired = adapter.inner.pending.sweep(now).await;
                if expired > 0 {
                    tracing::debug!("Expired {} pending requests", expired);
                }
                adapter.inner.waitress.sweep(now).await;
            }
        });
        self.track(handle);
    }

    fn spawn_endpoint_installer(&self) {
        let adapter = self.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(ENDPOINT_CHECK_DELAY).await;
            loop {
                match adapter.verify_coordinator_endpoint().await {
                    Ok(true) => {
                        tracing::debug!("Coordinator endpoint descriptor verified");
                        break;
                    }
                    Ok(false) => {
                        tracing::info!("Rewriting coordinator endpoint descriptor");
                        let mut descriptor = COORDINATOR_ENDPOINT_DESCRIPTOR;
                        descriptor.reverse();
                        if let Err(e) = adapter
                            .inner
                            .driver
                            .write_parameter(Parameter::Endpoint, &descriptor)
                            .await
                        {
                            tracing::debug!("Failed to write endpoint descriptor: {}", e);
                        }
                    }
                    Err(e) => {
                        tracing::debug!("Coordinator endpoint check failed: {}", e);
                    }
                }
                tokio::time::sleep(ENDPOINT_CHECK_DELAY).await;
            }
        });
        self.track(handle);
    }

    fn spawn_watchdog(&self) {
        let adapter = self.clone();
        let handle = tokio::spawn(async move {
            loop {
                if let Err(e) = adapter
                    .inner
                    .driver
                    .write_parameter(Parameter::WatchdogTtl, &WATCHDOG_TTL_SECS.to_le_bytes())
                    .await
                {
                    tracing::debug!("Failed to arm watchdog: {}", e);
                }
                tokio::time::sleep(WATCHDOG_INTERVAL).await;
            }
        });
        self.track(handle);
    }

    async fn verify_coordinator_endpoint(&self) -> Result<bool, AdapterError> {
        let descriptor = self.simple_descriptor(0x0000, 1).await?;
        let ok = COORDINATOR_EP1_INPUT
            .iter()
            .all(|cluster| descriptor.input_clusters.contains(cluster))
            && COORDINATOR_EP1_OUTPUT
                .iter()
                .all(|cluster| descriptor.output_clusters.contains(cluster));
        Ok(ok)
    }

    async fn handle_data_indication(&self, mut response: ReceivedDataResponse) {
        // Normalize: recover the short address when the radio delivered
        // only the IEEE address.
        if response.src_addr16.is_none() {
            let Some(ieee) = response.src_addr64 else {
                debug_assert!(false, "indication without any source address");
                tracing::error!("Dropping indication without source address");
                return;
            };
            match self.inner.directory.short_address(&ieee) {
                Some(network_address) => response.src_addr16 = Some(network_address),
                None => {
                    debug_assert!(false, "unresolvable source IEEE address");
                    tracing::error!(
                        "Dropping indication from unknown device {}",
                        mac_addr_array_to_string(&ieee)
                    );
                    return;
                }
            }
        }

        // Non-ZDP traffic needs a parseable ZCL header for correlation
        // and for the payload surface; drop anything else.
        let header_tsn = if response.profile_id != ZDP_PROFILE_ID {
            match ZclHeader::parse(&response.asdu) {
                Ok(header) => Some(header.transaction_sequence_number),
                Err(e) => {
                    debug_assert!(false, "unparseable ZCL header in indication");
                    tracing::error!("Dropping indication with unparseable ZCL header: {}", e);
                    return;
                }
            }
        } else {
            None
        };

        self.inner.pending.resolve(&response, header_tsn).await;

        if response.profile_id == ZDP_PROFILE_ID && response.cluster_id == zdp::DEVICE_ANNCE {
            self.handle_device_announcement(&response.asdu);
        }

        if response.profile_id != ZDP_PROFILE_ID {
            if let Some(payload) = make_zcl_payload(&response) {
                // Waiters get first pick; listeners always see the payload.
                self.inner.waitress.resolve(&payload).await;
                let _ = self.inner.events.send(Event::ZclPayload(payload));
            }
        }
    }

    fn handle_device_announcement(&self, asdu: &[u8]) {
        if asdu.len() < 11 {
            tracing::warn!("Short device announcement: {} bytes", asdu.len());
            return;
        }
        let network_address = u16::from_le_bytes([asdu[1], asdu[2]]);
        let mut ieee = [0u8; 8];
        ieee.copy_from_slice(&asdu[3..11]);
        self.inner.directory.remember(ieee, network_address);

        let ieee_addr = mac_addr_array_to_string(&ieee);
        tracing::info!("Device announcement: {} at {:#06x}", ieee_addr, network_address);

        let event = if self.inner.join_permitted.load(Ordering::SeqCst) {
            Event::DeviceJoined {
                network_address,
                ieee_addr,
            }
        } else {
            Event::DeviceAnnounce {
                network_address,
                ieee_addr,
            }
        };
        let _ = self.inner.events.send(event);
    }

    async fn handle_green_power(&self, indication: GpDataInd) {
        // Wrap the command frame in a synthetic green-power notification
        let mut data = Vec::with_capacity(15 + indication.command_frame.len());
        data.push(0b0000_0001); // cluster-specific, client-to-server
        data.push(indication.seq_nr);
        data.push(0x00); // notification
        data.extend_from_slice(&0u16.to_le_bytes()); // options
        data.extend_from_slice(&indication.src_id.to_le_bytes());
        data.extend_from_slice(&indication.frame_counter.to_le_bytes());
        data.push(indication.command_id);
        data.push(indication.command_frame_size);
        data.extend_from_slice(&indication.command_frame);

        let header = ZclHeader::parse(&data).ok();
        let payload = ZclPayload {
            address: PayloadAddress::Nwk((indication.src_id & 0xFFFF) as u16),
            data,
            cluster_id: GP_CLUSTER_ID,
            header,
            endpoint: GP_ENDPOINT,
            linkquality: 0xFF,
            group_id: GP_GROUP_ID,
            was_broadcast: true,
            destination_endpoint: GP_ENDPOINT,
        };

        self.inner.waitress.resolve(&payload).await;
        let _ = self.inner.events.send(Event::ZclPayload(payload));
    }
}

fn send_timeout_secs(timeout: Duration) -> u16 {
    let secs = timeout.as_secs().max(1);
    u16::try_from(secs).unwrap_or(u16::MAX)
}

fn zdp_status(asdu: &[u8]) -> Result<(), AdapterError> {
    if asdu.len() < 2 {
        return Err(AdapterError::InvalidResponse(format!(
            "ZDP response too short: {} bytes",
            asdu.len()
        )));
    }
    if asdu[1] != 0 {
        return Err(AdapterError::Status(asdu[1]));
    }
    Ok(())
}

fn coordinator_endpoints() -> Vec<CoordinatorEndpoint> {
    vec![
        CoordinatorEndpoint {
            id: 1,
            profile_id: HA_PROFILE_ID,
            device_id: 0x0005,
            input_clusters: COORDINATOR_EP1_INPUT.to_vec(),
            output_clusters: COORDINATOR_EP1_OUTPUT.to_vec(),
        },
        CoordinatorEndpoint {
            id: GP_ENDPOINT,
            profile_id: GP_PROFILE_ID,
            device_id: 0x0064,
            input_clusters: Vec::new(),
            output_clusters: vec![GP_CLUSTER_ID],
        },
    ]
}

fn make_zcl_payload(response: &ReceivedDataResponse) -> Option<ZclPayload> {
    let address = if response.dest_addr_mode == AddressMode::Ieee {
        PayloadAddress::Ieee(mac_addr_array_to_string(&response.src_addr64?))
    } else {
        PayloadAddress::Nwk(response.src_addr16?)
    };

    Some(ZclPayload {
        address,
        data: response.asdu.clone(),
        cluster_id: response.cluster_id,
        header: ZclHeader::parse(&response.asdu).ok(),
        endpoint: response.src_endpoint,
        linkquality: response.lqi,
        group_id: if response.dest_addr_mode == AddressMode::Group {
            response.dest_addr16.unwrap_or(0)
        } else {
            0
        },
        was_broadcast: matches!(
            response.dest_addr_mode,
            AddressMode::Group | AddressMode::Broadcast
        ),
        destination_endpoint: response.dest_endpoint,
    })
}
