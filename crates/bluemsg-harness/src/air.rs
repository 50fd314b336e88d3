//! Simulated Air
//!
//! An in-process stand-in for the radio medium. Every `SimRadio` attached to
//! the same `SimulatedAir` can scan for and dial the others; connections are
//! in-memory duplex pipes, so both ends behave like real byte streams
//! (partial reads, EOF on close).

use bluemsg_core::{
    internal::create_discovery_channel, ChannelConfig, ListenHandle, PeerAddress, PeerDevice, Radio, RadioConnection, RadioKind, RadioStream, ServiceRecord,
    TransportError,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, trace};
use uuid::Uuid;

/// Bytes buffered in each direction of a simulated connection
const DUPLEX_BUFFER: usize = 64 * 1024;

/// Delay between two sightings of one simulated scan
const SIGHTING_INTERVAL: Duration = Duration::from_millis(5);

// ----------------------------------------------------------------------------
// Simulated Air
// ----------------------------------------------------------------------------

/// Shared medium connecting simulated radios
#[derive(Clone, Default)]
pub struct SimulatedAir {
    state: Arc<Mutex<AirState>>,
}

#[derive(Default)]
struct AirState {
    devices: HashMap<PeerAddress, DeviceState>,
}

#[derive(Default)]
struct DeviceState {
    name: Option<String>,
    listeners: HashMap<Uuid, mpsc::Sender<RadioConnection>>,
    discoverable_until: Option<Instant>,
    always_visible: bool,
    scripted_sightings: Option<Vec<PeerDevice>>,
    dial_gate: Option<Arc<Semaphore>>,
    listen_failure: Option<String>,
    scan_failure: Option<String>,
    scan_task: Option<AbortHandle>,
    stats: SimRadioStats,
}

/// Counters of radio operations performed by one simulated device
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimRadioStats {
    pub listens: u64,
    pub dials: u64,
    pub scans: u64,
    pub discovery_cancels: u64,
}

impl SimulatedAir {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a device with a random synthetic MAC address
    pub fn add_device(&self, name: Option<&str>) -> SimRadio {
        let address = {
            let state = self.lock();
            loop {
                let candidate = random_address();
                if !state.devices.contains_key(&candidate) {
                    break candidate;
                }
            }
        };
        self.add_device_at(address, name)
    }

    /// Attach a device at a fixed address
    pub fn add_device_at<A: Into<PeerAddress>>(&self, address: A, name: Option<&str>) -> SimRadio {
        let address = address.into();
        let device = DeviceState {
            name: name.map(str::to_string),
            ..DeviceState::default()
        };
        self.lock().devices.insert(address.clone(), device);
        debug!("Simulated device {} joined the air", address);
        SimRadio {
            air: self.clone(),
            address,
        }
    }

    /// Peer record for an attached device, as other devices would see it
    pub fn peer(&self, address: &PeerAddress) -> Option<PeerDevice> {
        self.lock().peer(address)
    }

    fn lock(&self) -> MutexGuard<'_, AirState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl AirState {
    fn device_mut(&mut self, address: &PeerAddress) -> Result<&mut DeviceState, TransportError> {
        self.devices
            .get_mut(address)
            .ok_or_else(|| TransportError::unavailable(format!("device {} is not on the air", address)))
    }

    fn peer(&self, address: &PeerAddress) -> Option<PeerDevice> {
        self.devices
            .get(address)
            .map(|device| PeerDevice::new(address.clone(), device.name.clone()))
    }

    /// What a scan from `scanner` sees right now, ordered by address
    fn sightings_for(&self, scanner: &PeerAddress, now: Instant) -> Vec<PeerDevice> {
        if let Some(script) = self.devices.get(scanner).and_then(|d| d.scripted_sightings.clone()) {
            return script;
        }
        let mut visible: Vec<PeerDevice> = self
            .devices
            .iter()
            .filter(|(address, _)| *address != scanner)
            .filter(|(_, device)| device.always_visible || device.discoverable_until.is_some_and(|until| until > now))
            .map(|(address, device)| PeerDevice::new(address.clone(), device.name.clone()))
            .collect();
        visible.sort_by(|a, b| a.address.cmp(&b.address));
        visible
    }
}

fn random_address() -> PeerAddress {
    let octets: Vec<String> = (0..6).map(|_| format!("{:02X}", fastrand::u8(..))).collect();
    PeerAddress::new(octets.join(":"))
}

// ----------------------------------------------------------------------------
// Simulated Radio
// ----------------------------------------------------------------------------

/// One device on a `SimulatedAir`
#[derive(Clone)]
pub struct SimRadio {
    air: SimulatedAir,
    address: PeerAddress,
}

impl SimRadio {
    pub fn address(&self) -> &PeerAddress {
        &self.address
    }

    /// This device as other devices see it
    pub fn peer(&self) -> PeerDevice {
        self.air
            .peer(&self.address)
            .unwrap_or_else(|| PeerDevice::new(self.address.clone(), None))
    }

    /// Show up in every scan regardless of discoverability
    pub fn set_visible(&self, visible: bool) {
        if let Ok(device) = self.air.lock().device_mut(&self.address) {
            device.always_visible = visible;
        }
    }

    /// Replace what this device's scans report, duplicates included
    pub fn script_scan(&self, sightings: Vec<PeerDevice>) {
        if let Ok(device) = self.air.lock().device_mut(&self.address) {
            device.scripted_sightings = Some(sightings);
        }
    }

    /// Block this device's dials until `release_dials`
    pub fn hold_dials(&self) {
        if let Ok(device) = self.air.lock().device_mut(&self.address) {
            device.dial_gate = Some(Arc::new(Semaphore::new(0)));
        }
    }

    /// Let held and future dials proceed
    pub fn release_dials(&self) {
        if let Ok(device) = self.air.lock().device_mut(&self.address) {
            if let Some(gate) = device.dial_gate.take() {
                gate.close();
            }
        }
    }

    /// Make the next `listen` fail
    pub fn fail_next_listen<R: Into<String>>(&self, reason: R) {
        if let Ok(device) = self.air.lock().device_mut(&self.address) {
            device.listen_failure = Some(reason.into());
        }
    }

    /// Make the next `discover` fail
    pub fn fail_next_scan<R: Into<String>>(&self, reason: R) {
        if let Ok(device) = self.air.lock().device_mut(&self.address) {
            device.scan_failure = Some(reason.into());
        }
    }

    /// Whether the service is currently registered on this device
    pub fn is_listening(&self, service: &ServiceRecord) -> bool {
        self.air
            .lock()
            .devices
            .get(&self.address)
            .and_then(|device| device.listeners.get(&service.uuid))
            .is_some_and(|inbound| !inbound.is_closed())
    }

    pub fn stats(&self) -> SimRadioStats {
        self.air
            .lock()
            .devices
            .get(&self.address)
            .map(|device| device.stats.clone())
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for SimRadio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimRadio").field("address", &self.address).finish()
    }
}

#[async_trait::async_trait]
impl Radio for SimRadio {
    async fn listen(&self, service: &ServiceRecord) -> Result<Box<dyn ListenHandle>, TransportError> {
        let mut air = self.air.lock();
        let device = air.device_mut(&self.address)?;
        device.stats.listens += 1;
        if let Some(reason) = device.listen_failure.take() {
            return Err(TransportError::unavailable(reason));
        }
        if device
            .listeners
            .get(&service.uuid)
            .is_some_and(|inbound| !inbound.is_closed())
        {
            return Err(TransportError::unavailable(format!("service {} already registered", service.name)));
        }

        let (sender, inbound) = mpsc::channel(1);
        device.listeners.insert(service.uuid, sender);
        trace!("{} registered {}", self.address, service.uuid);
        Ok(Box::new(SimListenHandle {
            air: self.air.clone(),
            address: self.address.clone(),
            uuid: service.uuid,
            inbound,
        }))
    }

    async fn dial(&self, peer: &PeerDevice, service: &ServiceRecord) -> Result<Box<dyn RadioStream>, TransportError> {
        let gate = self
            .air
            .lock()
            .devices
            .get(&self.address)
            .and_then(|device| device.dial_gate.clone());
        if let Some(gate) = gate {
            // Closing the gate releases every waiter with an error
            let _permit = gate.acquire().await;
        }

        let refused = |reason: &str| TransportError::ConnectRefused {
            address: peer.address.to_string(),
            reason: reason.to_string(),
        };

        let mut air = self.air.lock();
        let me = air
            .peer(&self.address)
            .ok_or_else(|| TransportError::unavailable("dialing device is not on the air"))?;
        air.device_mut(&self.address)?.stats.dials += 1;

        let target = air.devices.get(&peer.address).ok_or_else(|| refused("no such device"))?;
        let inbound = target
            .listeners
            .get(&service.uuid)
            .ok_or_else(|| refused("service not registered"))?;

        let (client, server) = tokio::io::duplex(DUPLEX_BUFFER);
        inbound
            .try_send(RadioConnection::new(me, Box::new(server)))
            .map_err(|_| refused("service not accepting connections"))?;
        debug!("{} connected to {}", self.address, peer.address);
        Ok(Box::new(client))
    }

    async fn discover(&self, window: Duration) -> Result<mpsc::Receiver<PeerDevice>, TransportError> {
        let mut air = self.air.lock();
        let sightings = air.sightings_for(&self.address, Instant::now());
        let device = air.device_mut(&self.address)?;
        device.stats.scans += 1;
        if let Some(reason) = device.scan_failure.take() {
            return Err(TransportError::unavailable(reason));
        }
        if let Some(previous) = device.scan_task.take() {
            previous.abort();
        }

        let (sender, receiver) = create_discovery_channel(&ChannelConfig::default());
        let task = tokio::spawn(async move {
            let deadline = Instant::now() + window;
            for peer in sightings {
                tokio::time::sleep(SIGHTING_INTERVAL).await;
                if sender.send(peer).await.is_err() {
                    return;
                }
            }
            tokio::time::sleep_until(deadline).await;
        });
        device.scan_task = Some(task.abort_handle());
        Ok(receiver)
    }

    async fn cancel_discovery(&self) {
        if let Ok(device) = self.air.lock().device_mut(&self.address) {
            device.stats.discovery_cancels += 1;
            if let Some(task) = device.scan_task.take() {
                task.abort();
            }
        }
    }

    async fn set_discoverable(&self, duration: Duration) -> Result<(), TransportError> {
        let mut air = self.air.lock();
        let device = air.device_mut(&self.address)?;
        device.discoverable_until = Some(Instant::now() + duration);
        Ok(())
    }

    fn radio_kind(&self) -> RadioKind {
        RadioKind::Simulated
    }
}

// ----------------------------------------------------------------------------
// Listen Handle
// ----------------------------------------------------------------------------

/// Registered service on a simulated device; unregisters on drop
struct SimListenHandle {
    air: SimulatedAir,
    address: PeerAddress,
    uuid: Uuid,
    inbound: mpsc::Receiver<RadioConnection>,
}

#[async_trait::async_trait]
impl ListenHandle for SimListenHandle {
    async fn accept(&mut self) -> Result<RadioConnection, TransportError> {
        self.inbound.recv().await.ok_or(TransportError::Closed)
    }
}

impl Drop for SimListenHandle {
    fn drop(&mut self) {
        self.inbound.close();
        // Connections queued but never accepted are dropped, so dialers see EOF
        while self.inbound.try_recv().is_ok() {}
        if let Ok(device) = self.air.lock().device_mut(&self.address) {
            if device.listeners.get(&self.uuid).is_some_and(|sender| sender.is_closed()) {
                device.listeners.remove(&self.uuid);
            }
        }
    }
}
