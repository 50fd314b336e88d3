//! LAN Radio
//!
//! Carries BlueMsg over a local network for machines without Bluetooth.
//! Discovery uses UDP probes answered by discoverable devices; sessions are
//! plain TCP streams that open with a service `Hello`. Peer addresses are
//! `ip:port` strings.

pub mod beacon;

use crate::config::LanRadioConfig;
use crate::error::RadioError;
use beacon::{decode_beacon, encode_beacon, read_hello, write_hello, Beacon, Hello, MAX_BEACON_SIZE};
use bluemsg_core::{
    internal::create_discovery_channel, Capabilities, ChannelConfig, ListenHandle, PeerDevice, Radio,
    RadioConnection, RadioKind, RadioStream, ServiceRecord, TransportError,
};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

/// How often an idle responder re-checks its discoverable window
const RESPONDER_POLL: Duration = Duration::from_millis(250);

// ----------------------------------------------------------------------------
// Shared State
// ----------------------------------------------------------------------------

#[derive(Default)]
struct LanState {
    /// Registered service and the TCP port it accepts on
    registration: Option<(Uuid, u16)>,
    discoverable_until: Option<Instant>,
    responder: Option<AbortHandle>,
    scan: Option<AbortHandle>,
}

#[derive(Clone, Default)]
struct SharedState(Arc<Mutex<LanState>>);

impl SharedState {
    fn lock(&self) -> MutexGuard<'_, LanState> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

// ----------------------------------------------------------------------------
// LAN Radio
// ----------------------------------------------------------------------------

/// Radio over UDP discovery and TCP streams
pub struct LanRadio {
    config: LanRadioConfig,
    device_id: Uuid,
    state: SharedState,
}

impl LanRadio {
    pub fn new(config: LanRadioConfig) -> Self {
        Self {
            config,
            device_id: Uuid::new_v4(),
            state: SharedState::default(),
        }
    }

    pub fn config(&self) -> &LanRadioConfig {
        &self.config
    }

    /// Identifier carried in this radio's beacons
    pub fn device_id(&self) -> Uuid {
        self.device_id
    }

    /// TCP port of the registered service, if any
    pub fn stream_port(&self) -> Option<u16> {
        self.state.lock().registration.map(|(_, port)| port)
    }

    /// Whether probes are answered right now
    pub fn is_discoverable(&self) -> bool {
        self.state
            .lock()
            .discoverable_until
            .is_some_and(|until| until > Instant::now())
    }

    /// Start the probe responder unless one is already running
    async fn ensure_responder(&self) -> Result<(), RadioError> {
        if self.state.lock().responder.as_ref().is_some_and(|task| !task.is_finished()) {
            return Ok(());
        }

        let socket = UdpSocket::bind((self.config.bind_address, self.config.discovery_port))
            .await
            .map_err(|e| {
                RadioError::RegistrationFailed(format!(
                    "discovery port {} unavailable: {}",
                    self.config.discovery_port, e
                ))
            })?;
        info!("LAN responder bound to {}", socket.local_addr()?);

        let task = tokio::spawn(run_responder(
            socket,
            self.state.clone(),
            self.device_id,
            self.config.device_name.clone(),
        ));
        self.state.lock().responder = Some(task.abort_handle());
        Ok(())
    }
}

impl Drop for LanRadio {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        if let Some(task) = state.responder.take() {
            task.abort();
        }
        if let Some(task) = state.scan.take() {
            task.abort();
        }
    }
}

#[async_trait::async_trait]
impl Radio for LanRadio {
    async fn listen(&self, service: &ServiceRecord) -> Result<Box<dyn ListenHandle>, TransportError> {
        if self.state.lock().registration.is_some() {
            return Err(TransportError::unavailable("service is already registered"));
        }

        let listener = TcpListener::bind((self.config.bind_address, self.config.stream_port))
            .await
            .map_err(|e| RadioError::RegistrationFailed(format!("{} ({})", service.name, e)))?;
        let port = listener.local_addr().map_err(RadioError::from)?.port();

        {
            let mut state = self.state.lock();
            if state.registration.is_some() {
                return Err(TransportError::unavailable("service is already registered"));
            }
            state.registration = Some((service.uuid, port));
        }
        info!("Service '{}' listening on TCP port {}", service.name, port);

        Ok(Box::new(LanListenHandle {
            listener,
            service: service.clone(),
            port,
            handshake_timeout: self.config.handshake_timeout,
            state: self.state.clone(),
        }))
    }

    async fn dial(&self, peer: &PeerDevice, service: &ServiceRecord) -> Result<Box<dyn RadioStream>, TransportError> {
        let address: SocketAddr = peer
            .address
            .as_str()
            .parse()
            .map_err(|_| RadioError::InvalidAddress(peer.address.to_string()))?;

        debug!("Dialing {} for '{}'", address, service.name);
        let mut stream = TcpStream::connect(address)
            .await
            .map_err(|e| RadioError::ConnectionFailed {
                address: address.to_string(),
                reason: e.to_string(),
            })?;
        if let Err(e) = stream.set_nodelay(true) {
            trace!("Could not disable Nagle on {}: {}", address, e);
        }

        let hello = Hello {
            service: service.uuid,
            name: self.config.device_name.clone(),
        };
        write_hello(&mut stream, &hello).await?;
        Ok(Box::new(stream))
    }

    async fn discover(&self, window: Duration) -> Result<mpsc::Receiver<PeerDevice>, TransportError> {
        let socket = UdpSocket::bind((self.config.bind_address, 0))
            .await
            .map_err(|e| RadioError::DiscoveryFailed(e.to_string()))?;
        socket
            .set_broadcast(true)
            .map_err(|e| RadioError::DiscoveryFailed(e.to_string()))?;

        let probe = encode_beacon(&Beacon::Probe {
            scanner: self.device_id,
        })?;
        let target = SocketAddr::from((self.config.probe_address, self.config.discovery_port));
        let (sender, receiver) = create_discovery_channel(&ChannelConfig::default());

        let task = tokio::spawn(run_scan(
            socket,
            probe,
            target,
            self.device_id,
            self.config.probe_interval,
            window,
            sender,
        ));
        if let Some(previous) = self.state.lock().scan.replace(task.abort_handle()) {
            previous.abort();
        }
        Ok(receiver)
    }

    async fn cancel_discovery(&self) {
        if let Some(scan) = self.state.lock().scan.take() {
            debug!("Cancelling LAN scan");
            scan.abort();
        }
    }

    async fn set_discoverable(&self, duration: Duration) -> Result<(), TransportError> {
        self.ensure_responder().await?;
        self.state.lock().discoverable_until = Some(Instant::now() + duration);
        info!("Answering discovery probes for {:?}", duration);
        Ok(())
    }

    fn radio_kind(&self) -> RadioKind {
        RadioKind::Lan
    }
}

// ----------------------------------------------------------------------------
// Background Tasks
// ----------------------------------------------------------------------------

async fn run_scan(
    socket: UdpSocket,
    probe: Vec<u8>,
    target: SocketAddr,
    device_id: Uuid,
    probe_interval: Duration,
    window: Duration,
    sender: mpsc::Sender<PeerDevice>,
) {
    let deadline = tokio::time::sleep(window);
    tokio::pin!(deadline);
    let mut ticker = tokio::time::interval(probe_interval);
    let mut buf = vec![0u8; MAX_BEACON_SIZE];

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = ticker.tick() => {
                if let Err(e) = socket.send_to(&probe, target).await {
                    warn!("Probe to {} failed: {}", target, e);
                }
            }
            received = socket.recv_from(&mut buf) => {
                let (len, from) = match received {
                    Ok(received) => received,
                    Err(e) => {
                        warn!("Scan socket error: {}", e);
                        break;
                    }
                };
                match decode_beacon(&buf[..len]) {
                    Ok(Some(Beacon::Announce { device, name, stream_port })) if device != device_id => {
                        let address = SocketAddr::new(from.ip(), stream_port);
                        trace!("Announce from {} ({:?})", address, name);
                        if sender.send(PeerDevice::new(address.to_string(), name)).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => debug!("Ignoring datagram from {}: {}", from, e),
                }
            }
        }
    }
    debug!("LAN scan window closed");
}

async fn run_responder(socket: UdpSocket, state: SharedState, device_id: Uuid, name: Option<String>) {
    let mut buf = vec![0u8; MAX_BEACON_SIZE];
    loop {
        let received = tokio::time::timeout(RESPONDER_POLL, socket.recv_from(&mut buf)).await;

        // Answer only while discoverable and with a service to offer
        let (port, expired) = {
            let state = state.lock();
            let expired = !state.discoverable_until.is_some_and(|until| until > Instant::now());
            (state.registration.map(|(_, port)| port), expired)
        };
        if expired {
            debug!("Discoverable window over, responder stopping");
            break;
        }

        let (len, from) = match received {
            Ok(Ok(received)) => received,
            Ok(Err(e)) => {
                warn!("Responder socket error: {}", e);
                break;
            }
            Err(_) => continue,
        };
        let Ok(Some(Beacon::Probe { scanner })) = decode_beacon(&buf[..len]) else {
            continue;
        };
        let Some(stream_port) = port else {
            trace!("Probe from {} ignored: no service registered", from);
            continue;
        };
        if scanner == device_id {
            continue;
        }

        let announce = Beacon::Announce {
            device: device_id,
            name: name.clone(),
            stream_port,
        };
        match encode_beacon(&announce) {
            Ok(frame) => {
                if let Err(e) = socket.send_to(&frame, from).await {
                    debug!("Announce to {} failed: {}", from, e);
                }
            }
            Err(e) => warn!("Failed to encode announce: {}", e),
        }
    }
}

// ----------------------------------------------------------------------------
// Listen Handle
// ----------------------------------------------------------------------------

/// Registered TCP endpoint; dropping it closes the port
pub struct LanListenHandle {
    listener: TcpListener,
    service: ServiceRecord,
    port: u16,
    handshake_timeout: Duration,
    state: SharedState,
}

#[async_trait::async_trait]
impl ListenHandle for LanListenHandle {
    async fn accept(&mut self) -> Result<RadioConnection, TransportError> {
        loop {
            let (mut stream, remote) = self.listener.accept().await.map_err(TransportError::Io)?;

            match tokio::time::timeout(self.handshake_timeout, read_hello(&mut stream)).await {
                Ok(Ok(hello)) if hello.service == self.service.uuid => {
                    if let Err(e) = stream.set_nodelay(true) {
                        trace!("Could not disable Nagle on {}: {}", remote, e);
                    }
                    info!("Accepted {} for '{}'", remote, self.service.name);
                    let peer = PeerDevice::new(remote.to_string(), hello.name);
                    return Ok(RadioConnection::new(peer, Box::new(stream)));
                }
                Ok(Ok(hello)) => debug!("{} asked for unknown service {}", remote, hello.service),
                Ok(Err(e)) => debug!("Handshake with {} failed: {}", remote, e),
                Err(_) => debug!("Handshake with {} timed out", remote),
            }
        }
    }
}

impl Drop for LanListenHandle {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        if state.registration.is_some_and(|(_, port)| port == self.port) {
            state.registration = None;
        }
        debug!("Service '{}' on port {} unregistered", self.service.name, self.port);
    }
}

// ----------------------------------------------------------------------------
// Capabilities
// ----------------------------------------------------------------------------

/// Capability checks for the LAN radio
///
/// A network stack is always present; permission and power are probed by
/// binding a throwaway UDP socket on the configured address.
pub struct LanCapabilities {
    config: LanRadioConfig,
}

impl LanCapabilities {
    pub fn new(config: LanRadioConfig) -> Self {
        Self { config }
    }

    fn probe_bind(&self) -> std::io::Result<()> {
        std::net::UdpSocket::bind((self.config.bind_address, 0)).map(|_| ())
    }
}

#[async_trait::async_trait]
impl Capabilities for LanCapabilities {
    async fn is_radio_supported(&self) -> bool {
        true
    }

    async fn has_required_permissions(&self) -> bool {
        !matches!(self.probe_bind(), Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied)
    }

    async fn is_radio_enabled(&self) -> bool {
        self.probe_bind().is_ok()
    }
}
