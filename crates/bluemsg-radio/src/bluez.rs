//! Bluetooth Classic RFCOMM radio using bluer (BlueZ)
//!
//! The service is registered with BlueZ as an RFCOMM profile under the fixed
//! UUID and name, so remote devices find it through SDP. Peer addresses are
//! Bluetooth MACs.

use crate::config::RfcommConfig;
use crate::error::RadioError;
use bluemsg_core::{
    internal::create_discovery_channel, Capabilities, ChannelConfig, ListenHandle, PeerDevice, Radio,
    RadioConnection, RadioKind, RadioStream, ServiceRecord, TransportError,
};
use bluer::rfcomm::{Profile, ProfileHandle, Role};
use bluer::{Adapter, AdapterEvent, Address, DiscoveryFilter, DiscoveryTransport, Session};
use futures::StreamExt;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

fn bluer_error(err: bluer::Error) -> RadioError {
    match err.kind {
        bluer::ErrorKind::NotReady => RadioError::AdapterPoweredOff,
        bluer::ErrorKind::NotAuthorized | bluer::ErrorKind::NotPermitted => {
            RadioError::PermissionDenied(err.message)
        }
        bluer::ErrorKind::NotFound | bluer::ErrorKind::DoesNotExist => RadioError::AdapterNotAvailable(err.message),
        _ => RadioError::AdapterNotAvailable(err.to_string()),
    }
}

async fn open_adapter(config: &RfcommConfig) -> Result<(Session, Adapter), RadioError> {
    let session = Session::new().await.map_err(bluer_error)?;
    let adapter = match &config.adapter {
        Some(name) => session.adapter(name).map_err(bluer_error)?,
        None => session.default_adapter().await.map_err(bluer_error)?,
    };
    Ok((session, adapter))
}

async fn device_name(adapter: &Adapter, address: Address) -> Option<String> {
    let device = adapter.device(address).ok()?;
    device.name().await.ok().flatten()
}

// ----------------------------------------------------------------------------
// RFCOMM Radio
// ----------------------------------------------------------------------------

/// Radio over BlueZ RFCOMM sockets
pub struct RfcommRadio {
    config: RfcommConfig,
    session: Session,
    adapter: Adapter,
    scan: Mutex<Option<AbortHandle>>,
}

impl RfcommRadio {
    /// Connect to BlueZ and open the configured adapter
    pub async fn new(config: RfcommConfig) -> Result<Self, RadioError> {
        let (session, adapter) = open_adapter(&config).await?;
        info!("Using Bluetooth adapter {}", adapter.name());
        Ok(Self {
            config,
            session,
            adapter,
            scan: Mutex::new(None),
        })
    }

    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    fn replace_scan(&self, task: Option<AbortHandle>) {
        let mut scan = self.scan.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(previous) = std::mem::replace(&mut *scan, task) {
            previous.abort();
        }
    }

    async fn ensure_powered(&self) -> Result<(), RadioError> {
        if self.adapter.is_powered().await.map_err(bluer_error)? {
            Ok(())
        } else {
            Err(RadioError::AdapterPoweredOff)
        }
    }

    /// Dial through BlueZ's profile machinery, letting SDP find the channel
    async fn dial_profile(
        &self,
        address: Address,
        service: &ServiceRecord,
    ) -> Result<Box<dyn RadioStream>, RadioError> {
        let profile = Profile {
            uuid: service.uuid,
            name: Some(service.name.clone()),
            role: Some(Role::Client),
            require_authentication: Some(false),
            require_authorization: Some(false),
            auto_connect: Some(false),
            ..Default::default()
        };
        let mut handle = self.session.register_profile(profile).await.map_err(bluer_error)?;
        let device = self.adapter.device(address).map_err(bluer_error)?;

        let connect = device.connect_profile(&service.uuid);
        tokio::pin!(connect);
        let mut requested = false;
        let request = loop {
            tokio::select! {
                request = handle.next() => {
                    break request.ok_or_else(|| RadioError::ConnectionFailed {
                        address: address.to_string(),
                        reason: "profile unregistered".to_string(),
                    })?;
                }
                result = &mut connect, if !requested => {
                    result.map_err(|e| RadioError::ConnectionFailed {
                        address: address.to_string(),
                        reason: e.to_string(),
                    })?;
                    requested = true;
                }
            }
        };

        let stream = request.accept().map_err(bluer_error)?;
        Ok(Box::new(stream))
    }
}

impl Drop for RfcommRadio {
    fn drop(&mut self) {
        self.replace_scan(None);
    }
}

#[async_trait::async_trait]
impl Radio for RfcommRadio {
    async fn listen(&self, service: &ServiceRecord) -> Result<Box<dyn ListenHandle>, TransportError> {
        self.ensure_powered().await?;
        let profile = Profile {
            uuid: service.uuid,
            name: Some(service.name.clone()),
            channel: self.config.channel,
            role: Some(Role::Server),
            require_authentication: Some(false),
            require_authorization: Some(false),
            ..Default::default()
        };
        let handle = self
            .session
            .register_profile(profile)
            .await
            .map_err(|e| RadioError::RegistrationFailed(e.to_string()))?;
        info!("Registered RFCOMM service '{}' ({})", service.name, service.uuid);

        Ok(Box::new(RfcommListenHandle {
            profile: handle,
            adapter: self.adapter.clone(),
        }))
    }

    async fn dial(&self, peer: &PeerDevice, service: &ServiceRecord) -> Result<Box<dyn RadioStream>, TransportError> {
        self.ensure_powered().await?;
        let address: Address = peer
            .address
            .as_str()
            .parse()
            .map_err(|_| RadioError::InvalidAddress(peer.address.to_string()))?;

        match self.config.channel {
            Some(channel) => {
                debug!("Dialing {} on RFCOMM channel {}", address, channel);
                let target = bluer::rfcomm::SocketAddr::new(address, channel as u8);
                let stream = bluer::rfcomm::Stream::connect(target)
                    .await
                    .map_err(|e| RadioError::ConnectionFailed {
                        address: address.to_string(),
                        reason: e.to_string(),
                    })?;
                Ok(Box::new(stream))
            }
            None => {
                debug!("Dialing {} for service {}", address, service.uuid);
                Ok(self.dial_profile(address, service).await?)
            }
        }
    }

    async fn discover(&self, window: Duration) -> Result<mpsc::Receiver<PeerDevice>, TransportError> {
        self.ensure_powered().await?;
        let filter = DiscoveryFilter {
            transport: DiscoveryTransport::BrEdr,
            ..Default::default()
        };
        self.adapter
            .set_discovery_filter(filter)
            .await
            .map_err(|e| RadioError::DiscoveryFailed(e.to_string()))?;
        let events = self
            .adapter
            .discover_devices()
            .await
            .map_err(|e| RadioError::DiscoveryFailed(e.to_string()))?;

        let (sender, receiver) = create_discovery_channel(&ChannelConfig::default());
        let adapter = self.adapter.clone();
        let task = tokio::spawn(async move {
            tokio::pin!(events);
            let deadline = tokio::time::sleep(window);
            tokio::pin!(deadline);
            loop {
                tokio::select! {
                    _ = &mut deadline => break,
                    event = events.next() => match event {
                        Some(AdapterEvent::DeviceAdded(address)) => {
                            let name = device_name(&adapter, address).await;
                            if sender.send(PeerDevice::new(address.to_string(), name)).await.is_err() {
                                break;
                            }
                        }
                        Some(_) => {}
                        None => break,
                    }
                }
            }
            debug!("Bluetooth discovery ended");
        });
        self.replace_scan(Some(task.abort_handle()));
        Ok(receiver)
    }

    async fn cancel_discovery(&self) {
        self.replace_scan(None);
    }

    async fn set_discoverable(&self, duration: Duration) -> Result<(), TransportError> {
        self.ensure_powered().await?;
        let seconds = u32::try_from(duration.as_secs()).unwrap_or(u32::MAX);
        self.adapter
            .set_discoverable_timeout(seconds)
            .await
            .map_err(bluer_error)?;
        self.adapter.set_discoverable(true).await.map_err(bluer_error)?;
        info!("Adapter {} discoverable for {}s", self.adapter.name(), seconds);
        Ok(())
    }

    fn radio_kind(&self) -> RadioKind {
        RadioKind::Rfcomm
    }
}

// ----------------------------------------------------------------------------
// Listen Handle
// ----------------------------------------------------------------------------

/// Registered RFCOMM profile; dropping it unregisters the service
pub struct RfcommListenHandle {
    profile: ProfileHandle,
    adapter: Adapter,
}

#[async_trait::async_trait]
impl ListenHandle for RfcommListenHandle {
    async fn accept(&mut self) -> Result<RadioConnection, TransportError> {
        loop {
            let request = self.profile.next().await.ok_or(TransportError::Closed)?;
            let address = request.device();
            match request.accept() {
                Ok(stream) => {
                    let name = device_name(&self.adapter, address).await;
                    info!("Accepted RFCOMM connection from {}", address);
                    return Ok(RadioConnection::new(PeerDevice::new(address.to_string(), name), Box::new(stream)));
                }
                Err(e) => warn!("Could not accept connection from {}: {}", address, e),
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Capabilities
// ----------------------------------------------------------------------------

/// Capability checks backed by the BlueZ adapter
pub struct BluezCapabilities {
    adapter: Option<Adapter>,
    permitted: bool,
    _session: Option<Session>,
}

impl BluezCapabilities {
    pub async fn new(config: &RfcommConfig) -> Self {
        match open_adapter(config).await {
            Ok((session, adapter)) => Self {
                adapter: Some(adapter),
                permitted: true,
                _session: Some(session),
            },
            Err(e) => {
                warn!("Bluetooth unavailable: {}", e);
                Self {
                    adapter: None,
                    permitted: !matches!(e, RadioError::PermissionDenied(_)),
                    _session: None,
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl Capabilities for BluezCapabilities {
    async fn is_radio_supported(&self) -> bool {
        self.adapter.is_some() || !self.permitted
    }

    async fn has_required_permissions(&self) -> bool {
        self.permitted
    }

    async fn is_radio_enabled(&self) -> bool {
        match &self.adapter {
            Some(adapter) => adapter.is_powered().await.unwrap_or(false),
            None => false,
        }
    }
}
