//! Radio backend configuration

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::time::Duration;

// ----------------------------------------------------------------------------
// Backend Selection
// ----------------------------------------------------------------------------

/// Which radio backend the application drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RadioBackend {
    #[default]
    Lan,
    Bluez,
}

impl std::str::FromStr for RadioBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lan" => Ok(RadioBackend::Lan),
            "bluez" | "rfcomm" => Ok(RadioBackend::Bluez),
            other => Err(format!("Unknown radio backend: {}", other)),
        }
    }
}

/// Complete radio configuration: backend choice plus per-backend settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RadioConfig {
    pub backend: RadioBackend,
    pub lan: LanRadioConfig,
    pub rfcomm: RfcommConfig,
}

impl RadioConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_backend(mut self, backend: RadioBackend) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_lan(mut self, lan: LanRadioConfig) -> Self {
        self.lan = lan;
        self
    }

    pub fn with_rfcomm(mut self, rfcomm: RfcommConfig) -> Self {
        self.rfcomm = rfcomm;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        match self.backend {
            RadioBackend::Lan => self.lan.validate(),
            RadioBackend::Bluez => self.rfcomm.validate(),
        }
    }
}

// ----------------------------------------------------------------------------
// LAN Radio
// ----------------------------------------------------------------------------

/// Configuration for the LAN radio
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanRadioConfig {
    /// Name announced to scanners; `None` announces no name
    pub device_name: Option<String>,
    /// UDP port discovery probes are sent to and answered on
    pub discovery_port: u16,
    /// TCP port for inbound streams; 0 picks a free port
    pub stream_port: u16,
    /// Address probes are sent to
    pub probe_address: Ipv4Addr,
    /// Address the TCP listener and the discovery responder bind to
    pub bind_address: Ipv4Addr,
    /// Delay between probes during a scan
    pub probe_interval: Duration,
    /// Time a dialer has to identify the service after connecting
    pub handshake_timeout: Duration,
}

impl Default for LanRadioConfig {
    fn default() -> Self {
        Self {
            device_name: None,
            discovery_port: 45_890,
            stream_port: 0,
            probe_address: Ipv4Addr::BROADCAST,
            bind_address: Ipv4Addr::UNSPECIFIED,
            probe_interval: Duration::from_secs(1),
            handshake_timeout: Duration::from_secs(5),
        }
    }
}

impl LanRadioConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loopback-only settings for tests on a single host
    pub fn loopback(discovery_port: u16) -> Self {
        Self {
            discovery_port,
            probe_address: Ipv4Addr::LOCALHOST,
            bind_address: Ipv4Addr::LOCALHOST,
            probe_interval: Duration::from_millis(50),
            ..Self::default()
        }
    }

    pub fn with_device_name<N: Into<String>>(mut self, name: N) -> Self {
        self.device_name = Some(name.into());
        self
    }

    pub fn with_discovery_port(mut self, port: u16) -> Self {
        self.discovery_port = port;
        self
    }

    pub fn with_stream_port(mut self, port: u16) -> Self {
        self.stream_port = port;
        self
    }

    pub fn with_probe_interval(mut self, interval: Duration) -> Self {
        self.probe_interval = interval;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.discovery_port == 0 {
            return Err("LAN discovery port must be set".to_string());
        }
        if self.probe_interval.is_zero() {
            return Err("LAN probe interval must be greater than 0".to_string());
        }
        if self.handshake_timeout.is_zero() {
            return Err("LAN handshake timeout must be greater than 0".to_string());
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// RFCOMM Radio
// ----------------------------------------------------------------------------

/// Configuration for the BlueZ RFCOMM radio
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RfcommConfig {
    /// Adapter name such as `hci0`; `None` uses the default adapter
    pub adapter: Option<String>,
    /// Fixed RFCOMM channel for the service; `None` lets BlueZ choose
    pub channel: Option<u16>,
}

impl RfcommConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_adapter<N: Into<String>>(mut self, adapter: N) -> Self {
        self.adapter = Some(adapter.into());
        self
    }

    pub fn with_channel(mut self, channel: u16) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        match self.channel {
            Some(channel) if !(1..=30).contains(&channel) => {
                Err(format!("RFCOMM channel must be within 1..=30, got {}", channel))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_parsing() {
        assert_eq!("lan".parse::<RadioBackend>(), Ok(RadioBackend::Lan));
        assert_eq!("RFCOMM".parse::<RadioBackend>(), Ok(RadioBackend::Bluez));
        assert!("wifi".parse::<RadioBackend>().is_err());
    }

    #[test]
    fn test_validation() {
        assert!(RadioConfig::default().validate().is_ok());
        assert!(LanRadioConfig::default().with_discovery_port(0).validate().is_err());
        assert!(RfcommConfig::new().with_channel(31).validate().is_err());
        assert!(RfcommConfig::new().with_channel(3).validate().is_ok());

        let bluez = RadioConfig::new()
            .with_backend(RadioBackend::Bluez)
            .with_rfcomm(RfcommConfig::new().with_channel(0));
        assert!(bluez.validate().is_err());
    }
}
