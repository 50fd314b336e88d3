//! Centralized Configuration Management
//!
//! Channel sizing and coordinator timing shared by the runtime and its tests.

use crate::errors::{BluemsgError, BluemsgResult};
use crate::service::ServiceRecord;
use crate::wire::{DEFAULT_MAX_MESSAGE_SIZE, LENGTH_HEADER_LEN};
use std::time::Duration;

// ----------------------------------------------------------------------------
// Channel Configuration
// ----------------------------------------------------------------------------

/// Buffer sizes for the channels between tasks
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ChannelConfig {
    /// Buffer size for Command channels (UI → Coordinator)
    pub command_buffer_size: usize,
    /// Buffer size for Event channels (Workers → Coordinator)
    pub event_buffer_size: usize,
    /// Buffer size for AppEvent channels (Coordinator → UI)
    pub app_event_buffer_size: usize,
    /// Buffer size for a single scan's sightings
    pub discovery_buffer_size: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            command_buffer_size: 32,   // UI commands are infrequent
            event_buffer_size: 128,    // Scan sightings can be bursty
            app_event_buffer_size: 64, // UI updates need responsiveness
            discovery_buffer_size: 64,
        }
    }
}

impl ChannelConfig {
    /// Small buffers that make backpressure visible in tests
    pub fn testing() -> Self {
        Self {
            command_buffer_size: 8,
            event_buffer_size: 16,
            app_event_buffer_size: 256,
            discovery_buffer_size: 8,
        }
    }

    pub fn validate(&self) -> BluemsgResult<()> {
        let sizes = [
            ("command_buffer_size", self.command_buffer_size),
            ("event_buffer_size", self.event_buffer_size),
            ("app_event_buffer_size", self.app_event_buffer_size),
            ("discovery_buffer_size", self.discovery_buffer_size),
        ];
        for (name, size) in sizes {
            if size == 0 {
                return Err(BluemsgError::config_error(format!("{} must be non-zero", name)));
            }
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Coordinator Configuration
// ----------------------------------------------------------------------------

/// Timing and limits for the connection coordinator
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CoordinatorConfig {
    /// Service both ends listen on and dial
    pub service: ServiceRecord,
    /// Length of one discovery scan
    pub scan_window: Duration,
    /// Maximum time an outbound connection attempt may take
    pub connect_timeout: Duration,
    /// Maximum time a single message write may block
    pub write_timeout: Duration,
    /// Largest accepted message payload in bytes
    pub max_message_size: usize,
    /// Default visibility window for discoverable requests
    pub discoverable_duration: Duration,
    /// Re-arm the listener whenever a session ends
    pub relisten_after_disconnect: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            service: ServiceRecord::default(),
            scan_window: Duration::from_secs(12),
            connect_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(5),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            discoverable_duration: Duration::from_secs(300),
            relisten_after_disconnect: false,
        }
    }
}

impl CoordinatorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the service identity
    pub fn with_service(mut self, service: ServiceRecord) -> Self {
        self.service = service;
        self
    }

    /// Set scan window
    pub fn with_scan_window(mut self, window: Duration) -> Self {
        self.scan_window = window;
        self
    }

    /// Set connection timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set write timeout
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set maximum message size
    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    /// Set default discoverable duration
    pub fn with_discoverable_duration(mut self, duration: Duration) -> Self {
        self.discoverable_duration = duration;
        self
    }

    /// Enable or disable re-listening after a session ends
    pub fn with_relisten_after_disconnect(mut self, enabled: bool) -> Self {
        self.relisten_after_disconnect = enabled;
        self
    }

    pub fn validate(&self) -> BluemsgResult<()> {
        if self.scan_window.is_zero() {
            return Err(BluemsgError::config_error("scan_window must be non-zero"));
        }
        if self.connect_timeout.is_zero() {
            return Err(BluemsgError::config_error("connect_timeout must be non-zero"));
        }
        if self.write_timeout.is_zero() {
            return Err(BluemsgError::config_error("write_timeout must be non-zero"));
        }
        if self.max_message_size == 0 {
            return Err(BluemsgError::config_error("max_message_size must be non-zero"));
        }
        // The length header is a u32
        if self.max_message_size as u64 > u32::MAX as u64 - LENGTH_HEADER_LEN as u64 {
            return Err(BluemsgError::config_error("max_message_size does not fit the length header"));
        }
        if self.service.name.trim().is_empty() {
            return Err(BluemsgError::config_error("service name must not be empty"));
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Runtime Configuration
// ----------------------------------------------------------------------------

/// Complete configuration for one messaging runtime
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct BluemsgConfig {
    pub channels: ChannelConfig,
    pub coordinator: CoordinatorConfig,
}

impl BluemsgConfig {
    /// Configuration for tests: short timeouts and small buffers
    pub fn testing() -> Self {
        Self {
            channels: ChannelConfig::testing(),
            coordinator: CoordinatorConfig::default()
                .with_scan_window(Duration::from_millis(200))
                .with_connect_timeout(Duration::from_secs(2))
                .with_write_timeout(Duration::from_secs(1)),
        }
    }

    pub fn with_channels(mut self, channels: ChannelConfig) -> Self {
        self.channels = channels;
        self
    }

    pub fn with_coordinator(mut self, coordinator: CoordinatorConfig) -> Self {
        self.coordinator = coordinator;
        self
    }

    pub fn validate(&self) -> BluemsgResult<()> {
        self.channels.validate()?;
        self.coordinator.validate()
    }
}
