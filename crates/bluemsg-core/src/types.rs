//! Core types for BlueMsg
//!
//! Peer identity and time. A peer is known only by an opaque, stable address
//! assigned by the radio backend plus an optional human-readable name.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Name shown in device lists when a peer does not advertise one
pub const UNKNOWN_DEVICE_NAME: &str = "Unknown Device";

/// Sender name used for inbound messages when the peer has no name
pub const UNNAMED_REMOTE_SENDER: &str = "Remote";

/// Peer name used in connection status when the peer has no name
pub const UNNAMED_REMOTE_DEVICE: &str = "Remote Device";

// ----------------------------------------------------------------------------
// Peer Address
// ----------------------------------------------------------------------------

/// Opaque, stable identifier of a peer on a given radio
///
/// A Bluetooth MAC on RFCOMM, `ip:port` on the LAN radio, a synthetic MAC in
/// the simulator. The core never interprets the contents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerAddress(String);

impl PeerAddress {
    pub fn new<S: Into<String>>(address: S) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerAddress {
    fn from(address: &str) -> Self {
        Self::new(address)
    }
}

impl From<String> for PeerAddress {
    fn from(address: String) -> Self {
        Self(address)
    }
}

// ----------------------------------------------------------------------------
// Peer Device
// ----------------------------------------------------------------------------

/// A remote device reachable over the radio
///
/// Equality and hashing consider the address only, so the same device seen
/// twice with a different (or missing) name is still one peer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerDevice {
    pub address: PeerAddress,
    pub display_name: Option<String>,
}

impl PeerDevice {
    pub fn new<A: Into<PeerAddress>>(address: A, display_name: Option<String>) -> Self {
        let display_name = display_name.filter(|name| !name.trim().is_empty());
        Self {
            address: address.into(),
            display_name,
        }
    }

    pub fn named<A: Into<PeerAddress>, N: Into<String>>(address: A, name: N) -> Self {
        Self::new(address, Some(name.into()))
    }

    /// Name for device lists, falling back to "Unknown Device"
    pub fn list_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(UNKNOWN_DEVICE_NAME)
    }

    /// Name for connection status lines, falling back to "Remote Device"
    pub fn status_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(UNNAMED_REMOTE_DEVICE)
    }

    /// Name attributed to messages from this peer, falling back to "Remote"
    pub fn sender_name(&self) -> String {
        self.display_name
            .clone()
            .unwrap_or_else(|| UNNAMED_REMOTE_SENDER.to_string())
    }
}

impl PartialEq for PeerDevice {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for PeerDevice {}

impl Hash for PeerDevice {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address.hash(state);
    }
}

impl fmt::Display for PeerDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.list_name(), self.address)
    }
}

// ----------------------------------------------------------------------------
// Timestamp
// ----------------------------------------------------------------------------

/// Millisecond timestamp since Unix epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    pub fn new(millis: u64) -> Self {
        Self(millis)
    }

    /// Wall-clock capture time
    pub fn now() -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        Self(millis)
    }

    pub fn as_millis(&self) -> u64 {
        self.0
    }

    /// Local wall-clock time of day as `HH:MM:SS`
    pub fn time_of_day(&self) -> String {
        use chrono::{Local, TimeZone};
        match Local.timestamp_millis_opt(self.0 as i64).single() {
            Some(time) => time.format("%H:%M:%S").to_string(),
            None => "--:--:--".to_string(),
        }
    }
}

impl std::ops::Sub for Timestamp {
    type Output = u64;

    fn sub(self, other: Timestamp) -> u64 {
        self.0.saturating_sub(other.0)
    }
}

/// Source of the current time, swappable in tests
pub trait TimeSource: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Standard library implementation of TimeSource
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}
