//! Radio Trait Definitions
//!
//! Defines the transport abstraction the coordinator drives. Concrete radios
//! live in `bluemsg-radio` (LAN, BlueZ RFCOMM) and `bluemsg-harness`
//! (in-memory simulation).

use crate::errors::TransportError;
use crate::service::ServiceRecord;
use crate::types::PeerDevice;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;

// ----------------------------------------------------------------------------
// Streams
// ----------------------------------------------------------------------------

/// Bidirectional byte stream to one peer
///
/// Read and write failures surface as `std::io::Error` and are classified with
/// `TransportError::from_stream_io`. Dropping the stream closes it.
pub trait RadioStream: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> RadioStream for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

/// A live stream together with the identity of the remote end
pub struct RadioConnection {
    pub peer: PeerDevice,
    pub stream: Box<dyn RadioStream>,
}

impl RadioConnection {
    pub fn new(peer: PeerDevice, stream: Box<dyn RadioStream>) -> Self {
        Self { peer, stream }
    }
}

impl fmt::Debug for RadioConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RadioConnection")
            .field("peer", &self.peer)
            .finish_non_exhaustive()
    }
}

// ----------------------------------------------------------------------------
// Radio Kind
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RadioKind {
    Lan,
    Rfcomm,
    Simulated,
}

impl fmt::Display for RadioKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RadioKind::Lan => write!(f, "LAN"),
            RadioKind::Rfcomm => write!(f, "RFCOMM"),
            RadioKind::Simulated => write!(f, "Simulated"),
        }
    }
}

// ----------------------------------------------------------------------------
// Radio Trait
// ----------------------------------------------------------------------------

/// Short-range radio able to discover peers and carry one stream per connection
///
/// ## Cancellation
///
/// Every blocking operation is cancelled by dropping its future or handle:
/// dropping a `ListenHandle` unregisters the service and unblocks a pending
/// `accept`, dropping a `dial` future abandons the attempt and any socket it
/// opened, dropping the discovery receiver ends the scan.
///
/// ## Discovery and dialing
///
/// Platforms require an active scan to be stopped before dialing. Callers
/// invoke `cancel_discovery` first; radios without that restriction treat it
/// as a no-op.
#[async_trait::async_trait]
pub trait Radio: Send + Sync + 'static {
    /// Register the service and return a handle that accepts inbound connections
    async fn listen(&self, service: &ServiceRecord) -> Result<Box<dyn ListenHandle>, TransportError>;

    /// Open an outbound stream to the peer's instance of the service
    async fn dial(
        &self,
        peer: &PeerDevice,
        service: &ServiceRecord,
    ) -> Result<Box<dyn RadioStream>, TransportError>;

    /// Start a scan lasting at most `window`
    ///
    /// Every sighting is sent on the returned channel, duplicates included.
    /// The channel closes when the scan window ends.
    async fn discover(&self, window: Duration) -> Result<mpsc::Receiver<PeerDevice>, TransportError>;

    /// Stop any scan in progress
    async fn cancel_discovery(&self);

    /// Make this device visible to scans for `duration`
    async fn set_discoverable(&self, duration: Duration) -> Result<(), TransportError>;

    /// Radio identifier for logging
    fn radio_kind(&self) -> RadioKind;
}

/// Registered service endpoint waiting for inbound connections
#[async_trait::async_trait]
pub trait ListenHandle: Send {
    /// Wait for the next inbound connection
    ///
    /// Returns `TransportError::Closed` once the endpoint has been closed.
    async fn accept(&mut self) -> Result<RadioConnection, TransportError>;
}

// ----------------------------------------------------------------------------
// Capabilities
// ----------------------------------------------------------------------------

/// Platform preconditions queried before any radio operation
#[async_trait::async_trait]
pub trait Capabilities: Send + Sync + 'static {
    /// Whether this device has the radio hardware at all
    async fn is_radio_supported(&self) -> bool;

    /// Whether the process holds the permissions radio operations need
    async fn has_required_permissions(&self) -> bool;

    /// Whether the radio is powered on
    async fn is_radio_enabled(&self) -> bool;
}

/// Result of a capability check, most severe failure first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RadioReadiness {
    Ready,
    Unsupported,
    PermissionDenied,
    Disabled,
}

impl RadioReadiness {
    /// Query all capabilities in order of severity
    pub async fn check(capabilities: &dyn Capabilities) -> Self {
        if !capabilities.is_radio_supported().await {
            RadioReadiness::Unsupported
        } else if !capabilities.has_required_permissions().await {
            RadioReadiness::PermissionDenied
        } else if !capabilities.is_radio_enabled().await {
            RadioReadiness::Disabled
        } else {
            RadioReadiness::Ready
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, RadioReadiness::Ready)
    }

    /// Error equivalent of a failed check
    pub fn into_error(self) -> Option<TransportError> {
        match self {
            RadioReadiness::Ready => None,
            RadioReadiness::Unsupported => Some(TransportError::RadioUnsupported),
            RadioReadiness::PermissionDenied => Some(TransportError::PermissionDenied {
                permission: "radio access".to_string(),
            }),
            RadioReadiness::Disabled => Some(TransportError::RadioDisabled),
        }
    }
}

/// Capabilities of a host where the radio is always usable
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysReady;

#[async_trait::async_trait]
impl Capabilities for AlwaysReady {
    async fn is_radio_supported(&self) -> bool {
        true
    }

    async fn has_required_permissions(&self) -> bool {
        true
    }

    async fn is_radio_enabled(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Flags(bool, bool, bool);

    #[async_trait::async_trait]
    impl Capabilities for Flags {
        async fn is_radio_supported(&self) -> bool {
            self.0
        }
        async fn has_required_permissions(&self) -> bool {
            self.1
        }
        async fn is_radio_enabled(&self) -> bool {
            self.2
        }
    }

    #[tokio::test]
    async fn test_readiness_reports_most_severe_failure() {
        assert_eq!(RadioReadiness::check(&Flags(true, true, true)).await, RadioReadiness::Ready);
        assert_eq!(RadioReadiness::check(&Flags(false, false, false)).await, RadioReadiness::Unsupported);
        assert_eq!(RadioReadiness::check(&Flags(true, false, false)).await, RadioReadiness::PermissionDenied);
        assert_eq!(RadioReadiness::check(&Flags(true, true, false)).await, RadioReadiness::Disabled);
        assert!(RadioReadiness::check(&AlwaysReady).await.is_ready());
    }

    #[test]
    fn test_readiness_errors() {
        assert!(RadioReadiness::Ready.into_error().is_none());
        assert!(matches!(
            RadioReadiness::Unsupported.into_error(),
            Some(TransportError::RadioUnsupported)
        ));
    }
}
