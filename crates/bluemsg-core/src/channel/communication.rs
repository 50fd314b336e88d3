//! Channel Communication Protocol Types
//!
//! All inter-task communication flows through these message types:
//! `Command` (UI → Coordinator), `Event` (Workers → Coordinator) and
//! `AppEvent` (Coordinator → UI).

use crate::connection_state::ConnectionState;
use crate::errors::TransportError;
use crate::message::Message;
use crate::radio::RadioConnection;
use crate::types::PeerDevice;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

// ----------------------------------------------------------------------------
// Worker Identity
// ----------------------------------------------------------------------------

/// Generation number of a worker (scan, listener, attempt or session)
///
/// Every worker event carries the id of the worker that produced it. The
/// coordinator ignores events whose id is no longer current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkerId(u64);

impl WorkerId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ----------------------------------------------------------------------------
// Command: UI/External → Coordinator
// ----------------------------------------------------------------------------

/// Commands sent from glue code and the UI to the coordinator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Register the service and wait for one inbound connection
    StartListening,
    /// Start (or restart) a discovery scan
    StartScan,
    /// Stop the scan in progress
    CancelScan,
    /// Open a connection to a discovered peer
    Connect { peer: PeerDevice },
    /// Send a text message over the current session
    Send { text: String },
    /// Close the current session
    Disconnect,
    /// Make this device visible to scans; `None` uses the configured default
    MakeDiscoverable { duration: Option<Duration> },
    /// Request a snapshot of peers, messages and state
    GetSnapshot,
    /// Stop every worker and end the coordinator
    Shutdown,
}

// ----------------------------------------------------------------------------
// Event: Workers → Coordinator
// ----------------------------------------------------------------------------

/// Events posted by worker tasks to the coordinator
#[derive(Debug)]
pub enum Event {
    /// A scan sighted a peer (duplicates included)
    PeerFound { scan_id: WorkerId, peer: PeerDevice },
    /// A scan window ended
    ScanFinished { scan_id: WorkerId },
    /// A scan could not start or broke off
    ScanFailed { scan_id: WorkerId, error: TransportError },
    /// The listener accepted an inbound connection
    ListenerAccepted {
        listener_id: WorkerId,
        connection: RadioConnection,
    },
    /// The listener stopped without a connection
    ListenerFailed { listener_id: WorkerId, error: TransportError },
    /// An outbound attempt produced a live stream
    InitiatorSucceeded {
        attempt_id: WorkerId,
        connection: RadioConnection,
    },
    /// An outbound attempt failed
    InitiatorFailed {
        attempt_id: WorkerId,
        peer: PeerDevice,
        error: TransportError,
    },
    /// A session decoded one inbound message
    MessageReceived { session_id: WorkerId, content: String },
    /// A session's stream ended or failed
    SessionDisconnected { session_id: WorkerId, reason: String },
}

impl Event {
    /// Id of the worker that produced this event
    pub fn worker_id(&self) -> WorkerId {
        match self {
            Event::PeerFound { scan_id, .. }
            | Event::ScanFinished { scan_id }
            | Event::ScanFailed { scan_id, .. } => *scan_id,
            Event::ListenerAccepted { listener_id, .. }
            | Event::ListenerFailed { listener_id, .. } => *listener_id,
            Event::InitiatorSucceeded { attempt_id, .. }
            | Event::InitiatorFailed { attempt_id, .. } => *attempt_id,
            Event::MessageReceived { session_id, .. }
            | Event::SessionDisconnected { session_id, .. } => *session_id,
        }
    }
}

// ----------------------------------------------------------------------------
// AppEvent: Coordinator → UI
// ----------------------------------------------------------------------------

/// Point-in-time copy of coordinator-owned data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub state: ConnectionState,
    pub connected_peer: Option<PeerDevice>,
    pub peers: Vec<PeerDevice>,
    pub messages: Vec<Message>,
    pub listening: bool,
}

/// Events sent from the coordinator to presentation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AppEvent {
    /// Connection state or status text changed
    StatusChanged {
        state: ConnectionState,
        detail: StatusDetail,
    },
    /// A new peer was appended to the discovered list
    PeerDiscovered { peer: PeerDevice },
    /// A scan ended; `count` is the size of the discovered list
    ScanFinished { count: usize },
    /// A message was appended to the log
    MessageLogged { message: Message },
    /// Transient feedback for a user-initiated action
    Notification { text: String },
    /// Reply to `Command::GetSnapshot`
    Snapshot(Snapshot),
    /// The coordinator has stopped; no further events follow
    Stopped,
}

// ----------------------------------------------------------------------------
// Status Detail
// ----------------------------------------------------------------------------

/// Human-readable reason attached to a status change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusDetail {
    Idle,
    Ready,
    Discovering,
    DiscoveryFinished { found: usize },
    Connecting { peer_name: String },
    Connected { peer_name: String },
    ConnectionFailed { reason: String },
    DiscoveryFailed { reason: String },
    SendFailed { reason: String },
    Disconnecting,
    Disconnected,
    ListenFailed { reason: String },
    Discoverable { seconds: u64 },
    RadioDisabled,
    RadioUnsupported,
    PermissionDenied,
    Stopped,
}

impl fmt::Display for StatusDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusDetail::Idle => write!(f, "Idle"),
            StatusDetail::Ready => write!(f, "Bluetooth enabled - Ready to connect"),
            StatusDetail::Discovering => write!(f, "Discovering devices..."),
            StatusDetail::DiscoveryFinished { found } => {
                write!(f, "Device discovery finished ({} devices found)", found)
            }
            StatusDetail::Connecting { peer_name } => write!(f, "Connecting to {}", peer_name),
            StatusDetail::Connected { peer_name } => write!(f, "Connected to {}", peer_name),
            StatusDetail::ConnectionFailed { .. } => write!(f, "Connection failed"),
            StatusDetail::DiscoveryFailed { reason } => write!(f, "Discovery failed: {}", reason),
            StatusDetail::SendFailed { .. } => write!(f, "Failed to send message"),
            StatusDetail::Disconnecting => write!(f, "Disconnecting..."),
            StatusDetail::Disconnected => write!(f, "Disconnected"),
            StatusDetail::ListenFailed { reason } => write!(f, "Unable to listen: {}", reason),
            StatusDetail::Discoverable { seconds } => {
                write!(f, "Device is discoverable for {} seconds", seconds)
            }
            StatusDetail::RadioDisabled => write!(f, "Bluetooth is disabled"),
            StatusDetail::RadioUnsupported => write!(f, "Bluetooth is not supported on this device"),
            StatusDetail::PermissionDenied => write!(f, "Permission denied"),
            StatusDetail::Stopped => write!(f, "Stopped"),
        }
    }
}

impl StatusDetail {
    /// Status detail describing a failed transport operation
    pub fn for_error(error: &TransportError) -> Self {
        match error {
            TransportError::RadioDisabled => StatusDetail::RadioDisabled,
            TransportError::RadioUnsupported => StatusDetail::RadioUnsupported,
            TransportError::PermissionDenied { .. } => StatusDetail::PermissionDenied,
            other => StatusDetail::ConnectionFailed {
                reason: other.to_string(),
            },
        }
    }
}
