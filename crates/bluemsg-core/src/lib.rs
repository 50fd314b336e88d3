//! BlueMsg Core
//!
//! Foundational types for BlueMsg, a one-to-one text messenger over a
//! short-range radio: peer identity, messages, the length-prefixed wire
//! framing, the radio abstraction, the channel schema between tasks and the
//! connection state machine. Runtime orchestration lives in `bluemsg-runtime`.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod channel;
pub mod config;
pub mod connection_state;
pub mod errors;
pub mod message;
pub mod peers;
pub mod radio;
pub mod service;
pub mod task_logging;
pub mod types;
pub mod wire;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use channel::{AppEvent, Command, Event, Snapshot, StatusDetail, WorkerId};
pub use config::{BluemsgConfig, ChannelConfig, CoordinatorConfig};
pub use connection_state::{ConnectionEvent, ConnectionState, StateTransition, TransitionContext};
pub use errors::{BluemsgError, BluemsgResult, StateTransitionError, TransportError};
pub use message::{Message, MessageLog, Sender};
pub use peers::DiscoveredPeers;
pub use radio::{
    AlwaysReady, Capabilities, ListenHandle, Radio, RadioConnection, RadioKind, RadioReadiness, RadioStream,
};
pub use service::{ServiceRecord, SERVICE_NAME, SERVICE_UUID};
pub use types::{PeerAddress, PeerDevice, SystemTimeSource, TimeSource, Timestamp};
pub use wire::MessageCodec;

// ----------------------------------------------------------------------------
// Internal API (for runtime, radio and harness crates)
// ----------------------------------------------------------------------------

pub mod internal {
    pub use crate::channel::{
        create_app_event_channel, create_command_channel, create_discovery_channel, create_event_channel,
        AppEventReceiver, AppEventSender, ChannelError, CommandReceiver, CommandSender, DiscoveryReceiver,
        DiscoverySender, EventReceiver, EventSender, NonBlockingSend,
    };
    pub use crate::connection_state::AuditEntry;
    pub use crate::task_logging::{
        LogLevel, MessageSummary, MessageType, NoOpLogger, TaskId, TaskLogger, TracingLogger,
    };
    pub use crate::wire::{message_reader, message_writer, DEFAULT_MAX_MESSAGE_SIZE, LENGTH_HEADER_LEN};
}
