//! Channel Module
//!
//! Message-passing infrastructure between the coordinator, its workers and the UI:
//! - `communication`: commands, events, app events and status details
//! - `utils`: channel aliases and constructors

pub mod communication;
pub mod utils;

pub use communication::{AppEvent, Command, Event, Snapshot, StatusDetail, WorkerId};

pub use crate::config::ChannelConfig;

pub use utils::{
    create_app_event_channel, create_command_channel, create_discovery_channel, create_event_channel,
    AppEventReceiver, AppEventSender, ChannelError, CommandReceiver, CommandSender, DiscoveryReceiver,
    DiscoverySender, EventReceiver, EventSender, NonBlockingSend,
};
