//! Channel Utilities
//!
//! Channel type aliases and constructors sized from `ChannelConfig`.

use crate::channel::communication::{AppEvent, Command, Event};
use crate::config::ChannelConfig;
use crate::types::PeerDevice;
use std::fmt;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelError {
    ChannelFull,
    ChannelClosed,
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelError::ChannelFull => write!(f, "Channel buffer is full"),
            ChannelError::ChannelClosed => write!(f, "Channel is closed"),
        }
    }
}

impl std::error::Error for ChannelError {}

impl<T> From<mpsc::error::TrySendError<T>> for ChannelError {
    fn from(err: mpsc::error::TrySendError<T>) -> Self {
        match err {
            mpsc::error::TrySendError::Full(_) => ChannelError::ChannelFull,
            mpsc::error::TrySendError::Closed(_) => ChannelError::ChannelClosed,
        }
    }
}

impl<T> From<mpsc::error::SendError<T>> for ChannelError {
    fn from(_: mpsc::error::SendError<T>) -> Self {
        ChannelError::ChannelClosed
    }
}

pub type CommandSender = mpsc::Sender<Command>;
pub type CommandReceiver = mpsc::Receiver<Command>;
pub type EventSender = mpsc::Sender<Event>;
pub type EventReceiver = mpsc::Receiver<Event>;
pub type AppEventSender = mpsc::Sender<AppEvent>;
pub type AppEventReceiver = mpsc::Receiver<AppEvent>;
pub type DiscoverySender = mpsc::Sender<PeerDevice>;
pub type DiscoveryReceiver = mpsc::Receiver<PeerDevice>;

// ----------------------------------------------------------------------------
// Channel Creation Utilities
// ----------------------------------------------------------------------------

/// Create bounded command channel (UI → Coordinator)
pub fn create_command_channel(config: &ChannelConfig) -> (CommandSender, CommandReceiver) {
    mpsc::channel(config.command_buffer_size)
}

/// Create bounded event channel (Workers → Coordinator)
pub fn create_event_channel(config: &ChannelConfig) -> (EventSender, EventReceiver) {
    mpsc::channel(config.event_buffer_size)
}

/// Create bounded app event channel (Coordinator → UI)
pub fn create_app_event_channel(config: &ChannelConfig) -> (AppEventSender, AppEventReceiver) {
    mpsc::channel(config.app_event_buffer_size)
}

/// Create bounded sighting channel for one scan (Radio → Scanner)
pub fn create_discovery_channel(config: &ChannelConfig) -> (DiscoverySender, DiscoveryReceiver) {
    mpsc::channel(config.discovery_buffer_size)
}

// ----------------------------------------------------------------------------
// Non-blocking Send Utilities
// ----------------------------------------------------------------------------

/// Non-blocking send for UI tasks to prevent freezing
pub trait NonBlockingSend<T> {
    fn try_send_non_blocking(&self, message: T) -> Result<(), ChannelError>;
}

impl NonBlockingSend<Command> for CommandSender {
    fn try_send_non_blocking(&self, command: Command) -> Result<(), ChannelError> {
        self.try_send(command).map_err(ChannelError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_non_blocking_send_reports_full_and_closed() {
        let config = ChannelConfig {
            command_buffer_size: 1,
            ..ChannelConfig::default()
        };
        let (sender, receiver) = create_command_channel(&config);

        assert!(sender.try_send_non_blocking(Command::StartScan).is_ok());
        assert_eq!(
            sender.try_send_non_blocking(Command::StartScan),
            Err(ChannelError::ChannelFull)
        );

        drop(receiver);
        assert_eq!(
            sender.try_send_non_blocking(Command::StartScan),
            Err(ChannelError::ChannelClosed)
        );
    }
}
