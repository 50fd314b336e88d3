//! Channel traffic logging
//!
//! Every command, worker event and app event crossing a task boundary can be
//! traced with its sender, receiver and a one-line summary. The coordinator
//! holds a `TaskLogger`; tests usually swap in `NoOpLogger`.

use crate::channel::{AppEvent, Command, Event};
use serde::{Deserialize, Serialize};
use std::fmt;

// ----------------------------------------------------------------------------
// Log Event Types
// ----------------------------------------------------------------------------

/// Minimum severity a `TracingLogger` reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        };
        f.write_str(name)
    }
}

/// Tasks that exchange messages over channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskId {
    Coordinator,
    Scanner,
    Listener,
    Initiator,
    Session,
    UI,
    TestHarness,
}

impl TaskId {
    /// Worker task that produces a given event
    pub fn of_event(event: &Event) -> Self {
        match event {
            Event::PeerFound { .. } | Event::ScanFinished { .. } | Event::ScanFailed { .. } => TaskId::Scanner,
            Event::ListenerAccepted { .. } | Event::ListenerFailed { .. } => TaskId::Listener,
            Event::InitiatorSucceeded { .. } | Event::InitiatorFailed { .. } => TaskId::Initiator,
            Event::MessageReceived { .. } | Event::SessionDisconnected { .. } => TaskId::Session,
        }
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskId::Coordinator => write!(f, "Coordinator"),
            TaskId::Scanner => write!(f, "Scanner"),
            TaskId::Listener => write!(f, "Listener"),
            TaskId::Initiator => write!(f, "Initiator"),
            TaskId::Session => write!(f, "Session"),
            TaskId::UI => write!(f, "UI"),
            TaskId::TestHarness => write!(f, "TestHarness"),
        }
    }
}

/// Which way a logged message travelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Send,
    Receive,
    Drop,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Send => "→",
            Direction::Receive => "←",
            Direction::Drop => "✗",
        })
    }
}

/// Channel and variant name of a logged message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageType {
    Command(&'static str),
    Event(&'static str),
    AppEvent(&'static str),
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageType::Command(cmd) => write!(f, "Command::{}", cmd),
            MessageType::Event(event) => write!(f, "Event::{}", event),
            MessageType::AppEvent(app_event) => write!(f, "AppEvent::{}", app_event),
        }
    }
}

// ----------------------------------------------------------------------------
// Message Type Extraction
// ----------------------------------------------------------------------------

impl From<&Command> for MessageType {
    fn from(command: &Command) -> Self {
        let variant = match command {
            Command::StartListening => "StartListening",
            Command::StartScan => "StartScan",
            Command::CancelScan => "CancelScan",
            Command::Connect { .. } => "Connect",
            Command::Send { .. } => "Send",
            Command::Disconnect => "Disconnect",
            Command::MakeDiscoverable { .. } => "MakeDiscoverable",
            Command::GetSnapshot => "GetSnapshot",
            Command::Shutdown => "Shutdown",
        };
        MessageType::Command(variant)
    }
}

impl From<&Event> for MessageType {
    fn from(event: &Event) -> Self {
        let variant = match event {
            Event::PeerFound { .. } => "PeerFound",
            Event::ScanFinished { .. } => "ScanFinished",
            Event::ScanFailed { .. } => "ScanFailed",
            Event::ListenerAccepted { .. } => "ListenerAccepted",
            Event::ListenerFailed { .. } => "ListenerFailed",
            Event::InitiatorSucceeded { .. } => "InitiatorSucceeded",
            Event::InitiatorFailed { .. } => "InitiatorFailed",
            Event::MessageReceived { .. } => "MessageReceived",
            Event::SessionDisconnected { .. } => "SessionDisconnected",
        };
        MessageType::Event(variant)
    }
}

impl From<&AppEvent> for MessageType {
    fn from(app_event: &AppEvent) -> Self {
        let variant = match app_event {
            AppEvent::StatusChanged { .. } => "StatusChanged",
            AppEvent::PeerDiscovered { .. } => "PeerDiscovered",
            AppEvent::ScanFinished { .. } => "ScanFinished",
            AppEvent::MessageLogged { .. } => "MessageLogged",
            AppEvent::Notification { .. } => "Notification",
            AppEvent::Snapshot(_) => "Snapshot",
            AppEvent::Stopped => "Stopped",
        };
        MessageType::AppEvent(variant)
    }
}

// ----------------------------------------------------------------------------
// Message Summary Generation
// ----------------------------------------------------------------------------

pub trait MessageSummary {
    fn summary(&self) -> String;
}

impl MessageSummary for Command {
    fn summary(&self) -> String {
        match self {
            Command::Connect { peer } => format!("peer:{}", peer.address),
            Command::Send { text } => format!("bytes:{} content:{:.20}...", text.len(), text),
            Command::MakeDiscoverable { duration } => format!("duration:{:?}", duration),
            Command::StartListening => "start listening".to_string(),
            Command::StartScan => "start scan".to_string(),
            Command::CancelScan => "cancel scan".to_string(),
            Command::Disconnect => "disconnect".to_string(),
            Command::GetSnapshot => "requesting snapshot".to_string(),
            Command::Shutdown => "shutting down".to_string(),
        }
    }
}

impl MessageSummary for Event {
    fn summary(&self) -> String {
        match self {
            Event::PeerFound { scan_id, peer } => format!("scan:{} peer:{}", scan_id, peer.address),
            Event::ScanFinished { scan_id } => format!("scan:{}", scan_id),
            Event::ScanFailed { scan_id, error } => format!("scan:{} error:{}", scan_id, error),
            Event::ListenerAccepted { listener_id, connection } => {
                format!("listener:{} peer:{}", listener_id, connection.peer.address)
            }
            Event::ListenerFailed { listener_id, error } => {
                format!("listener:{} error:{}", listener_id, error)
            }
            Event::InitiatorSucceeded { attempt_id, connection } => {
                format!("attempt:{} peer:{}", attempt_id, connection.peer.address)
            }
            Event::InitiatorFailed { attempt_id, peer, error } => {
                format!("attempt:{} peer:{} error:{}", attempt_id, peer.address, error)
            }
            Event::MessageReceived { session_id, content } => {
                format!("session:{} bytes:{}", session_id, content.len())
            }
            Event::SessionDisconnected { session_id, reason } => {
                format!("session:{} reason:{}", session_id, reason)
            }
        }
    }
}

impl MessageSummary for AppEvent {
    fn summary(&self) -> String {
        match self {
            AppEvent::StatusChanged { state, detail } => format!("state:{} detail:{}", state, detail),
            AppEvent::PeerDiscovered { peer } => format!("peer:{}", peer),
            AppEvent::ScanFinished { count } => format!("found:{}", count),
            AppEvent::MessageLogged { message } => {
                format!("from:{} content:{:.20}...", message.sender, message.content)
            }
            AppEvent::Notification { text } => format!("text:{}", text),
            AppEvent::Snapshot(snapshot) => format!(
                "state:{} peers:{} messages:{}",
                snapshot.state,
                snapshot.peers.len(),
                snapshot.messages.len()
            ),
            AppEvent::Stopped => "stopped".to_string(),
        }
    }
}

// ----------------------------------------------------------------------------
// Logger Implementation
// ----------------------------------------------------------------------------

/// Task communication logger
pub trait TaskLogger {
    fn log_send<T>(&self, from: TaskId, to: TaskId, message: &T)
    where
        for<'a> &'a T: Into<MessageType>,
        T: MessageSummary;

    fn log_receive<T>(&self, from: TaskId, to: TaskId, message: &T)
    where
        for<'a> &'a T: Into<MessageType>,
        T: MessageSummary;

    fn log_drop<T>(&self, from: TaskId, to: TaskId, message: &T, reason: &str)
    where
        for<'a> &'a T: Into<MessageType>,
        T: MessageSummary;

    fn log_task_event(&self, task: TaskId, level: LogLevel, message: &str);
}

/// Logger that forwards to the `tracing` subscriber
#[derive(Debug, Clone)]
pub struct TracingLogger {
    min_level: LogLevel,
}

impl TracingLogger {
    pub fn new(min_level: LogLevel) -> Self {
        Self { min_level }
    }

    fn should_log(&self, level: LogLevel) -> bool {
        level >= self.min_level
    }
}

impl Default for TracingLogger {
    fn default() -> Self {
        Self::new(LogLevel::Debug)
    }
}

impl TaskLogger for TracingLogger {
    fn log_send<T>(&self, from: TaskId, to: TaskId, message: &T)
    where
        for<'a> &'a T: Into<MessageType>,
        T: MessageSummary,
    {
        if !self.should_log(LogLevel::Debug) {
            return;
        }
        let message_type: MessageType = message.into();
        tracing::debug!("{} {} {} {} {}", from, Direction::Send, to, message_type, message.summary());
    }

    fn log_receive<T>(&self, from: TaskId, to: TaskId, message: &T)
    where
        for<'a> &'a T: Into<MessageType>,
        T: MessageSummary,
    {
        if !self.should_log(LogLevel::Debug) {
            return;
        }
        let message_type: MessageType = message.into();
        tracing::debug!("{} {} {} {} {}", to, Direction::Receive, from, message_type, message.summary());
    }

    fn log_drop<T>(&self, from: TaskId, to: TaskId, message: &T, reason: &str)
    where
        for<'a> &'a T: Into<MessageType>,
        T: MessageSummary,
    {
        if !self.should_log(LogLevel::Debug) {
            return;
        }
        let message_type: MessageType = message.into();
        tracing::debug!(
            "{} {} {} {} {} reason:{}",
            from,
            Direction::Drop,
            to,
            message_type,
            message.summary(),
            reason
        );
    }

    fn log_task_event(&self, task: TaskId, level: LogLevel, message: &str) {
        if !self.should_log(level) {
            return;
        }
        match level {
            LogLevel::Trace => tracing::trace!("{} {}", task, message),
            LogLevel::Debug => tracing::debug!("{} {}", task, message),
            LogLevel::Info => tracing::info!("{} {}", task, message),
            LogLevel::Warn => tracing::warn!("{} {}", task, message),
            LogLevel::Error => tracing::error!("{} {}", task, message),
        }
    }
}

/// No-op logger for when channel logging is disabled
#[derive(Debug, Clone, Default)]
pub struct NoOpLogger;

impl TaskLogger for NoOpLogger {
    fn log_send<T>(&self, _from: TaskId, _to: TaskId, _message: &T) {}

    fn log_receive<T>(&self, _from: TaskId, _to: TaskId, _message: &T) {}

    fn log_drop<T>(&self, _from: TaskId, _to: TaskId, _message: &T, _reason: &str) {}

    fn log_task_event(&self, _task: TaskId, _level: LogLevel, _message: &str) {}
}
