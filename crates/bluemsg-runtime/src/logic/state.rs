//! Coordinator State Management
//!
//! Everything the coordinator owns: the connection state, the discovered
//! peers, the message log and the handles of its live workers.

use crate::workers::{InitiatorHandle, ListenerHandle, ScanHandle, SessionHandle};
use bluemsg_core::{
    internal::{AuditEntry, LogLevel, NoOpLogger, TaskId, TaskLogger, TracingLogger},
    AppEvent, Command, ConnectionEvent, ConnectionState, DiscoveredPeers, Event, MessageLog, Snapshot,
    StateTransitionError, StatusDetail, TransitionContext, WorkerId,
};
use tracing::debug;

/// Audit entries kept for inspection; older ones are dropped
const AUDIT_TRAIL_LIMIT: usize = 256;

// ----------------------------------------------------------------------------
// Coordinator State
// ----------------------------------------------------------------------------

/// State owned exclusively by the coordinator task
#[derive(Debug, Default)]
pub struct CoordinatorState {
    /// Current connection state
    pub connection: ConnectionState,
    /// Peers seen by the current (or last) scan
    pub peers: DiscoveredPeers,
    /// Every message sent or received, in order
    pub messages: MessageLog,
    /// Live listener, if any
    pub listener: Option<ListenerHandle>,
    /// Scan in progress, if any
    pub scan: Option<ScanHandle>,
    /// Outbound attempt in progress, if any
    pub initiator: Option<InitiatorHandle>,
    /// The single live session, if any
    pub session: Option<SessionHandle>,
    /// App events produced while handling the current command or event
    pub outbox: Vec<AppEvent>,
    /// Recent state transitions
    pub audit_trail: Vec<AuditEntry>,
    /// Statistics
    pub stats: CoordinatorStats,
    next_worker_id: u64,
}

impl CoordinatorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh worker generation
    pub fn next_worker_id(&mut self) -> WorkerId {
        self.next_worker_id += 1;
        WorkerId::new(self.next_worker_id)
    }

    pub fn listener_live(&self) -> bool {
        self.listener.is_some()
    }

    /// Apply a state machine event, recording the audit entry
    ///
    /// Returns whether the state actually changed.
    pub fn apply(&mut self, event: ConnectionEvent) -> Result<bool, StateTransitionError> {
        let transition = self
            .connection
            .transition(event, TransitionContext::new(self.listener_live()))?;
        let changed = transition.changed();
        if changed {
            debug!("State {}", transition.audit_entry);
            self.stats.state_transitions += 1;
        }
        self.connection = transition.new_state;
        self.audit_trail.push(transition.audit_entry);
        if self.audit_trail.len() > AUDIT_TRAIL_LIMIT {
            let excess = self.audit_trail.len() - AUDIT_TRAIL_LIMIT;
            self.audit_trail.drain(..excess);
        }
        Ok(changed)
    }

    /// Check an event against the state machine without applying it
    pub fn check(&self, event: ConnectionEvent) -> Result<(), StateTransitionError> {
        self.connection
            .transition(event, TransitionContext::new(self.listener_live()))
            .map(|_| ())
    }

    pub fn emit(&mut self, event: AppEvent) {
        self.outbox.push(event);
    }

    pub fn emit_status(&mut self, detail: StatusDetail) {
        self.outbox.push(AppEvent::StatusChanged {
            state: self.connection,
            detail,
        });
    }

    pub fn notify<T: Into<String>>(&mut self, text: T) {
        self.outbox.push(AppEvent::Notification { text: text.into() });
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.connection,
            connected_peer: self.session.as_ref().map(|session| session.peer().clone()),
            peers: self.peers.to_vec(),
            messages: self.messages.to_vec(),
            listening: self.listener_live(),
        }
    }
}

/// Statistics for the coordinator task
#[derive(Debug, Clone, Default)]
pub struct CoordinatorStats {
    pub commands_processed: u64,
    pub events_processed: u64,
    pub stale_events: u64,
    pub app_events_generated: u64,
    pub state_transitions: u64,
    pub messages_sent: u64,
    pub messages_received: u64,
}

// ----------------------------------------------------------------------------
// Logger Wrapper
// ----------------------------------------------------------------------------

/// Logger wrapper for object safety
#[derive(Debug, Clone)]
pub enum LoggerWrapper {
    Tracing(TracingLogger),
    NoOp(NoOpLogger),
}

impl Default for LoggerWrapper {
    fn default() -> Self {
        LoggerWrapper::Tracing(TracingLogger::default())
    }
}

impl LoggerWrapper {
    pub fn log_receive_command(&self, from: TaskId, to: TaskId, message: &Command) {
        match self {
            LoggerWrapper::Tracing(logger) => logger.log_receive(from, to, message),
            LoggerWrapper::NoOp(logger) => logger.log_receive(from, to, message),
        }
    }

    pub fn log_receive_event(&self, from: TaskId, to: TaskId, message: &Event) {
        match self {
            LoggerWrapper::Tracing(logger) => logger.log_receive(from, to, message),
            LoggerWrapper::NoOp(logger) => logger.log_receive(from, to, message),
        }
    }

    pub fn log_send_app_event(&self, from: TaskId, to: TaskId, message: &AppEvent) {
        match self {
            LoggerWrapper::Tracing(logger) => logger.log_send(from, to, message),
            LoggerWrapper::NoOp(logger) => logger.log_send(from, to, message),
        }
    }

    pub fn log_task_event(&self, task_id: TaskId, level: LogLevel, message: &str) {
        match self {
            LoggerWrapper::Tracing(logger) => logger.log_task_event(task_id, level, message),
            LoggerWrapper::NoOp(logger) => logger.log_task_event(task_id, level, message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_ids_are_unique() {
        let mut state = CoordinatorState::new();
        let a = state.next_worker_id();
        let b = state.next_worker_id();
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn test_apply_records_audit_and_rejects_invalid() {
        let mut state = CoordinatorState::new();
        assert_eq!(state.apply(ConnectionEvent::ScanRequested), Ok(true));
        assert_eq!(state.connection, ConnectionState::Discovering);
        assert_eq!(state.apply(ConnectionEvent::ScanEnded), Ok(true));
        assert_eq!(state.connection, ConnectionState::Idle);
        assert!(state.apply(ConnectionEvent::DisconnectRequested).is_err());
        assert_eq!(state.audit_trail.len(), 2);
    }

    #[test]
    fn test_snapshot_reflects_state() {
        let mut state = CoordinatorState::new();
        state.peers.insert(bluemsg_core::PeerDevice::new("A", None));
        let snapshot = state.snapshot();
        assert_eq!(snapshot.state, ConnectionState::Idle);
        assert_eq!(snapshot.peers.len(), 1);
        assert!(snapshot.connected_peer.is_none());
        assert!(!snapshot.listening);
    }
}
