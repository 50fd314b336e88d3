//! Connection State Machine
//!
//! The coordinator's single source of truth about the current connection.
//! Every change goes through `ConnectionState::transition`, which either
//! yields the next state with an audit entry or rejects the event.

use crate::errors::StateTransitionError;
use crate::types::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;

// ----------------------------------------------------------------------------
// Connection State Types
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Nothing in progress
    #[default]
    Idle,
    /// A discovery scan is running
    Discovering,
    /// Waiting for an inbound connection
    Listening,
    /// An outbound attempt is in flight
    Connecting,
    /// A session is live
    Connected,
    /// The live session is being closed on request
    Disconnecting,
}

impl ConnectionState {
    pub fn state_name(&self) -> &'static str {
        match self {
            ConnectionState::Idle => "Idle",
            ConnectionState::Discovering => "Discovering",
            ConnectionState::Listening => "Listening",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected => "Connected",
            ConnectionState::Disconnecting => "Disconnecting",
        }
    }

    /// Resting state: `Listening` while a listener is live, otherwise `Idle`
    pub fn resting(listener_live: bool) -> Self {
        if listener_live {
            ConnectionState::Listening
        } else {
            ConnectionState::Idle
        }
    }

    pub fn can_send_messages(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    pub fn has_session(&self) -> bool {
        matches!(self, ConnectionState::Connected | ConnectionState::Disconnecting)
    }

    /// Process an event and transition to the new state (consumes self)
    pub fn transition(
        self,
        event: ConnectionEvent,
        context: TransitionContext,
    ) -> Result<StateTransition, StateTransitionError> {
        use ConnectionEvent as E;
        use ConnectionState as S;

        let rest = S::resting(context.listener_live);
        let new_state = match (self, event) {
            // Listening
            (S::Idle | S::Listening, E::StartListening) => S::Listening,
            (S::Discovering | S::Connecting, E::StartListening) => self,
            (S::Listening, E::ListenerStopped) => rest,
            (_, E::ListenerStopped) => self,

            // Discovery
            (S::Idle | S::Listening | S::Discovering, E::ScanRequested) => S::Discovering,
            (S::Discovering, E::ScanEnded) => rest,
            (_, E::ScanEnded) => self,

            // Outbound connection
            (S::Idle | S::Listening | S::Discovering | S::Connecting, E::ConnectRequested) => S::Connecting,
            (S::Connecting, E::InitiatorSucceeded) => S::Connected,
            (S::Connecting, E::InitiatorFailed) => rest,

            // Inbound connection
            (S::Idle | S::Listening | S::Discovering | S::Connecting, E::ListenerAccepted) => S::Connected,

            // Session teardown
            (S::Connected, E::DisconnectRequested) => S::Disconnecting,
            (S::Connected | S::Disconnecting, E::SessionEnded) => rest,

            // Universal
            (_, E::Shutdown) => S::Idle,

            (state, event) => {
                return Err(StateTransitionError::InvalidTransition {
                    from_state: state.state_name().to_string(),
                    event: event.event_name().to_string(),
                    reason: rejection_reason(state, event).to_string(),
                });
            }
        };

        Ok(StateTransition {
            new_state,
            audit_entry: AuditEntry {
                timestamp: Timestamp::now(),
                from_state: self,
                to_state: new_state,
                event,
            },
        })
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.state_name())
    }
}

fn rejection_reason(state: ConnectionState, event: ConnectionEvent) -> &'static str {
    match (state, event) {
        (ConnectionState::Disconnecting, _) => "disconnect in progress",
        (
            ConnectionState::Connected,
            ConnectionEvent::ConnectRequested | ConnectionEvent::StartListening | ConnectionEvent::ScanRequested,
        ) => "already connected",
        (ConnectionState::Connecting, ConnectionEvent::ScanRequested) => "connection attempt in progress",
        (_, ConnectionEvent::DisconnectRequested) => "not connected",
        _ => "not valid in this state",
    }
}

// ----------------------------------------------------------------------------
// State Transition Events
// ----------------------------------------------------------------------------

/// Events that trigger state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionEvent {
    StartListening,
    /// The listener ended without a connection
    ListenerStopped,
    ScanRequested,
    /// Scan finished, failed or was cancelled
    ScanEnded,
    ConnectRequested,
    InitiatorSucceeded,
    InitiatorFailed,
    ListenerAccepted,
    DisconnectRequested,
    /// The session's stream closed, for whatever reason
    SessionEnded,
    Shutdown,
}

impl ConnectionEvent {
    pub fn event_name(&self) -> &'static str {
        match self {
            ConnectionEvent::StartListening => "StartListening",
            ConnectionEvent::ListenerStopped => "ListenerStopped",
            ConnectionEvent::ScanRequested => "ScanRequested",
            ConnectionEvent::ScanEnded => "ScanEnded",
            ConnectionEvent::ConnectRequested => "ConnectRequested",
            ConnectionEvent::InitiatorSucceeded => "InitiatorSucceeded",
            ConnectionEvent::InitiatorFailed => "InitiatorFailed",
            ConnectionEvent::ListenerAccepted => "ListenerAccepted",
            ConnectionEvent::DisconnectRequested => "DisconnectRequested",
            ConnectionEvent::SessionEnded => "SessionEnded",
            ConnectionEvent::Shutdown => "Shutdown",
        }
    }
}

/// Facts outside the state itself that decide where a transition lands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransitionContext {
    pub listener_live: bool,
}

impl TransitionContext {
    pub fn new(listener_live: bool) -> Self {
        Self { listener_live }
    }
}

// ----------------------------------------------------------------------------
// State Transition Results
// ----------------------------------------------------------------------------

/// Result of a state transition
#[derive(Debug, Clone)]
pub struct StateTransition {
    pub new_state: ConnectionState,
    pub audit_entry: AuditEntry,
}

impl StateTransition {
    pub fn changed(&self) -> bool {
        self.audit_entry.from_state != self.audit_entry.to_state
    }
}

/// Audit trail entry for state transitions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: Timestamp,
    pub from_state: ConnectionState,
    pub to_state: ConnectionState,
    pub event: ConnectionEvent,
}

impl fmt::Display for AuditEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} --{}--> {}",
            self.from_state,
            self.event.event_name(),
            self.to_state
        )
    }
}
