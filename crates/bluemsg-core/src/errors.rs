//! Error types for BlueMsg
//!
//! Transport failures are classified by `TransportError` so the coordinator can
//! decide how to report them. `BluemsgError` unifies transport, channel, framing
//! and configuration errors for the rest of the workspace.

use std::time::Duration;

// ----------------------------------------------------------------------------
// Transport Errors
// ----------------------------------------------------------------------------

/// Failures raised by a radio backend or a connected stream
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Radio is powered off")]
    RadioDisabled,
    #[error("Radio is not supported on this device")]
    RadioUnsupported,
    #[error("Missing permission: {permission}")]
    PermissionDenied { permission: String },
    #[error("Transport is not available: {reason}")]
    TransportUnavailable { reason: String },
    #[error("Connection refused by {address}: {reason}")]
    ConnectRefused { address: String, reason: String },
    #[error("Connection to {address} timed out after {duration_ms}ms")]
    ConnectTimeout { address: String, duration_ms: u64 },
    #[error("Stream disconnected: {reason}")]
    Disconnected { reason: String },
    #[error("Operation cancelled")]
    Cancelled,
    #[error("Endpoint closed")]
    Closed,
    #[error("Message too large: {size} bytes (max: {max_size})")]
    MessageTooLarge { size: usize, max_size: usize },
    #[error("Network I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Radio cannot ever be used; the coordinator stops when it sees this
    pub fn is_fatal(&self) -> bool {
        matches!(self, TransportError::RadioUnsupported)
    }

    /// Failures that stem from the radio itself rather than a single peer
    pub fn is_radio_state(&self) -> bool {
        matches!(
            self,
            TransportError::RadioDisabled
                | TransportError::RadioUnsupported
                | TransportError::PermissionDenied { .. }
        )
    }

    /// Build a `Disconnected` error from any displayable cause
    pub fn disconnected<R: Into<String>>(reason: R) -> Self {
        TransportError::Disconnected {
            reason: reason.into(),
        }
    }

    /// Build a `TransportUnavailable` error from any displayable cause
    pub fn unavailable<R: Into<String>>(reason: R) -> Self {
        TransportError::TransportUnavailable {
            reason: reason.into(),
        }
    }

    /// Build a `ConnectTimeout` error for the given address and elapsed budget
    pub fn connect_timeout<A: Into<String>>(address: A, budget: Duration) -> Self {
        TransportError::ConnectTimeout {
            address: address.into(),
            duration_ms: budget.as_millis() as u64,
        }
    }

    /// Classify an I/O error raised while a stream is connected
    pub fn from_stream_io(err: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match err.kind() {
            ErrorKind::UnexpectedEof
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
            | ErrorKind::NotConnected => TransportError::disconnected(err.to_string()),
            ErrorKind::InvalidData => TransportError::disconnected(format!("protocol violation: {}", err)),
            _ => TransportError::Io(err),
        }
    }
}

// ----------------------------------------------------------------------------
// State Transition Errors
// ----------------------------------------------------------------------------

/// Errors that can occur during connection state transitions
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateTransitionError {
    #[error("Invalid transition from {from_state} on {event}: {reason}")]
    InvalidTransition {
        from_state: String,
        event: String,
        reason: String,
    },
}

// ----------------------------------------------------------------------------
// Unified Error Type
// ----------------------------------------------------------------------------

/// Core error type for BlueMsg
#[derive(Debug, thiserror::Error)]
pub enum BluemsgError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("State transition error: {0}")]
    StateTransition(#[from] StateTransitionError),

    /// Channel communication error between tasks
    #[error("Channel error: {message}")]
    Channel { message: String },

    /// Configuration error
    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    /// Malformed frame or payload on the wire
    #[error("Framing error: {reason}")]
    Framing { reason: String },
}

// ----------------------------------------------------------------------------
// Convenience Error Constructors
// ----------------------------------------------------------------------------

impl BluemsgError {
    /// Create a channel error with a message
    pub fn channel_error<T: Into<String>>(message: T) -> Self {
        BluemsgError::Channel {
            message: message.into(),
        }
    }

    /// Create a configuration error with a reason
    pub fn config_error<T: Into<String>>(reason: T) -> Self {
        BluemsgError::Configuration {
            reason: reason.into(),
        }
    }

    /// Create a framing error with a reason
    pub fn framing_error<T: Into<String>>(reason: T) -> Self {
        BluemsgError::Framing {
            reason: reason.into(),
        }
    }
}

/// Result type alias for BlueMsg operations
pub type BluemsgResult<T> = Result<T, BluemsgError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_io_classification() {
        let eof = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        assert!(matches!(
            TransportError::from_stream_io(eof),
            TransportError::Disconnected { .. }
        ));

        let other = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        assert!(matches!(TransportError::from_stream_io(other), TransportError::Io(_)));
    }

    #[test]
    fn test_only_unsupported_is_fatal() {
        assert!(TransportError::RadioUnsupported.is_fatal());
        assert!(!TransportError::RadioDisabled.is_fatal());
        assert!(TransportError::RadioDisabled.is_radio_state());
        assert!(!TransportError::Closed.is_radio_state());
    }
}
