//! Error types for the radio backends

use bluemsg_core::{BluemsgError, TransportError};
use thiserror::Error;

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Errors raised inside a radio backend before they reach the coordinator
#[derive(Error, Debug)]
pub enum RadioError {
    #[error("Radio adapter not available: {0}")]
    AdapterNotAvailable(String),

    #[error("Radio adapter is powered off")]
    AdapterPoweredOff,

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid peer address: {0}")]
    InvalidAddress(String),

    #[error("Service registration failed: {0}")]
    RegistrationFailed(String),

    #[error("Peer did not identify the service: {0}")]
    Handshake(String),

    #[error("Malformed beacon: {0}")]
    Beacon(#[from] bincode::Error),

    #[error("Failed to connect to {address}: {reason}")]
    ConnectionFailed { address: String, reason: String },

    #[error("Discovery failed: {0}")]
    DiscoveryFailed(String),

    #[error("Network I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<RadioError> for TransportError {
    fn from(err: RadioError) -> Self {
        match err {
            RadioError::AdapterPoweredOff => TransportError::RadioDisabled,
            RadioError::PermissionDenied(permission) => TransportError::PermissionDenied { permission },
            RadioError::ConnectionFailed { address, reason } => TransportError::ConnectRefused { address, reason },
            RadioError::Io(io) => TransportError::from_stream_io(io),
            other => TransportError::unavailable(other.to_string()),
        }
    }
}

impl From<RadioError> for BluemsgError {
    fn from(err: RadioError) -> Self {
        BluemsgError::Transport(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_mapping() {
        assert!(matches!(
            TransportError::from(RadioError::AdapterPoweredOff),
            TransportError::RadioDisabled
        ));
        assert!(matches!(
            TransportError::from(RadioError::ConnectionFailed {
                address: "10.0.0.2:4000".into(),
                reason: "refused".into()
            }),
            TransportError::ConnectRefused { .. }
        ));
        assert!(matches!(
            TransportError::from(RadioError::RegistrationFailed("busy".into())),
            TransportError::TransportUnavailable { .. }
        ));
    }
}
