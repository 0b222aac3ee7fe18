use thiserror::Error;
use uuid::Uuid;

use crate::error::DomainError;

/// Failure reported by a transport implementation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Wireless transport unavailable")]
    Unavailable,
    #[error("Link to the device was lost")]
    Disconnected,
    #[error("{0}")]
    Io(String),
}

/// Failure to establish a printer session.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConnectError {
    #[error("Bluetooth is not available on this system")]
    TransportUnavailable,
    #[error("Printer selection cancelled or no matching printer found")]
    NoDeviceSelected,
    #[error("Device does not expose the printer service {0}")]
    ServiceNotFound(Uuid),
    #[error("Device does not expose the printer write characteristic {0}")]
    CharacteristicNotFound(Uuid),
    #[error("Failed to connect to printer: {0}")]
    ConnectionFailed(String),
}

impl From<TransportError> for ConnectError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Unavailable => Self::TransportUnavailable,
            other => Self::ConnectionFailed(other.to_string()),
        }
    }
}

/// Failure while streaming a payload to the write endpoint.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WriteError {
    #[error("Printer is not connected")]
    NotConnected,
    #[error("Write failed: {0}")]
    TransportError(String),
}

impl From<TransportError> for WriteError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Disconnected => Self::NotConnected,
            other => Self::TransportError(other.to_string()),
        }
    }
}

/// Outcome of a failed print request, worded for the operator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PrintError {
    #[error("No printer connected. Connect a printer first.")]
    NotConnected,
    #[error("Printer disconnected mid-print. Reconnect and print the receipt again.")]
    LostConnection,
    #[error("Failed to send receipt to printer ({0}). Try printing again.")]
    SendFailed(String),
    #[error("Receipt is missing its {0}")]
    InvalidRecord(&'static str),
}

impl From<WriteError> for PrintError {
    fn from(err: WriteError) -> Self {
        match err {
            WriteError::NotConnected => Self::LostConnection,
            WriteError::TransportError(details) => Self::SendFailed(details),
        }
    }
}

impl From<DomainError> for PrintError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::MissingField(field) => Self::InvalidRecord(field),
            DomainError::InvalidConfiguration(details) => Self::SendFailed(details),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_error_maps_to_print_error() {
        assert_eq!(
            PrintError::from(WriteError::NotConnected),
            PrintError::LostConnection
        );
        assert_eq!(
            PrintError::from(WriteError::TransportError("gatt busy".into())),
            PrintError::SendFailed("gatt busy".into())
        );
    }

    #[test]
    fn test_transport_disconnect_is_not_connected() {
        assert_eq!(
            WriteError::from(TransportError::Disconnected),
            WriteError::NotConnected
        );
        assert_eq!(
            WriteError::from(TransportError::Io("timeout".into())),
            WriteError::TransportError("timeout".into())
        );
    }

    #[test]
    fn test_unavailable_transport_on_connect() {
        assert_eq!(
            ConnectError::from(TransportError::Unavailable),
            ConnectError::TransportUnavailable
        );
        assert!(matches!(
            ConnectError::from(TransportError::Disconnected),
            ConnectError::ConnectionFailed(_)
        ));
    }

    #[test]
    fn test_print_messages_are_distinct() {
        let messages = [
            PrintError::NotConnected.to_string(),
            PrintError::LostConnection.to_string(),
            PrintError::SendFailed("x".into()).to_string(),
            PrintError::InvalidRecord("item").to_string(),
            ConnectError::NoDeviceSelected.to_string(),
        ];
        for (i, a) in messages.iter().enumerate() {
            for b in &messages[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
