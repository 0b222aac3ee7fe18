//! Operator-facing wording for every print and connect outcome.

use std::fmt;

use domain::{ConnectError, ConnectionIndicator, PrintError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == NoticeLevel::Error
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let icon = match self.level {
            NoticeLevel::Success => "✅",
            NoticeLevel::Info => "ℹ️",
            NoticeLevel::Error => "❌",
        };
        write!(f, "{} {}", icon, self.message)
    }
}

pub fn connect_notice(result: &Result<String, ConnectError>) -> Notice {
    match result {
        Ok(label) => Notice::new(NoticeLevel::Success, format!("Connected to {}", label)),
        Err(ConnectError::TransportUnavailable) => Notice::new(
            NoticeLevel::Error,
            "Bluetooth is not available on this system. Enable Bluetooth or use the file transport.",
        ),
        Err(ConnectError::NoDeviceSelected) => Notice::new(
            NoticeLevel::Error,
            "Printer selection cancelled or no matching printer found.",
        ),
        Err(ConnectError::ServiceNotFound(_)) => Notice::new(
            NoticeLevel::Error,
            "Selected device is not a supported printer (printer service missing).",
        ),
        Err(ConnectError::CharacteristicNotFound(_)) => Notice::new(
            NoticeLevel::Error,
            "Selected printer does not accept print data (write characteristic missing).",
        ),
        Err(ConnectError::ConnectionFailed(details)) => Notice::new(
            NoticeLevel::Error,
            format!("Could not connect to printer: {}. Try again.", details),
        ),
    }
}

pub fn print_notice(result: &Result<(), PrintError>) -> Notice {
    match result {
        Ok(()) => Notice::new(NoticeLevel::Success, "Label sent to printer successfully!"),
        Err(PrintError::NotConnected) => Notice::new(
            NoticeLevel::Error,
            "No printer connected. Please connect a printer first.",
        ),
        Err(PrintError::LostConnection) => Notice::new(
            NoticeLevel::Error,
            "Printer disconnected mid-print. Reconnect and print the receipt again.",
        ),
        Err(PrintError::SendFailed(details)) => Notice::new(
            NoticeLevel::Error,
            format!(
                "Failed to print label ({}). Check connection and try again.",
                details
            ),
        ),
        Err(PrintError::InvalidRecord(field)) => Notice::new(
            NoticeLevel::Error,
            format!("No data to print: the receipt {} is empty.", field),
        ),
    }
}

/// Notice for a connection indicator change.
pub fn indicator_notice(indicator: &ConnectionIndicator) -> Notice {
    if indicator.connected {
        Notice::new(
            NoticeLevel::Info,
            format!("Printer: {} [{}]", indicator.label, indicator.connect_button),
        )
    } else {
        Notice::new(NoticeLevel::Info, "Printer disconnected")
    }
}
