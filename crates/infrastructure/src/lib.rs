//! Infrastructure layer - Printer transports and configuration

pub mod config;
pub mod printer;

pub use config::{PrintAgentConfig, TransportConfig, TransportKind, WriterConfig};
#[cfg(feature = "ble")]
pub use printer::BleTransport;
pub use printer::{FileTransport, MockLink, MockTransport};
