//! Domain layer - Pure printing model with no I/O
//!
//! This crate contains:
//! - Entities (ReceiptRecord, DeviceIdentity)
//! - Value Objects (ConnectionState, SessionStatus, DeviceFilter)
//! - The printer error taxonomy
//! - Transport interfaces (traits) implemented by the infrastructure layer
//!
//! Principles:
//! - No dependencies on infrastructure
//! - No async runtime; only trait contracts are async
//! - Testable in isolation

pub mod error;
pub mod printer;
pub mod receipt;
pub mod session;

// Re-export commonly used types
pub use error::DomainError;
pub use printer::{
    ConnectError, DeviceFilter, DeviceIdentity, PrintError, PrinterLink, TransportError,
    WirelessTransport, WriteEndpoint, WriteError,
};
pub use receipt::{ReceiptRecord, ReceiptTemplate};
pub use session::{ConnectionIndicator, ConnectionState, SessionStatus};
