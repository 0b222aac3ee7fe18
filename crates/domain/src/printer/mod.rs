//! Printer protocol surface: identifiers, device selection, transport
//! contracts and the error taxonomy shared by every layer.

mod error;
mod filter;
mod transport;

pub use error::{ConnectError, PrintError, TransportError, WriteError};
pub use filter::DeviceFilter;
pub use transport::{
    DeviceIdentity, DisconnectHandler, PrinterLink, ServiceHandle, WirelessTransport,
    WriteEndpoint, resolve_write_endpoint, select_device,
};

use uuid::Uuid;

/// Generic printer profile primary service (`0x18F0`)
pub const PRINTER_SERVICE_UUID: Uuid = Uuid::from_u128(0x000018f0_0000_1000_8000_00805f9b34fb);

/// Write characteristic of the printer service (`0x2AF1`)
pub const WRITE_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x00002af1_0000_1000_8000_00805f9b34fb);
