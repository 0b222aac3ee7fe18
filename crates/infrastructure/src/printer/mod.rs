#[cfg(feature = "ble")]
pub mod ble_transport;
pub mod file_transport;
pub mod mock_transport;

#[cfg(feature = "ble")]
pub use ble_transport::BleTransport;
pub use file_transport::FileTransport;
pub use mock_transport::{MockLink, MockTransport};
