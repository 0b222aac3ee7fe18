use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{ConnectError, TransportError};
use super::filter::DeviceFilter;

/// Callback a link invokes when the transport reports the device gone.
pub type DisconnectHandler = Box<dyn Fn() + Send + Sync>;

/// Transport-assigned identity of a selected device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub id: String,
    pub name: Option<String>,
}

impl DeviceIdentity {
    pub fn new(id: impl Into<String>, name: Option<String>) -> Self {
        Self {
            id: id.into(),
            name,
        }
    }

    /// Advertised name, falling back to the transport id.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// Resolved primary service on a connected device.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceHandle {
    pub uuid: Uuid,
}

impl ServiceHandle {
    pub fn new(uuid: Uuid) -> Self {
        Self { uuid }
    }
}

/// Characteristic that accepts outbound print data.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WriteEndpoint {
    pub service: Uuid,
    pub characteristic: Uuid,
}

impl WriteEndpoint {
    pub fn new(service: Uuid, characteristic: Uuid) -> Self {
        Self {
            service,
            characteristic,
        }
    }
}

/// Adapter-level access to the wireless stack.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WirelessTransport: Send + Sync {
    /// Whether the wireless stack is present on this host
    fn is_available(&self) -> bool;

    /// Ask the user/environment to pick a device matching `filter`.
    /// `Ok(None)` means the selection was cancelled or nothing matched.
    async fn request_device(
        &self,
        filter: &DeviceFilter,
    ) -> Result<Option<DeviceIdentity>, TransportError>;

    /// Open a link to a previously selected device
    async fn connect(&self, device: &DeviceIdentity)
    -> Result<Arc<dyn PrinterLink>, TransportError>;
}

/// An open link to one device.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PrinterLink: Send + Sync {
    async fn resolve_service(&self, service: Uuid) -> Result<Option<ServiceHandle>, TransportError>;

    async fn resolve_characteristic(
        &self,
        service: &ServiceHandle,
        characteristic: Uuid,
    ) -> Result<Option<WriteEndpoint>, TransportError>;

    /// Write one bounded chunk and wait for the transport acknowledgment
    async fn write(&self, endpoint: &WriteEndpoint, chunk: &[u8]) -> Result<(), TransportError>;

    async fn disconnect(&self) -> Result<(), TransportError>;

    /// Register the handler invoked when the device drops the link
    fn on_disconnect(&self, handler: DisconnectHandler);
}

/// Runs device selection, mapping an unavailable stack and a cancelled
/// prompt onto the connect taxonomy.
pub async fn select_device(
    transport: &dyn WirelessTransport,
    filter: &DeviceFilter,
) -> Result<DeviceIdentity, ConnectError> {
    if !transport.is_available() {
        return Err(ConnectError::TransportUnavailable);
    }

    transport
        .request_device(filter)
        .await?
        .ok_or(ConnectError::NoDeviceSelected)
}

/// Looks up the service and then its write characteristic.
pub async fn resolve_write_endpoint(
    link: &dyn PrinterLink,
    service: Uuid,
    characteristic: Uuid,
) -> Result<WriteEndpoint, ConnectError> {
    let handle = link
        .resolve_service(service)
        .await?
        .ok_or(ConnectError::ServiceNotFound(service))?;

    link.resolve_characteristic(&handle, characteristic)
        .await?
        .ok_or(ConnectError::CharacteristicNotFound(characteristic))
}
