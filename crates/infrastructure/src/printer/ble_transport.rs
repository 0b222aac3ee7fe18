//! Bluetooth Low Energy transport backed by `btleplug`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{
    Central, CentralEvent, CharPropFlags, Characteristic, Manager as _, Peripheral as _,
    ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use domain::printer::{DisconnectHandler, ServiceHandle};
use domain::{
    DeviceFilter, DeviceIdentity, PrinterLink, TransportError, WirelessTransport, WriteEndpoint,
};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Scans the first local adapter and connects to matching printers.
///
/// Selection is non-interactive: the first advertising device that matches
/// the filter wins, unless `device_name` pins an exact name.
pub struct BleTransport {
    adapter: Option<Adapter>,
    scan_timeout: Duration,
    device_name: Option<String>,
    discovered: tokio::sync::Mutex<HashMap<String, Peripheral>>,
}

impl BleTransport {
    pub async fn new(scan_timeout: Duration, device_name: Option<String>) -> Self {
        let adapter = match first_adapter().await {
            Ok(adapter) => adapter,
            Err(e) => {
                warn!(error = %e, "Bluetooth manager unavailable");
                None
            }
        };
        if adapter.is_none() {
            warn!("No Bluetooth adapter found");
        }

        Self {
            adapter,
            scan_timeout,
            device_name,
            discovered: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    fn adapter(&self) -> Result<&Adapter, TransportError> {
        self.adapter.as_ref().ok_or(TransportError::Unavailable)
    }
}

async fn first_adapter() -> Result<Option<Adapter>, btleplug::Error> {
    let manager = Manager::new().await?;
    Ok(manager.adapters().await?.into_iter().next())
}

/// Decides whether an advertisement is an acceptable printer.
fn accepts(
    filter: &DeviceFilter,
    pinned_name: Option<&str>,
    name: Option<&str>,
    services: &[Uuid],
) -> bool {
    match pinned_name {
        Some(pinned) => name == Some(pinned),
        None => filter.matches(name, services),
    }
}

fn map_err(e: btleplug::Error) -> TransportError {
    match e {
        btleplug::Error::NotConnected => TransportError::Disconnected,
        other => TransportError::Io(other.to_string()),
    }
}

/// Runs `release` when a setup step on an already connected peripheral
/// failed, so the device is not left connected without a link.
async fn release_on_failure<T, R>(
    result: Result<T, btleplug::Error>,
    release: R,
) -> Result<T, TransportError>
where
    R: Future<Output = Result<(), btleplug::Error>>,
{
    match result {
        Ok(value) => Ok(value),
        Err(e) => {
            warn!(error = %e, "Printer setup failed; releasing connection");
            if let Err(cleanup) = release.await {
                warn!(error = %cleanup, "Failed to release printer connection");
            }
            Err(map_err(e))
        }
    }
}

#[async_trait]
impl WirelessTransport for BleTransport {
    fn is_available(&self) -> bool {
        self.adapter.is_some()
    }

    async fn request_device(
        &self,
        filter: &DeviceFilter,
    ) -> Result<Option<DeviceIdentity>, TransportError> {
        let adapter = self.adapter()?;

        info!(timeout = ?self.scan_timeout, "🔍 Scanning for printers");
        adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(map_err)?;
        tokio::time::sleep(self.scan_timeout).await;
        if let Err(e) = adapter.stop_scan().await {
            warn!(error = %e, "Failed to stop scan");
        }

        for peripheral in adapter.peripherals().await.map_err(map_err)? {
            let Some(props) = peripheral.properties().await.map_err(map_err)? else {
                continue;
            };
            let name = props.local_name.as_deref();
            debug!(address = %props.address, name = ?name, "Advertisement seen");

            if accepts(filter, self.device_name.as_deref(), name, &props.services) {
                let device = DeviceIdentity::new(props.address.to_string(), props.local_name.clone());
                info!(device = %device.label(), "Printer found");
                self.discovered
                    .lock()
                    .await
                    .insert(device.id.clone(), peripheral);
                return Ok(Some(device));
            }
        }

        Ok(None)
    }

    async fn connect(
        &self,
        device: &DeviceIdentity,
    ) -> Result<Arc<dyn PrinterLink>, TransportError> {
        let adapter = self.adapter()?;
        let peripheral = self
            .discovered
            .lock()
            .await
            .get(&device.id)
            .cloned()
            .ok_or_else(|| TransportError::Io(format!("device {} was not discovered", device.id)))?;

        peripheral.connect().await.map_err(map_err)?;
        let discovered = peripheral.discover_services().await;
        release_on_failure(discovered, peripheral.disconnect()).await?;

        let handler: Arc<Mutex<Option<DisconnectHandler>>> = Arc::new(Mutex::new(None));
        let events = adapter.events().await;
        let mut events = release_on_failure(events, peripheral.disconnect()).await?;
        let id = peripheral.id();
        let on_gone = handler.clone();
        let watcher = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if let CentralEvent::DeviceDisconnected(gone) = event {
                    if gone == id {
                        if let Ok(handler) = on_gone.lock() {
                            if let Some(handler) = handler.as_ref() {
                                handler();
                            }
                        }
                        break;
                    }
                }
            }
        });

        Ok(Arc::new(BleLink {
            peripheral,
            characteristics: Mutex::new(HashMap::new()),
            handler,
            watcher: Mutex::new(Some(watcher)),
        }))
    }
}

struct BleLink {
    peripheral: Peripheral,
    characteristics: Mutex<HashMap<Uuid, Characteristic>>,
    handler: Arc<Mutex<Option<DisconnectHandler>>>,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

#[async_trait]
impl PrinterLink for BleLink {
    async fn resolve_service(&self, service: Uuid) -> Result<Option<ServiceHandle>, TransportError> {
        Ok(self
            .peripheral
            .services()
            .iter()
            .find(|s| s.uuid == service)
            .map(|s| ServiceHandle::new(s.uuid)))
    }

    async fn resolve_characteristic(
        &self,
        service: &ServiceHandle,
        characteristic: Uuid,
    ) -> Result<Option<WriteEndpoint>, TransportError> {
        let Some(found) = self
            .peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.service_uuid == service.uuid && c.uuid == characteristic)
        else {
            return Ok(None);
        };

        if let Ok(mut cache) = self.characteristics.lock() {
            cache.insert(characteristic, found);
        }
        Ok(Some(WriteEndpoint::new(service.uuid, characteristic)))
    }

    async fn write(&self, endpoint: &WriteEndpoint, chunk: &[u8]) -> Result<(), TransportError> {
        let characteristic = self
            .characteristics
            .lock()
            .ok()
            .and_then(|cache| cache.get(&endpoint.characteristic).cloned())
            .ok_or_else(|| {
                TransportError::Io(format!(
                    "characteristic {} was not resolved",
                    endpoint.characteristic
                ))
            })?;

        let write_type = if characteristic.properties.contains(CharPropFlags::WRITE) {
            WriteType::WithResponse
        } else {
            WriteType::WithoutResponse
        };

        self.peripheral
            .write(&characteristic, chunk, write_type)
            .await
            .map_err(map_err)
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.peripheral.disconnect().await.map_err(map_err)
    }

    fn on_disconnect(&self, handler: DisconnectHandler) {
        if let Ok(mut slot) = self.handler.lock() {
            *slot = Some(handler);
        }
    }
}

impl Drop for BleLink {
    fn drop(&mut self) {
        if let Ok(mut watcher) = self.watcher.lock() {
            if let Some(watcher) = watcher.take() {
                watcher.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::printer::PRINTER_SERVICE_UUID;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_pinned_name_overrides_filter() {
        let filter = DeviceFilter::default();
        assert!(accepts(&filter, Some("Kiosk-1"), Some("Kiosk-1"), &[]));
        assert!(!accepts(
            &filter,
            Some("Kiosk-1"),
            Some("BT-Printer"),
            &[PRINTER_SERVICE_UUID]
        ));
    }

    #[test]
    fn test_filter_applies_without_pin() {
        let filter = DeviceFilter::default();
        assert!(accepts(&filter, None, None, &[PRINTER_SERVICE_UUID]));
        assert!(accepts(&filter, None, Some("Printer-58"), &[]));
        assert!(!accepts(&filter, None, Some("Watch"), &[]));
    }

    #[tokio::test]
    async fn test_failed_setup_releases_peripheral() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = released.clone();
        let result: Result<(), _> = release_on_failure(
            Err(btleplug::Error::NotSupported("discovery".to_string())),
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(btleplug::Error::NotConnected)
            },
        )
        .await;

        assert!(matches!(result, Err(TransportError::Io(_))));
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_successful_setup_keeps_peripheral() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = released.clone();
        let result = release_on_failure(Ok(7), async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .await;

        assert_eq!(result, Ok(7));
        assert_eq!(released.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_not_connected_maps_to_disconnected() {
        assert_eq!(
            map_err(btleplug::Error::NotConnected),
            TransportError::Disconnected
        );
    }
}
