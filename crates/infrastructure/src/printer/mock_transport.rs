use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use domain::printer::{
    DisconnectHandler, PRINTER_SERVICE_UUID, ServiceHandle, WRITE_CHARACTERISTIC_UUID,
};
use domain::{
    DeviceFilter, DeviceIdentity, PrinterLink, TransportError, WirelessTransport, WriteEndpoint,
};
use uuid::Uuid;

/// Scriptable in-memory transport.
///
/// Every `connect` creates a fresh [`MockLink`]; links stay inspectable
/// through [`MockTransport::links`] after the session is gone.
#[derive(Clone)]
pub struct MockTransport {
    script: Arc<Mutex<Script>>,
    links: Arc<Mutex<Vec<MockLink>>>,
    selections: Arc<AtomicUsize>,
}

#[derive(Clone)]
struct Script {
    available: bool,
    device: Option<DeviceIdentity>,
    advertised: Vec<Uuid>,
    connect_error: Option<String>,
    services: Vec<Uuid>,
    characteristics: Vec<Uuid>,
    disconnect_error: Option<String>,
    disconnect_after_writes: Option<usize>,
    write_error_at: Option<(usize, String)>,
    write_delay: Option<Duration>,
    connect_delay: Option<Duration>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// One advertising printer exposing the generic printer profile.
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(Script {
                available: true,
                device: Some(DeviceIdentity::new(
                    "00:11:22:33:44:55",
                    Some("BT-Printer".to_string()),
                )),
                advertised: vec![PRINTER_SERVICE_UUID],
                connect_error: None,
                services: vec![PRINTER_SERVICE_UUID],
                characteristics: vec![WRITE_CHARACTERISTIC_UUID],
                disconnect_error: None,
                disconnect_after_writes: None,
                write_error_at: None,
                write_delay: None,
                connect_delay: None,
            })),
            links: Arc::new(Mutex::new(Vec::new())),
            selections: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn edit(self, f: impl FnOnce(&mut Script)) -> Self {
        if let Ok(mut script) = self.script.lock() {
            f(&mut script);
        }
        self
    }

    pub fn unavailable(self) -> Self {
        self.edit(|s| s.available = false)
    }

    /// The selection prompt is dismissed without choosing a device.
    pub fn cancel_selection(self) -> Self {
        self.edit(|s| s.device = None)
    }

    pub fn with_device(self, device: DeviceIdentity, advertised: Vec<Uuid>) -> Self {
        self.edit(|s| {
            s.device = Some(device);
            s.advertised = advertised;
        })
    }

    pub fn failing_connect(self, message: &str) -> Self {
        let message = message.to_string();
        self.edit(|s| s.connect_error = Some(message))
    }

    pub fn without_service(self) -> Self {
        self.edit(|s| s.services.clear())
    }

    pub fn without_characteristic(self) -> Self {
        self.edit(|s| s.characteristics.clear())
    }

    pub fn failing_disconnect(self, message: &str) -> Self {
        let message = message.to_string();
        self.edit(|s| s.disconnect_error = Some(message))
    }

    /// The device drops the link once `writes` chunks were acknowledged.
    pub fn disconnect_after_writes(self, writes: usize) -> Self {
        self.edit(|s| s.disconnect_after_writes = Some(writes))
    }

    /// The write with zero-based index `index` fails with `message`.
    pub fn failing_write_at(self, index: usize, message: &str) -> Self {
        let message = message.to_string();
        self.edit(|s| s.write_error_at = Some((index, message)))
    }

    /// Every write takes `delay` before it is acknowledged.
    pub fn with_write_delay(self, delay: Duration) -> Self {
        self.edit(|s| s.write_delay = Some(delay))
    }

    /// Link setup takes `delay` before the link is returned.
    pub fn with_connect_delay(self, delay: Duration) -> Self {
        self.edit(|s| s.connect_delay = Some(delay))
    }

    /// Number of times the selection prompt was shown.
    pub fn selection_count(&self) -> usize {
        self.selections.load(Ordering::SeqCst)
    }

    pub fn links(&self) -> Vec<MockLink> {
        self.links
            .lock()
            .map(|links| links.clone())
            .unwrap_or_default()
    }

    pub fn last_link(&self) -> Option<MockLink> {
        self.links().pop()
    }

    /// Every chunk written over every link, in order.
    pub fn all_writes(&self) -> Vec<Vec<u8>> {
        self.links().iter().flat_map(|link| link.writes()).collect()
    }

    fn script(&self) -> Result<Script, TransportError> {
        self.script
            .lock()
            .map(|script| script.clone())
            .map_err(|_| TransportError::Io("mock script poisoned".to_string()))
    }
}

#[async_trait]
impl WirelessTransport for MockTransport {
    fn is_available(&self) -> bool {
        self.script().map(|s| s.available).unwrap_or(false)
    }

    async fn request_device(
        &self,
        filter: &DeviceFilter,
    ) -> Result<Option<DeviceIdentity>, TransportError> {
        self.selections.fetch_add(1, Ordering::SeqCst);
        let script = self.script()?;
        Ok(script
            .device
            .filter(|device| filter.matches(device.name.as_deref(), &script.advertised)))
    }

    async fn connect(
        &self,
        _device: &DeviceIdentity,
    ) -> Result<Arc<dyn PrinterLink>, TransportError> {
        let script = self.script()?;
        if let Some(delay) = script.connect_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = script.connect_error {
            return Err(TransportError::Io(message));
        }

        let link = MockLink::new(script);
        if let Ok(mut links) = self.links.lock() {
            links.push(link.clone());
        }
        Ok(Arc::new(link))
    }
}

/// Link created by [`MockTransport`].
#[derive(Clone)]
pub struct MockLink {
    state: Arc<LinkState>,
}

struct LinkState {
    script: Script,
    connected: AtomicBool,
    writes: Mutex<Vec<Vec<u8>>>,
    handler: Mutex<Option<DisconnectHandler>>,
    disconnect_calls: AtomicUsize,
}

impl MockLink {
    fn new(script: Script) -> Self {
        Self {
            state: Arc::new(LinkState {
                script,
                connected: AtomicBool::new(true),
                writes: Mutex::new(Vec::new()),
                handler: Mutex::new(None),
                disconnect_calls: AtomicUsize::new(0),
            }),
        }
    }

    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.state
            .writes
            .lock()
            .map(|writes| writes.clone())
            .unwrap_or_default()
    }

    /// All written bytes concatenated.
    pub fn received(&self) -> Vec<u8> {
        self.writes().concat()
    }

    pub fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::SeqCst)
    }

    /// Live handles to this link, including the transport's own record.
    pub fn open_handles(&self) -> usize {
        Arc::strong_count(&self.state)
    }

    pub fn disconnect_calls(&self) -> usize {
        self.state.disconnect_calls.load(Ordering::SeqCst)
    }

    /// Simulates the device going away (power off, out of range).
    pub fn emit_disconnect(&self) {
        self.state.connected.store(false, Ordering::SeqCst);
        if let Ok(handler) = self.state.handler.lock() {
            if let Some(handler) = handler.as_ref() {
                handler();
            }
        }
    }
}

#[async_trait]
impl PrinterLink for MockLink {
    async fn resolve_service(&self, service: Uuid) -> Result<Option<ServiceHandle>, TransportError> {
        Ok(self
            .state
            .script
            .services
            .contains(&service)
            .then(|| ServiceHandle::new(service)))
    }

    async fn resolve_characteristic(
        &self,
        service: &ServiceHandle,
        characteristic: Uuid,
    ) -> Result<Option<WriteEndpoint>, TransportError> {
        Ok(self
            .state
            .script
            .characteristics
            .contains(&characteristic)
            .then(|| WriteEndpoint::new(service.uuid, characteristic)))
    }

    async fn write(&self, _endpoint: &WriteEndpoint, chunk: &[u8]) -> Result<(), TransportError> {
        if let Some(delay) = self.state.script.write_delay {
            tokio::time::sleep(delay).await;
        }
        if !self.is_connected() {
            return Err(TransportError::Disconnected);
        }

        let written = {
            let mut writes = self
                .state
                .writes
                .lock()
                .map_err(|_| TransportError::Io("mock writes poisoned".to_string()))?;
            if let Some((index, message)) = &self.state.script.write_error_at {
                if *index == writes.len() {
                    return Err(TransportError::Io(message.clone()));
                }
            }
            writes.push(chunk.to_vec());
            writes.len()
        };

        if self.state.script.disconnect_after_writes == Some(written) {
            self.emit_disconnect();
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.state.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.state.script.disconnect_error {
            return Err(TransportError::Io(message.clone()));
        }
        if self.is_connected() {
            self.emit_disconnect();
        }
        Ok(())
    }

    fn on_disconnect(&self, handler: DisconnectHandler) {
        if let Ok(mut slot) = self.state.handler.lock() {
            *slot = Some(handler);
        }
    }
}
