use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use domain::printer::{
    DisconnectHandler, PRINTER_SERVICE_UUID, ServiceHandle, WRITE_CHARACTERISTIC_UUID,
};
use domain::{
    DeviceFilter, DeviceIdentity, PrinterLink, TransportError, WirelessTransport, WriteEndpoint,
};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{error, info};
use uuid::Uuid;

/// Transport whose single "device" is a capture file.
///
/// Behaves like a printer exposing the generic printer profile: every chunk
/// is appended to the file and flushed before the write resolves. Useful for
/// spooling receipts to a share or inspecting the bytes of a print run.
pub struct FileTransport {
    path: PathBuf,
    name: String,
}

impl FileTransport {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            name: "File-Printer".to_string(),
        }
    }

    /// Advertised name used for device filtering.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl WirelessTransport for FileTransport {
    fn is_available(&self) -> bool {
        true
    }

    async fn request_device(
        &self,
        filter: &DeviceFilter,
    ) -> Result<Option<DeviceIdentity>, TransportError> {
        let advertised = [PRINTER_SERVICE_UUID];
        if !filter.matches(Some(&self.name), &advertised) {
            return Ok(None);
        }
        Ok(Some(DeviceIdentity::new(
            format!("file:{}", self.path.display()),
            Some(self.name.clone()),
        )))
    }

    async fn connect(
        &self,
        _device: &DeviceIdentity,
    ) -> Result<Arc<dyn PrinterLink>, TransportError> {
        info!("Opening capture file {:?}", self.path);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| {
                error!("Failed to open capture file {:?}: {}", self.path, e);
                TransportError::Io(e.to_string())
            })?;

        Ok(Arc::new(FileLink {
            file: tokio::sync::Mutex::new(Some(file)),
            connected: AtomicBool::new(true),
            handler: Mutex::new(None),
        }))
    }
}

struct FileLink {
    file: tokio::sync::Mutex<Option<File>>,
    connected: AtomicBool,
    handler: Mutex<Option<DisconnectHandler>>,
}

#[async_trait]
impl PrinterLink for FileLink {
    async fn resolve_service(&self, service: Uuid) -> Result<Option<ServiceHandle>, TransportError> {
        Ok((service == PRINTER_SERVICE_UUID).then(|| ServiceHandle::new(service)))
    }

    async fn resolve_characteristic(
        &self,
        service: &ServiceHandle,
        characteristic: Uuid,
    ) -> Result<Option<WriteEndpoint>, TransportError> {
        Ok((characteristic == WRITE_CHARACTERISTIC_UUID)
            .then(|| WriteEndpoint::new(service.uuid, characteristic)))
    }

    async fn write(&self, _endpoint: &WriteEndpoint, chunk: &[u8]) -> Result<(), TransportError> {
        let mut guard = self.file.lock().await;
        let file = guard.as_mut().ok_or(TransportError::Disconnected)?;

        file.write_all(chunk).await.map_err(|e| {
            error!("Failed to write to capture file: {}", e);
            TransportError::Io(e.to_string())
        })?;
        file.flush().await.map_err(|e| {
            error!("Failed to flush capture file: {}", e);
            TransportError::Io(e.to_string())
        })
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        if let Some(mut file) = self.file.lock().await.take() {
            file.flush()
                .await
                .map_err(|e| TransportError::Io(e.to_string()))?;
        }
        if self.connected.swap(false, Ordering::SeqCst) {
            if let Ok(handler) = self.handler.lock() {
                if let Some(handler) = handler.as_ref() {
                    handler();
                }
            }
        }
        Ok(())
    }

    fn on_disconnect(&self, handler: DisconnectHandler) {
        if let Ok(mut slot) = self.handler.lock() {
            *slot = Some(handler);
        }
    }
}
