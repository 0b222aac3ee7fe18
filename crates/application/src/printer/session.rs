//! Printer session lifecycle.
//!
//! [`TransportSession`] owns the one logical connection to a printer. All
//! changes to the connection state go through [`SessionStateMachine::handle`],
//! including disconnect events raised by the transport; everything else reads
//! the published [`SessionStatus`] snapshots.

use std::fmt;
use std::sync::Arc;

use domain::printer::{
    PRINTER_SERVICE_UUID, WRITE_CHARACTERISTIC_UUID, resolve_write_endpoint, select_device,
};
use domain::{
    ConnectError, ConnectionState, DeviceFilter, DeviceIdentity, PrinterLink, SessionStatus,
    TransportError, WirelessTransport, WriteEndpoint,
};
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Messages that drive the session state machine.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A device was selected and link setup begins
    ConnectStarted,
    /// Link setup finished with a resolved write endpoint
    Established {
        generation: u64,
        device: DeviceIdentity,
    },
    ConnectFailed {
        generation: u64,
    },
    /// The application tore the session down
    DisconnectRequested {
        generation: u64,
    },
    /// The transport reported the device gone
    TransportDisconnected {
        generation: u64,
    },
}

/// Single writer of the session status.
#[derive(Debug)]
pub struct SessionStateMachine {
    status: watch::Sender<SessionStatus>,
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStateMachine {
    pub fn new() -> Self {
        let (status, _) = watch::channel(SessionStatus::default());
        Self { status }
    }

    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    /// Applies `event` and returns the resulting status. Events stamped with
    /// a generation other than the current one are ignored.
    pub fn handle(&self, event: SessionEvent) -> SessionStatus {
        self.status.send_if_modified(|status| match &event {
            SessionEvent::ConnectStarted => match status.state.to_connecting() {
                Ok(next) => {
                    status.state = next;
                    status.device = None;
                    status.generation += 1;
                    debug!(generation = status.generation, "Printer session connecting");
                    true
                }
                Err(reason) => {
                    debug!(state = %status.state, reason, "Ignoring connect start");
                    false
                }
            },
            SessionEvent::Established { generation, device } => {
                if status.generation != *generation {
                    return false;
                }
                match status.state.to_connected() {
                    Ok(next) => {
                        status.state = next;
                        status.device = Some(device.clone());
                        info!(device = %device.label(), generation, "Printer session connected");
                        true
                    }
                    Err(reason) => {
                        debug!(generation, reason, "Ignoring stale connect completion");
                        false
                    }
                }
            }
            SessionEvent::ConnectFailed { generation }
            | SessionEvent::DisconnectRequested { generation } => {
                if status.generation != *generation
                    || status.state == ConnectionState::Disconnected
                {
                    return false;
                }
                status.state = status.state.to_disconnected();
                status.device = None;
                debug!(generation, "Printer session closed");
                true
            }
            SessionEvent::TransportDisconnected { generation } => {
                if status.generation != *generation
                    || status.state == ConnectionState::Disconnected
                {
                    debug!(generation, "Ignoring disconnect event for a closed session");
                    return false;
                }
                warn!(generation, "Printer disconnected");
                status.state = status.state.to_disconnected();
                status.device = None;
                true
            }
        });
        self.status()
    }
}

/// Handle to one established printer session.
///
/// Cheap to clone. Once the session is torn down or the device drops, every
/// clone reports `Disconnected` and refuses further writes.
#[derive(Clone)]
pub struct PrinterSession {
    device: DeviceIdentity,
    endpoint: WriteEndpoint,
    link: Arc<dyn PrinterLink>,
    generation: u64,
    status: watch::Receiver<SessionStatus>,
}

impl fmt::Debug for PrinterSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrinterSession")
            .field("device", &self.device)
            .field("endpoint", &self.endpoint)
            .field("generation", &self.generation)
            .field("state", &self.connection_state())
            .finish()
    }
}

impl PrinterSession {
    pub fn device(&self) -> &DeviceIdentity {
        &self.device
    }

    pub fn endpoint(&self) -> &WriteEndpoint {
        &self.endpoint
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn connection_state(&self) -> ConnectionState {
        let status = self.status.borrow();
        if status.generation == self.generation {
            status.state
        } else {
            ConnectionState::Disconnected
        }
    }

    pub fn is_connected(&self) -> bool {
        self.status.borrow().is_live(self.generation)
    }

    /// Sends one chunk to the write endpoint.
    pub async fn write_chunk(&self, chunk: &[u8]) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::Disconnected);
        }
        self.link.write(&self.endpoint, chunk).await
    }

    /// Resolves once this session is no longer connected.
    pub async fn disconnected(&self) {
        let generation = self.generation;
        let mut status = self.status.clone();
        let _ = status.wait_for(|s| !s.is_live(generation)).await;
    }
}

/// Owns discovery, connection and teardown of the printer session.
pub struct TransportSession {
    transport: Arc<dyn WirelessTransport>,
    machine: Arc<SessionStateMachine>,
    active: Mutex<Option<PrinterSession>>,
    connect_lock: Mutex<()>,
    service: Uuid,
    characteristic: Uuid,
}

impl TransportSession {
    pub fn new(transport: Arc<dyn WirelessTransport>) -> Self {
        Self::with_profile(transport, PRINTER_SERVICE_UUID, WRITE_CHARACTERISTIC_UUID)
    }

    /// Session that resolves a non-default service/characteristic pair.
    pub fn with_profile(
        transport: Arc<dyn WirelessTransport>,
        service: Uuid,
        characteristic: Uuid,
    ) -> Self {
        Self {
            transport,
            machine: Arc::new(SessionStateMachine::new()),
            active: Mutex::new(None),
            connect_lock: Mutex::new(()),
            service,
            characteristic,
        }
    }

    /// Selects a device matching `filter` and opens a session to it,
    /// replacing any previous session.
    pub async fn discover_and_connect(
        &self,
        filter: &DeviceFilter,
    ) -> Result<PrinterSession, ConnectError> {
        let _guard = self.connect_lock.lock().await;

        self.release_active().await;

        info!("Requesting printer device...");
        let device = select_device(self.transport.as_ref(), filter)
            .await
            .inspect_err(|e| warn!(error = %e, "Printer selection failed"))?;

        let started = self.machine.handle(SessionEvent::ConnectStarted);
        if started.state != ConnectionState::Connecting {
            warn!(state = %started.state, "Printer session was not released before connecting");
            return Err(ConnectError::ConnectionFailed(format!(
                "printer session is still {}",
                started.state
            )));
        }
        let generation = started.generation;

        match self.establish(device, generation).await {
            Ok(session) => {
                *self.active.lock().await = Some(session.clone());
                Ok(session)
            }
            Err(e) => {
                self.machine
                    .handle(SessionEvent::ConnectFailed { generation });
                warn!(error = %e, "Failed to connect to printer");
                Err(e)
            }
        }
    }

    async fn establish(
        &self,
        device: DeviceIdentity,
        generation: u64,
    ) -> Result<PrinterSession, ConnectError> {
        info!(device = %device.label(), "Connecting to printer...");
        let link = self.transport.connect(&device).await?;

        let machine = Arc::clone(&self.machine);
        link.on_disconnect(Box::new(move || {
            machine.handle(SessionEvent::TransportDisconnected { generation });
        }));

        debug!(service = %self.service, characteristic = %self.characteristic, "Resolving write endpoint");
        let endpoint =
            match resolve_write_endpoint(link.as_ref(), self.service, self.characteristic).await {
                Ok(endpoint) => endpoint,
                Err(e) => {
                    close_link(link.as_ref()).await;
                    return Err(e);
                }
            };

        let status = self.machine.handle(SessionEvent::Established {
            generation,
            device: device.clone(),
        });
        if !status.is_live(generation) {
            close_link(link.as_ref()).await;
            return Err(ConnectError::ConnectionFailed(
                "device disconnected during setup".to_string(),
            ));
        }

        Ok(PrinterSession {
            device,
            endpoint,
            link,
            generation,
            status: self.machine.subscribe(),
        })
    }

    /// Closes the current session. Safe to call when nothing is connected.
    pub async fn disconnect(&self) {
        let _guard = self.connect_lock.lock().await;
        let Some(session) = self.active.lock().await.take() else {
            return;
        };
        let was_connected = session.is_connected();
        self.machine.handle(SessionEvent::DisconnectRequested {
            generation: session.generation,
        });
        if was_connected {
            info!(device = %session.device.label(), "Disconnecting printer");
            close_link(session.link.as_ref()).await;
        }
    }

    /// Drops a previous session before a new connection attempt.
    async fn release_active(&self) {
        let Some(previous) = self.active.lock().await.take() else {
            return;
        };
        let was_connected = previous.is_connected();
        self.machine.handle(SessionEvent::DisconnectRequested {
            generation: previous.generation,
        });
        if !was_connected {
            return;
        }
        if let Err(e) = previous.link.disconnect().await {
            warn!(
                device = %previous.device.label(),
                error = %e,
                "Previous printer did not disconnect cleanly; continuing"
            );
        }
    }

    /// Live session handle, if connected.
    ///
    /// A session the transport already dropped is discarded here, together
    /// with its endpoint and link.
    pub async fn current(&self) -> Option<PrinterSession> {
        let mut active = self.active.lock().await;
        if active.as_ref().is_some_and(|session| !session.is_connected()) {
            if let Some(stale) = active.take() {
                debug!(device = %stale.device.label(), "Discarding dropped printer session");
            }
        }
        active.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.machine.status().is_connected()
    }

    pub fn connected_device_label(&self) -> Option<String> {
        self.machine.status().device_label()
    }

    pub fn status(&self) -> SessionStatus {
        self.machine.status()
    }

    /// State-change notifications for presentation code.
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.machine.subscribe()
    }
}

async fn close_link(link: &dyn PrinterLink) {
    if let Err(e) = link.disconnect().await {
        warn!(error = %e, "Transport disconnect failed; session discarded anyway");
    }
}
