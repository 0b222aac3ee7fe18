use serde::Serialize;

use super::connection_state::ConnectionState;
use crate::printer::DeviceIdentity;

/// Snapshot of the printer session published on every state transition.
///
/// `generation` identifies the session the snapshot belongs to; it increases
/// each time a connection attempt starts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub state: ConnectionState,
    pub device: Option<DeviceIdentity>,
    pub generation: u64,
}

/// What a status bar shows for the current session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionIndicator {
    pub connected: bool,
    pub label: String,
    pub connect_button: &'static str,
}

impl SessionStatus {
    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    /// True while the session stamped with `generation` is still connected.
    pub fn is_live(&self, generation: u64) -> bool {
        self.state.is_connected() && self.generation == generation
    }

    /// Label of the connected device, `None` unless connected.
    pub fn device_label(&self) -> Option<String> {
        if !self.is_connected() {
            return None;
        }
        self.device.as_ref().map(|device| device.label().to_string())
    }

    pub fn indicator(&self) -> ConnectionIndicator {
        match self.device_label() {
            Some(label) => ConnectionIndicator {
                connected: true,
                label,
                connect_button: "Change Printer",
            },
            None => ConnectionIndicator {
                connected: false,
                label: "No printer connected".to_string(),
                connect_button: "Connect Printer",
            },
        }
    }
}
