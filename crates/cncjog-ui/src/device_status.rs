//! Status surface shown next to the jog dial

use cncjog_core::{ConnectionEvent, ConnectionStatus, MachinePosition};

/// Connection flag, commanded position and the most recent log line
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeviceStatus {
    /// Whether a port is open
    pub connected: bool,
    /// Full connection state
    pub connection: ConnectionStatus,
    /// Position as commanded by the operator
    pub position: MachinePosition,
    /// Last line appended to the operator log
    pub last_log_line: Option<String>,
}

impl DeviceStatus {
    /// Two-line summary: connection state, then position
    pub fn status_text(&self) -> String {
        let state = if self.connected {
            "Connected"
        } else {
            "Disconnected"
        };
        format!("{}\n{}", state, self.position)
    }

    /// Fold a connection event into the status
    ///
    /// Returns the log line the event produced, if any.
    pub fn apply_event(&mut self, event: &ConnectionEvent) -> Option<String> {
        if let ConnectionEvent::StateChanged(status) = event {
            self.connected = status.is_open();
            self.connection = status.clone();
        }
        let line = event.log_line()?;
        self.last_log_line = Some(line.clone());
        Some(line)
    }
}
