//! Jog session
//!
//! Consumes jog intents from the dial, keeps the commanded position model,
//! turns intents into GRBL commands for the connection, and folds connection
//! events into the status surface and operator log.

use crate::console::{ConsoleLine, ConsoleLog, MessageLevel};
use crate::device_status::DeviceStatus;
use cncjog_communication::{ConnectionManager, JogCommand};
use cncjog_core::{
    Axis, CandidateDevice, ConnectionError, ConnectionEvent, ConnectionStatus, DataCallback,
    JogListener, MachinePosition,
};
use cncjog_settings::{ConnectionSettings, SessionSettings};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, info, warn};

/// Operator-facing controller for one machine
pub struct JogSession {
    manager: ConnectionManager,
    events: broadcast::Receiver<ConnectionEvent>,
    settings: SessionSettings,
    status: DeviceStatus,
    console: ConsoleLog,
    feedback: Option<DataCallback<Axis>>,
}

impl JogSession {
    /// Session driving `manager`; subscribes to its events immediately
    pub fn new(manager: ConnectionManager, settings: SessionSettings) -> Self {
        let events = manager.subscribe();
        let connection = manager.status();
        let status = DeviceStatus {
            connected: connection.is_open(),
            connection,
            ..DeviceStatus::default()
        };
        Self {
            manager,
            events,
            settings,
            status,
            console: ConsoleLog::default(),
            feedback: None,
        }
    }

    /// Called with the axis of every discrete jog, e.g. for a haptic tick
    pub fn set_feedback(&mut self, feedback: DataCallback<Axis>) {
        self.feedback = Some(feedback);
    }

    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn status(&self) -> &DeviceStatus {
        &self.status
    }

    pub fn position(&self) -> MachinePosition {
        self.status.position
    }

    pub fn console(&self) -> &ConsoleLog {
        &self.console
    }

    /// `Connected|Disconnected` line followed by the position line
    pub fn status_text(&self) -> String {
        self.status.status_text()
    }

    /// Attached devices; an empty or failed scan is logged
    pub fn candidates(&mut self) -> Vec<CandidateDevice> {
        match self.manager.list_candidates() {
            Ok(devices) if devices.is_empty() => {
                self.log("No supported USB devices detected.");
                devices
            }
            Ok(devices) => devices,
            Err(e) => {
                warn!("Device scan failed: {}", e);
                self.log_line(MessageLevel::Error, e.to_string());
                Vec::new()
            }
        }
    }

    /// Start connecting to `device`
    ///
    /// Returns whether the request was accepted. The outcome arrives as
    /// connection events; they are drained before returning.
    pub fn connect(&mut self, device: CandidateDevice) -> bool {
        let accepted = match self.manager.request_connect(device) {
            Ok(()) => true,
            Err(e) => {
                warn!("Connect rejected: {}", e);
                self.log_line(MessageLevel::Error, e.to_string());
                false
            }
        };
        self.poll_events();
        accepted
    }

    /// Connect to the preferred port, or the first candidate when allowed
    pub fn connect_preferred(&mut self, prefs: &ConnectionSettings) -> bool {
        let candidates = self.candidates();
        let preferred = prefs
            .preferred_port
            .as_deref()
            .and_then(|port| candidates.iter().position(|d| d.port_name == port));

        let choice = match preferred {
            Some(index) => candidates.into_iter().nth(index),
            None if prefs.auto_select => candidates.into_iter().next(),
            None => {
                if let Some(port) = &prefs.preferred_port {
                    self.log(format!("Preferred port {} is not attached", port));
                }
                None
            }
        };

        match choice {
            Some(device) => self.connect(device),
            None => false,
        }
    }

    /// Close the connection or cancel a pending request
    pub fn disconnect(&mut self) {
        self.manager.disconnect();
        self.poll_events();
    }

    /// Connect button: disconnect when connected or pending, else connect
    /// to the first attached device
    pub fn toggle_connection(&mut self) {
        match self.manager.status() {
            ConnectionStatus::Disconnected => {
                if let Some(device) = self.candidates().into_iter().next() {
                    self.connect(device);
                }
            }
            ConnectionStatus::AwaitingPermission(_) | ConnectionStatus::Open(_) => {
                self.disconnect();
            }
        }
    }

    /// Make the current position the work origin
    pub fn zero_origin(&mut self) {
        self.send(JogCommand::ZeroOrigin);
        self.status.position.zero_linear();
        self.log("Origin reset to current position");
    }

    /// Drain pending connection events into the status and log
    ///
    /// Returns the number of events processed.
    pub fn poll_events(&mut self) -> usize {
        let mut processed = 0;
        let mut dropped = 0;
        loop {
            match self.events.try_recv() {
                Ok(event) => {
                    self.apply_event(&event);
                    processed += 1;
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!("Dropped {} connection events", skipped);
                    dropped += skipped;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        if dropped > 0 {
            self.resync(dropped);
        }
        processed
    }

    /// Reload the connection state after events were lost
    fn resync(&mut self, dropped: u64) {
        let connection = self.manager.status();
        self.status.connected = connection.is_open();
        self.status.connection = connection;
        self.log_line(
            MessageLevel::Error,
            format!("Missed {} connection events, status reloaded", dropped),
        );
    }

    fn apply_event(&mut self, event: &ConnectionEvent) {
        if let ConnectionEvent::StateChanged(status) = event {
            debug!("Connection state: {}", status);
        }
        self.status.apply_event(event);
        if let Some(line) = ConsoleLine::from_event(event) {
            self.console.push(line);
        }
    }

    fn send(&mut self, command: JogCommand) -> bool {
        match self.manager.send(&command.to_bytes()) {
            Ok(()) => true,
            Err(ConnectionError::NotConnected) => {
                debug!("Not connected, dropped {}", command);
                false
            }
            Err(e) => {
                debug!("Send of {} failed: {}", command, e);
                false
            }
        }
    }

    fn log(&mut self, text: impl Into<String>) {
        self.log_line(MessageLevel::Info, text);
    }

    fn log_line(&mut self, level: MessageLevel, text: impl Into<String>) {
        let text = text.into();
        info!("{}", text);
        self.status.last_log_line = Some(text.clone());
        self.console.push(ConsoleLine::new(level, text));
    }
}

impl JogListener for JogSession {
    fn on_move(&mut self, angle_deg: f64, power: f64) {
        if power <= self.settings.move_deadband {
            return;
        }
        let angle = angle_deg.to_radians();
        let dx = power * angle.cos();
        let dy = -power * angle.sin();
        self.status.position.x += dx;
        self.status.position.y += dy;

        if self.settings.stream_continuous_moves {
            self.send(JogCommand::Planar { dx, dy });
        }
    }

    fn on_jog(&mut self, axis: Axis, step: f64) {
        if let Some(feedback) = &self.feedback {
            feedback(axis);
        }

        if axis.is_spindle() {
            let position = &mut self.status.position;
            position.adjust_spindle(step as i32);
            position.s = position.s.min(self.settings.spindle_max);
            let speed = position.s;
            self.send(JogCommand::spindle(speed));
        } else {
            self.send(JogCommand::relative(axis, step));
            self.status.position.apply_linear(axis, step);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cncjog_communication::{AutoGrantBroker, VirtualSerialDriver};
    use std::sync::Arc;

    fn session() -> (JogSession, VirtualSerialDriver) {
        let driver = VirtualSerialDriver::new();
        let manager = ConnectionManager::new(Arc::new(driver.clone()), Arc::new(AutoGrantBroker));
        (JogSession::new(manager, SessionSettings::default()), driver)
    }

    #[test]
    fn test_deadband() {
        let (mut s, _) = session();
        s.on_move(0.0, 0.1);
        assert_eq!(s.position(), MachinePosition::default());

        s.on_move(0.0, 0.5);
        assert!((s.position().x - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_move_up_decreases_y() {
        let (mut s, _) = session();
        s.on_move(90.0, 1.0);
        assert!(s.position().x.abs() < 1e-9);
        assert!((s.position().y + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_jog_updates_position_while_disconnected() {
        let (mut s, driver) = session();
        s.on_jog(Axis::Z, -1.0);
        s.on_jog(Axis::S, 100.0);

        assert_eq!(s.position().z, -1.0);
        assert_eq!(s.position().s, 100);
        assert!(driver.written().is_empty());
    }

    #[test]
    fn test_spindle_limit_from_settings() {
        let driver = VirtualSerialDriver::new();
        let manager = ConnectionManager::new(Arc::new(driver.clone()), Arc::new(AutoGrantBroker));
        let settings = SessionSettings {
            spindle_max: 150,
            ..SessionSettings::default()
        };
        let mut s = JogSession::new(manager, settings);

        s.on_jog(Axis::S, 100.0);
        s.on_jog(Axis::S, 100.0);
        assert_eq!(s.position().s, 150);
    }

    #[test]
    fn test_no_candidates_is_logged() {
        let (mut s, driver) = session();
        driver.set_present(false);

        assert!(s.candidates().is_empty());
        assert_eq!(
            s.status().last_log_line.as_deref(),
            Some("No supported USB devices detected.")
        );
    }
}
