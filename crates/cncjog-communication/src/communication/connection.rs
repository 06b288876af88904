//! Serial connection state machine
//!
//! ```text
//! Disconnected ──request_connect──▶ AwaitingPermission ──granted + open──▶ Open
//!      ▲                                   │                                 │
//!      └────── denied / no driver / ───────┘                                 │
//!      │        no ports / open failed                                       │
//!      └────────────── disconnect / read failure / write failure ────────────┘
//! ```
//!
//! State and the write handle sit behind one mutex, which is the critical
//! section shared by operator calls and permission callbacks. The receive
//! loop reads from a cloned handle without that lock; it watches an atomic
//! "open generation" and exits at the next iteration boundary once the
//! generation it was started for is no longer current.

use super::permission::{PermissionBroker, PermissionOutcome, PermissionResponder};
use super::{
    is_read_timeout, LineConfig, SerialDriver, SerialPort, READ_TIMEOUT, WRITE_TIMEOUT,
};
use cncjog_core::{
    CandidateDevice, ConnectionError, ConnectionEvent, ConnectionStatus, EventDispatcher, Result,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

const READ_BUFFER_SIZE: usize = 1024;

/// Generation value meaning "no port open"
const CLOSED: u64 = 0;

struct OpenPort {
    device: CandidateDevice,
    port: Box<dyn SerialPort>,
    generation: u64,
}

impl OpenPort {
    /// Best-effort close; failures are logged and dropped
    fn close_quietly(&mut self) {
        if let Err(e) = self.port.close() {
            debug!("Ignoring close error on {}: {}", self.device, e);
        }
    }
}

enum ConnectionState {
    Disconnected,
    AwaitingPermission {
        device: CandidateDevice,
        request_id: u64,
    },
    Open(OpenPort),
}

impl ConnectionState {
    fn status(&self) -> ConnectionStatus {
        match self {
            ConnectionState::Disconnected => ConnectionStatus::Disconnected,
            ConnectionState::AwaitingPermission { device, .. } => {
                ConnectionStatus::AwaitingPermission(device.clone())
            }
            ConnectionState::Open(open) => ConnectionStatus::Open(open.device.clone()),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::AwaitingPermission { .. } => "AwaitingPermission",
            ConnectionState::Open(_) => "Open",
        }
    }
}

struct Shared {
    driver: Arc<dyn SerialDriver>,
    broker: Arc<dyn PermissionBroker>,
    events: EventDispatcher,
    state: Mutex<ConnectionState>,
    open_generation: AtomicU64,
    next_id: AtomicU64,
    reader: Mutex<Option<JoinHandle<()>>>,
}

/// Owner of the single exclusive serial connection
///
/// Cheap to clone; all clones share the same connection.
#[derive(Clone)]
pub struct ConnectionManager {
    shared: Arc<Shared>,
}

impl ConnectionManager {
    /// Create a manager with its own event dispatcher
    pub fn new(driver: Arc<dyn SerialDriver>, broker: Arc<dyn PermissionBroker>) -> Self {
        Self::with_dispatcher(driver, broker, EventDispatcher::default())
    }

    /// Create a manager that reports through an existing dispatcher
    pub fn with_dispatcher(
        driver: Arc<dyn SerialDriver>,
        broker: Arc<dyn PermissionBroker>,
        events: EventDispatcher,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                driver,
                broker,
                events,
                state: Mutex::new(ConnectionState::Disconnected),
                open_generation: AtomicU64::new(CLOSED),
                next_id: AtomicU64::new(CLOSED),
                reader: Mutex::new(None),
            }),
        }
    }

    /// Subscribe to connection events
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.shared.events.subscribe()
    }

    /// Dispatcher this manager publishes to
    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.shared.events
    }

    /// Current connection state
    pub fn status(&self) -> ConnectionStatus {
        self.shared.state.lock().status()
    }

    /// Whether a port is open
    pub fn is_connected(&self) -> bool {
        self.shared.open_generation.load(Ordering::Acquire) != CLOSED
    }

    /// Attached compatible devices; an empty list is not an error
    pub fn list_candidates(&self) -> Result<Vec<CandidateDevice>> {
        let candidates = self.shared.driver.list_candidates()?;
        debug!("Found {} candidate device(s)", candidates.len());
        Ok(candidates)
    }

    /// Start connecting to `device`
    ///
    /// Only valid while Disconnected. Moves to AwaitingPermission and asks
    /// the broker; the broker's answer completes the connection.
    pub fn request_connect(
        &self,
        device: CandidateDevice,
    ) -> std::result::Result<(), ConnectionError> {
        let (request_id, previous) = {
            let mut state = self.shared.state.lock();
            if !matches!(*state, ConnectionState::Disconnected) {
                return Err(ConnectionError::invalid_state(
                    "Disconnected",
                    state.name(),
                ));
            }
            let request_id = self.next_id();
            *state = ConnectionState::AwaitingPermission {
                device: device.clone(),
                request_id,
            };
            // Taken while Disconnected, so its generation is already retired.
            (request_id, self.shared.reader.lock().take())
        };

        if let Some(handle) = previous {
            join_quietly(handle);
        }

        info!("Requesting permission for {}", device);
        self.log(format!(
            "Requesting permission for {}...",
            device.display_name()
        ));
        self.emit(ConnectionEvent::StateChanged(
            ConnectionStatus::AwaitingPermission(device.clone()),
        ));

        let responder = PermissionResponder::new(self.clone(), request_id);
        self.shared.broker.request_permission(&device, responder);
        Ok(())
    }

    /// Finish a permission request; called through [`PermissionResponder`]
    pub(crate) fn complete_permission(&self, request_id: u64, outcome: PermissionOutcome) {
        let mut state = self.shared.state.lock();
        let pending = match &*state {
            ConnectionState::AwaitingPermission {
                device,
                request_id: pending_id,
            } if *pending_id == request_id => device.clone(),
            other => {
                warn!(
                    "Ignoring permission response for request {} while {}",
                    request_id,
                    other.name()
                );
                return;
            }
        };

        let device = match outcome.device {
            Some(device) => device,
            None => {
                self.log(format!(
                    "Permission response has no device, using pending device {}",
                    pending
                ));
                pending
            }
        };

        if !outcome.granted {
            *state = ConnectionState::Disconnected;
            drop(state);
            info!("Permission refused for {}", device);
            self.report_failure(ConnectionError::PermissionDenied {
                device: device.display_name(),
            });
            return;
        }

        let (port, reader) = match self.open_device(&device) {
            Ok(handles) => handles,
            Err(err) => {
                *state = ConnectionState::Disconnected;
                drop(state);
                warn!("Connection to {} failed: {}", device, err);
                self.report_failure(err);
                return;
            }
        };

        let generation = self.next_id();
        *state = ConnectionState::Open(OpenPort {
            device: device.clone(),
            port,
            generation,
        });
        self.shared
            .open_generation
            .store(generation, Ordering::Release);

        info!("Connected to {}", device);
        self.log(format!(
            "Successfully connected to {}",
            device.display_name()
        ));
        self.emit(ConnectionEvent::StateChanged(ConnectionStatus::Open(
            device.clone(),
        )));

        // The loop is spawned and registered under the state lock so a
        // concurrent disconnect and reconnect always finds it to join.
        let started = self.start_receiving(generation, reader);
        let closed = match &started {
            Ok(_) => None,
            Err(_) => self.take_open(&mut state),
        };
        drop(state);

        match started {
            Ok(Some(previous)) => join_quietly(previous),
            Ok(None) => {}
            Err(e) => {
                if let Some(mut open) = closed {
                    open.close_quietly();
                }
                let err = ConnectionError::FailedToOpen {
                    port: device.port_name.clone(),
                    reason: format!("could not start read loop: {}", e),
                };
                warn!("Connection to {} failed: {}", device, err);
                self.report_failure(err);
            }
        }
    }

    /// Probe, open and configure the device's first port
    ///
    /// Returns the write handle and a cloned read handle.
    fn open_device(
        &self,
        device: &CandidateDevice,
    ) -> std::result::Result<(Box<dyn SerialPort>, Box<dyn SerialPort>), ConnectionError> {
        let info = self
            .shared
            .driver
            .probe(device)
            .ok_or_else(|| ConnectionError::NoDriver {
                device: device.display_name(),
            })?;

        self.log(format!(
            "Driver: {}, {} port(s)",
            info.driver_name,
            info.ports.len()
        ));
        for (index, port) in info.ports.iter().enumerate() {
            self.log(format!("  Port {}: {}", index, port));
        }

        let port_name = info
            .ports
            .first()
            .cloned()
            .ok_or_else(|| ConnectionError::NoPorts {
                device: device.display_name(),
            })?;
        let open_failed = |reason: String| ConnectionError::FailedToOpen {
            port: port_name.clone(),
            reason,
        };

        let mut port = self
            .shared
            .driver
            .open(device, 0)
            .map_err(|e| open_failed(e.to_string()))?;

        let reader = port
            .configure(&LineConfig::CNC_DEFAULT)
            .and_then(|_| port.try_clone_port());
        match reader {
            Ok(reader) => Ok((port, reader)),
            Err(e) => {
                if let Err(close_err) = port.close() {
                    debug!("Ignoring close error on {}: {}", port_name, close_err);
                }
                Err(open_failed(e.to_string()))
            }
        }
    }

    /// Spawn the receive loop for the connection opened as `generation`
    ///
    /// Registers the new loop and hands back any handle it replaced; the
    /// caller joins that one after releasing the state lock.
    fn start_receiving(
        &self,
        generation: u64,
        reader: Box<dyn SerialPort>,
    ) -> std::io::Result<Option<JoinHandle<()>>> {
        let shared = Arc::downgrade(&self.shared);
        let handle = thread::Builder::new()
            .name("cncjog-serial-reader".to_string())
            .spawn(move || read_loop(shared, generation, reader))?;
        Ok(self.shared.reader.lock().replace(handle))
    }

    /// Write raw bytes to the open port
    ///
    /// Returns `NotConnected` without side effects unless a port is open.
    /// A failed write closes the connection and is reported once.
    pub fn send(&self, data: &[u8]) -> std::result::Result<(), ConnectionError> {
        let mut state = self.shared.state.lock();
        let written = match &mut *state {
            ConnectionState::Open(open) => open.port.write(data, WRITE_TIMEOUT),
            _ => {
                debug!("Dropping {} byte(s): not connected", data.len());
                return Err(ConnectionError::NotConnected);
            }
        };

        match written {
            Ok(()) => {
                // Published under the lock so it always precedes a close report
                self.emit(ConnectionEvent::Sent(
                    String::from_utf8_lossy(data).into_owned(),
                ));
                Ok(())
            }
            Err(e) => {
                let closed = self.take_open(&mut state);
                drop(state);
                if let Some(mut open) = closed {
                    open.close_quietly();
                }
                let err = ConnectionError::ConnectionLost {
                    reason: format!("Write failed: {}", e),
                };
                warn!("{}", err);
                self.report_failure(err.clone());
                Err(err)
            }
        }
    }

    /// Write a command string
    pub fn send_command(&self, command: &str) -> std::result::Result<(), ConnectionError> {
        self.send(command.as_bytes())
    }

    /// Close whatever is open or pending
    ///
    /// Idempotent. Close errors are swallowed; always ends Disconnected.
    pub fn disconnect(&self) {
        let previous = {
            let mut state = self.shared.state.lock();
            if matches!(*state, ConnectionState::Disconnected) {
                return;
            }
            self.shared.open_generation.store(CLOSED, Ordering::Release);
            std::mem::replace(&mut *state, ConnectionState::Disconnected)
        };

        match previous {
            ConnectionState::Open(mut open) => {
                info!("Disconnecting from {}", open.device);
                self.log("Disconnecting...".to_string());
                open.close_quietly();
            }
            ConnectionState::AwaitingPermission { device, .. } => {
                self.log(format!(
                    "Cancelled permission request for {}",
                    device.display_name()
                ));
            }
            ConnectionState::Disconnected => {}
        }
        self.emit(ConnectionEvent::StateChanged(ConnectionStatus::Disconnected));
    }

    /// Disconnect and wait for the receive loop to exit
    pub fn shutdown(&self) {
        self.disconnect();
        self.join_reader();
    }

    /// Close the connection opened as `generation`, if it is still current
    ///
    /// Returns whether this call performed the close; a stale generation
    /// means someone else already closed it and nothing is reported.
    fn fail_open(&self, generation: u64, err: ConnectionError) -> bool {
        let closed = {
            let mut state = self.shared.state.lock();
            let current = matches!(
                &*state,
                ConnectionState::Open(open) if open.generation == generation
            );
            if current {
                self.take_open(&mut state)
            } else {
                None
            }
        };

        match closed {
            Some(mut open) => {
                open.close_quietly();
                warn!("{} ({})", err, open.device);
                self.report_failure(err);
                true
            }
            None => false,
        }
    }

    /// Move Open to Disconnected under the caller's lock
    fn take_open(&self, state: &mut ConnectionState) -> Option<OpenPort> {
        match std::mem::replace(state, ConnectionState::Disconnected) {
            ConnectionState::Open(open) => {
                self.shared.open_generation.store(CLOSED, Ordering::Release);
                Some(open)
            }
            other => {
                *state = other;
                None
            }
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.shared.open_generation.load(Ordering::Acquire) == generation
    }

    /// Join the receive loop unless a new connection has since started one
    fn join_reader(&self) {
        let handle = {
            let state = self.shared.state.lock();
            match *state {
                ConnectionState::Disconnected => self.shared.reader.lock().take(),
                _ => None,
            }
        };
        if let Some(handle) = handle {
            join_quietly(handle);
        }
    }

    fn next_id(&self) -> u64 {
        self.shared.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn report_failure(&self, err: ConnectionError) {
        self.emit(ConnectionEvent::Failed(err));
        self.emit(ConnectionEvent::StateChanged(ConnectionStatus::Disconnected));
    }

    fn log(&self, line: String) {
        self.emit(ConnectionEvent::Log(line));
    }

    fn emit(&self, event: ConnectionEvent) {
        self.shared.events.emit(event);
    }
}

/// Join a finished or finishing loop; a loop never joins itself
fn join_quietly(handle: JoinHandle<()>) {
    if handle.thread().id() == thread::current().id() {
        return;
    }
    if handle.join().is_err() {
        warn!("Read loop panicked");
    }
}

/// Receive loop body, run on its own thread
///
/// Holds only a weak reference so that dropping every manager also ends
/// the loop.
fn read_loop(shared: Weak<Shared>, generation: u64, mut reader: Box<dyn SerialPort>) {
    let mut buffer = [0u8; READ_BUFFER_SIZE];
    let upgrade = || shared.upgrade().map(|shared| ConnectionManager { shared });
    debug!("Read loop started on {}", reader.name());

    loop {
        match upgrade() {
            Some(manager) if manager.is_current(generation) => {}
            _ => break,
        }

        match reader.read(&mut buffer, READ_TIMEOUT) {
            Ok(0) => {}
            Ok(len) => {
                let text = String::from_utf8_lossy(&buffer[..len]);
                let text = text.trim();
                if text.is_empty() {
                    continue;
                }
                if let Some(manager) = upgrade() {
                    if manager.is_current(generation) {
                        manager.emit(ConnectionEvent::Received(text.to_string()));
                    }
                }
            }
            Err(e) if is_read_timeout(&e) => {}
            Err(e) => {
                if let Some(manager) = upgrade() {
                    manager.fail_open(
                        generation,
                        ConnectionError::ConnectionLost {
                            reason: e.to_string(),
                        },
                    );
                }
                break;
            }
        }
    }

    if let Err(e) = reader.close() {
        debug!("Ignoring close error on read handle: {}", e);
    }
    debug!("Read loop for generation {} exited", generation);
}
