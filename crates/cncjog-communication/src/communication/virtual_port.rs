//! In-memory serial device
//!
//! A scriptable stand-in for a USB controller. Reads are served from a
//! queue, writes are recorded, and every failure point of the real driver
//! can be switched on. Clones of the driver share the same device, so a
//! test can keep one clone to script and inspect while the connection
//! manager owns another.

use super::{DriverInfo, LineConfig, SerialDriver, SerialPort};
use cncjog_core::{thread_safe, CandidateDevice, Result, ThreadSafe};
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Upper bound on how long an idle read blocks
const IDLE_POLL: Duration = Duration::from_millis(5);

/// Scripted outcome of one read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VirtualRead {
    /// Bytes arrive
    Data(Vec<u8>),
    /// The read times out with nothing received
    Timeout,
    /// The read fails with a non-timeout error
    Error(String),
}

impl VirtualRead {
    /// Text arriving from the controller
    pub fn text(text: &str) -> Self {
        Self::Data(text.as_bytes().to_vec())
    }
}

#[derive(Debug)]
struct DeviceState {
    present: bool,
    recognized: bool,
    port_count: usize,
    open_error: Option<String>,
    configure_error: Option<String>,
    write_error: Option<String>,
    echo_ok: bool,
    reads: VecDeque<VirtualRead>,
    written: Vec<u8>,
    configured: Option<LineConfig>,
    read_calls: usize,
    opens: usize,
    open_handles: usize,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            present: true,
            recognized: true,
            port_count: 1,
            open_error: None,
            configure_error: None,
            write_error: None,
            echo_ok: false,
            reads: VecDeque::new(),
            written: Vec::new(),
            configured: None,
            read_calls: 0,
            opens: 0,
            open_handles: 0,
        }
    }
}

/// Driver exposing a single virtual controller
#[derive(Debug, Clone)]
pub struct VirtualSerialDriver {
    device: CandidateDevice,
    state: ThreadSafe<DeviceState>,
}

impl Default for VirtualSerialDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualSerialDriver {
    /// Port name the virtual controller reports
    pub const PORT_NAME: &'static str = "/dev/ttyVIRTUAL0";

    /// A present, recognized device with one port
    pub fn new() -> Self {
        Self {
            device: CandidateDevice::new(Self::PORT_NAME)
                .with_names("cncjog", "Virtual Controller")
                .with_usb_ids(0x1d50, 0x6015),
            state: thread_safe(DeviceState::default()),
        }
    }

    /// The candidate this driver reports
    pub fn device(&self) -> CandidateDevice {
        self.device.clone()
    }

    /// Attach or detach the device
    pub fn set_present(&self, present: bool) {
        self.state.lock().present = present;
    }

    /// Whether `probe` finds a driver for the device
    pub fn set_recognized(&self, recognized: bool) {
        self.state.lock().recognized = recognized;
    }

    /// Number of ports `probe` reports
    pub fn set_port_count(&self, count: usize) {
        self.state.lock().port_count = count;
    }

    /// Make every `open` fail with `reason`
    pub fn fail_open(&self, reason: &str) {
        self.state.lock().open_error = Some(reason.to_string());
    }

    /// Make `configure` fail with `reason`
    pub fn fail_configure(&self, reason: &str) {
        self.state.lock().configure_error = Some(reason.to_string());
    }

    /// Make every write fail with `reason`
    pub fn fail_writes(&self, reason: &str) {
        self.state.lock().write_error = Some(reason.to_string());
    }

    /// Answer every write with `ok`, like a GRBL controller
    pub fn set_echo_ok(&self, echo: bool) {
        self.state.lock().echo_ok = echo;
    }

    /// Queue the outcome of a future read
    pub fn push_read(&self, read: VirtualRead) {
        self.state.lock().reads.push_back(read);
    }

    /// Everything written so far
    pub fn written(&self) -> Vec<u8> {
        self.state.lock().written.clone()
    }

    /// Everything written so far, as text
    pub fn written_text(&self) -> String {
        String::from_utf8_lossy(&self.state.lock().written).into_owned()
    }

    /// Line settings applied by the last successful `configure`
    pub fn configured(&self) -> Option<LineConfig> {
        self.state.lock().configured
    }

    /// Number of reads attempted on any handle
    pub fn read_calls(&self) -> usize {
        self.state.lock().read_calls
    }

    /// Number of successful `open` calls
    pub fn open_count(&self) -> usize {
        self.state.lock().opens
    }

    /// Handles opened or cloned and not yet closed
    pub fn open_handles(&self) -> usize {
        self.state.lock().open_handles
    }

    fn handle(&self) -> VirtualPort {
        self.state.lock().open_handles += 1;
        VirtualPort {
            name: self.device.port_name.clone(),
            state: Arc::clone(&self.state),
            closed: false,
        }
    }
}

impl SerialDriver for VirtualSerialDriver {
    fn list_candidates(&self) -> Result<Vec<CandidateDevice>> {
        if self.state.lock().present {
            Ok(vec![self.device.clone()])
        } else {
            Ok(Vec::new())
        }
    }

    fn probe(&self, device: &CandidateDevice) -> Option<DriverInfo> {
        let state = self.state.lock();
        if !state.recognized || device.port_name != self.device.port_name {
            return None;
        }
        Some(DriverInfo {
            driver_name: "Virtual CDC-ACM".to_string(),
            ports: (0..state.port_count)
                .map(|i| format!("{}:{}", self.device.port_name, i))
                .collect(),
        })
    }

    fn open(&self, device: &CandidateDevice, port_index: usize) -> io::Result<Box<dyn SerialPort>> {
        {
            let mut state = self.state.lock();
            if let Some(reason) = &state.open_error {
                return Err(io::Error::other(reason.clone()));
            }
            if device.port_name != self.device.port_name || port_index >= state.port_count {
                return Err(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("{} has no port {}", device.port_name, port_index),
                ));
            }
            state.opens += 1;
        }
        Ok(Box::new(self.handle()))
    }
}

/// One handle on the virtual device
struct VirtualPort {
    name: String,
    state: ThreadSafe<DeviceState>,
    closed: bool,
}

impl VirtualPort {
    fn ensure_open(&self) -> io::Result<()> {
        if self.closed {
            Err(io::Error::new(io::ErrorKind::NotConnected, "port is closed"))
        } else {
            Ok(())
        }
    }

    fn release(&mut self) {
        if !self.closed {
            self.closed = true;
            let mut state = self.state.lock();
            state.open_handles = state.open_handles.saturating_sub(1);
        }
    }
}

impl SerialPort for VirtualPort {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn configure(&mut self, config: &LineConfig) -> io::Result<()> {
        self.ensure_open()?;
        let mut state = self.state.lock();
        if let Some(reason) = &state.configure_error {
            return Err(io::Error::other(reason.clone()));
        }
        state.configured = Some(*config);
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        self.ensure_open()?;
        let next = {
            let mut state = self.state.lock();
            state.read_calls += 1;
            state.reads.pop_front()
        };

        match next {
            Some(VirtualRead::Data(mut data)) => {
                let len = data.len().min(buf.len());
                buf[..len].copy_from_slice(&data[..len]);
                if len < data.len() {
                    let rest = data.split_off(len);
                    self.state.lock().reads.push_front(VirtualRead::Data(rest));
                }
                Ok(len)
            }
            Some(VirtualRead::Timeout) => Err(io::Error::from(io::ErrorKind::TimedOut)),
            Some(VirtualRead::Error(reason)) => Err(io::Error::other(reason)),
            None => {
                thread::sleep(timeout.min(IDLE_POLL));
                Err(io::Error::from(io::ErrorKind::TimedOut))
            }
        }
    }

    fn write(&mut self, data: &[u8], _timeout: Duration) -> io::Result<()> {
        self.ensure_open()?;
        let mut state = self.state.lock();
        if let Some(reason) = &state.write_error {
            return Err(io::Error::other(reason.clone()));
        }
        state.written.extend_from_slice(data);
        if state.echo_ok {
            state.reads.push_back(VirtualRead::text("ok\r\n"));
        }
        Ok(())
    }

    fn try_clone_port(&self) -> io::Result<Box<dyn SerialPort>> {
        self.ensure_open()?;
        self.state.lock().open_handles += 1;
        Ok(Box::new(VirtualPort {
            name: self.name.clone(),
            state: Arc::clone(&self.state),
            closed: false,
        }))
    }

    fn close(&mut self) -> io::Result<()> {
        self.release();
        Ok(())
    }
}

impl Drop for VirtualPort {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_reports_ports() {
        let driver = VirtualSerialDriver::new();
        driver.set_port_count(2);
        let info = driver.probe(&driver.device()).unwrap();
        assert_eq!(info.ports.len(), 2);

        driver.set_recognized(false);
        assert!(driver.probe(&driver.device()).is_none());
    }

    #[test]
    fn test_scripted_reads() {
        let driver = VirtualSerialDriver::new();
        let mut port = driver.open(&driver.device(), 0).unwrap();
        driver.push_read(VirtualRead::text("abc"));
        driver.push_read(VirtualRead::Timeout);

        let mut buf = [0u8; 2];
        assert_eq!(port.read(&mut buf, IDLE_POLL).unwrap(), 2);
        assert_eq!(&buf, b"ab");
        assert_eq!(port.read(&mut buf, IDLE_POLL).unwrap(), 1);
        assert_eq!(buf[0], b'c');

        let err = port.read(&mut buf, IDLE_POLL).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
        assert_eq!(driver.read_calls(), 3);
    }

    #[test]
    fn test_handles_are_counted() {
        let driver = VirtualSerialDriver::new();
        let mut port = driver.open(&driver.device(), 0).unwrap();
        let clone = port.try_clone_port().unwrap();
        assert_eq!(driver.open_handles(), 2);

        port.close().unwrap();
        assert!(port.write(b"x", IDLE_POLL).is_err());
        drop(clone);
        assert_eq!(driver.open_handles(), 0);
    }

    #[test]
    fn test_echo_ok() {
        let driver = VirtualSerialDriver::new();
        driver.set_echo_ok(true);
        let mut port = driver.open(&driver.device(), 0).unwrap();
        port.write(b"S100\n", IDLE_POLL).unwrap();

        let mut buf = [0u8; 8];
        let len = port.read(&mut buf, IDLE_POLL).unwrap();
        assert_eq!(&buf[..len], b"ok\r\n");
        assert_eq!(driver.written_text(), "S100\n");
    }
}
