//! Serial communication layer
//!
//! The connection manager never talks to the operating system directly. It
//! goes through two traits:
//! - [`SerialDriver`] enumerates, probes and opens devices
//! - [`SerialPort`] reads, writes and closes one open port
//!
//! [`serial::SystemSerialDriver`] implements them on top of the `serialport`
//! crate; [`virtual_port::VirtualSerialDriver`] is an in-memory device used
//! for tests and dry runs.

pub mod connection;
pub mod permission;
pub mod serial;
pub mod virtual_port;

use cncjog_core::{CandidateDevice, Result};
use std::io;
use std::time::Duration;

/// Timeout for a single blocking read in the receive loop
pub const READ_TIMEOUT: Duration = Duration::from_millis(1000);

/// Timeout for a single blocking write
pub const WRITE_TIMEOUT: Duration = Duration::from_millis(1000);

/// Serial parity setting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialParity {
    /// No parity bit
    None,
    /// Even parity
    Even,
    /// Odd parity
    Odd,
}

/// Line settings applied to a port before it is considered usable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineConfig {
    /// Baud rate in bits per second
    pub baud_rate: u32,
    /// Data bits per character
    pub data_bits: u8,
    /// Stop bits per character
    pub stop_bits: u8,
    /// Parity mode
    pub parity: SerialParity,
}

impl LineConfig {
    /// 115200 baud, 8 data bits, 1 stop bit, no parity
    pub const CNC_DEFAULT: LineConfig = LineConfig {
        baud_rate: 115_200,
        data_bits: 8,
        stop_bits: 1,
        parity: SerialParity::None,
    };
}

impl Default for LineConfig {
    fn default() -> Self {
        Self::CNC_DEFAULT
    }
}

/// What a driver reports about a device it recognizes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverInfo {
    /// Driver name shown in the operator log
    pub driver_name: String,
    /// Port names exposed by the device, in open order
    pub ports: Vec<String>,
}

/// Low-level serial port interface
///
/// One open port. Implementations must allow a clone obtained through
/// [`SerialPort::try_clone_port`] to read while the first handle writes.
pub trait SerialPort: Send {
    /// Get the port name
    fn name(&self) -> String;

    /// Apply line settings
    fn configure(&mut self, config: &LineConfig) -> io::Result<()>;

    /// Blocking read of up to `buf.len()` bytes
    ///
    /// Returns `ErrorKind::TimedOut` when nothing arrived within `timeout`.
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize>;

    /// Blocking write of the whole buffer
    fn write(&mut self, data: &[u8], timeout: Duration) -> io::Result<()>;

    /// Open a second handle on the same port
    fn try_clone_port(&self) -> io::Result<Box<dyn SerialPort>>;

    /// Close the port
    fn close(&mut self) -> io::Result<()>;
}

/// Device discovery and opening
pub trait SerialDriver: Send + Sync {
    /// Currently attached compatible devices, possibly none
    fn list_candidates(&self) -> Result<Vec<CandidateDevice>>;

    /// Find a driver for the device, or `None` when nothing recognizes it
    fn probe(&self, device: &CandidateDevice) -> Option<DriverInfo>;

    /// Open one of the ports reported by [`SerialDriver::probe`]
    fn open(&self, device: &CandidateDevice, port_index: usize) -> io::Result<Box<dyn SerialPort>>;
}

/// Whether a read error only means "nothing arrived yet"
pub(crate) fn is_read_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}
