//! Serial port communication implementation
//!
//! Provides the operating-system serial driver on top of the `serialport`
//! crate:
//! - Port enumeration filtered to CNC controller patterns
//! - Line configuration (baud, data bits, stop bits, parity)
//! - Blocking reads and writes with per-call timeouts

use super::{DriverInfo, LineConfig, SerialDriver, SerialParity, SerialPort};
use cncjog_core::{CandidateDevice, ConnectionError, Result};
use std::io::{self, Read, Write};
use std::time::Duration;

/// List available serial ports on the system
///
/// Filters ports to include only CNC controller patterns:
/// - Windows: COM* (e.g., COM1, COM3)
/// - Linux: /dev/ttyUSB*, /dev/ttyACM*, /dev/ttyGRBL
/// - macOS: /dev/cu.usbserial-*, /dev/cu.usbmodem*
pub fn list_ports() -> Result<Vec<CandidateDevice>> {
    match serialport::available_ports() {
        Ok(ports) => Ok(ports
            .iter()
            .filter(|port| is_valid_cnc_port(&port.port_name))
            .map(to_candidate)
            .collect()),
        Err(e) => {
            tracing::error!("Failed to enumerate serial ports: {}", e);
            Err(ConnectionError::Enumeration {
                reason: e.to_string(),
            }
            .into())
        }
    }
}

fn to_candidate(port: &serialport::SerialPortInfo) -> CandidateDevice {
    let device = CandidateDevice::new(&port.port_name);
    match &port.port_type {
        serialport::SerialPortType::UsbPort(usb_info) => {
            let mut device = device.with_usb_ids(usb_info.vid, usb_info.pid);
            device.manufacturer = usb_info.manufacturer.clone();
            device.product = usb_info.product.clone();
            device.serial_number = usb_info.serial_number.clone();
            device
        }
        _ => device,
    }
}

/// Check if a port name matches CNC controller patterns
fn is_valid_cnc_port(port_name: &str) -> bool {
    // Windows COM ports
    if let Some(number) = port_name.strip_prefix("COM") {
        return !number.is_empty() && number.chars().all(|c| c.is_ascii_digit());
    }

    // Linux USB and ACM devices, plus the grblHAL simulator link
    if port_name.starts_with("/dev/ttyUSB")
        || port_name.starts_with("/dev/ttyACM")
        || port_name == "/dev/ttyGRBL"
    {
        return true;
    }

    // macOS serial and modem devices
    port_name.starts_with("/dev/cu.usbserial-") || port_name.starts_with("/dev/cu.usbmodem")
}

/// Driver name for the operator log
fn get_driver_name(port: &serialport::SerialPortInfo) -> String {
    match &port.port_type {
        serialport::SerialPortType::UsbPort(usb_info) => format!(
            "USB {}",
            usb_info.product.as_deref().unwrap_or("Serial Port")
        ),
        serialport::SerialPortType::BluetoothPort => "Bluetooth Serial".to_string(),
        serialport::SerialPortType::PciPort => "PCI Serial".to_string(),
        _ => "Serial Port".to_string(),
    }
}

/// Convert a parity setting to serialport format
fn to_serialport_parity(parity: SerialParity) -> serialport::Parity {
    match parity {
        SerialParity::None => serialport::Parity::None,
        SerialParity::Even => serialport::Parity::Even,
        SerialParity::Odd => serialport::Parity::Odd,
    }
}

fn to_serialport_data_bits(bits: u8) -> io::Result<serialport::DataBits> {
    match bits {
        5 => Ok(serialport::DataBits::Five),
        6 => Ok(serialport::DataBits::Six),
        7 => Ok(serialport::DataBits::Seven),
        8 => Ok(serialport::DataBits::Eight),
        _ => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("Invalid data bits: {}", bits),
        )),
    }
}

fn to_serialport_stop_bits(bits: u8) -> io::Result<serialport::StopBits> {
    match bits {
        1 => Ok(serialport::StopBits::One),
        2 => Ok(serialport::StopBits::Two),
        _ => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("Invalid stop bits: {}", bits),
        )),
    }
}

/// Real serial port implementation using serialport crate
pub struct RealSerialPort {
    name: String,
    port: Option<Box<dyn serialport::SerialPort>>,
}

impl RealSerialPort {
    /// Open a port by name at the default CNC baud rate
    pub fn open(port_name: &str) -> io::Result<Self> {
        let port = serialport::new(port_name, LineConfig::CNC_DEFAULT.baud_rate)
            .timeout(super::READ_TIMEOUT)
            .open()
            .map_err(|e| {
                tracing::warn!("Failed to open serial port {}: {}", port_name, e);
                io::Error::from(e)
            })?;

        Ok(Self {
            name: port_name.to_string(),
            port: Some(port),
        })
    }

    fn port_mut(&mut self) -> io::Result<&mut Box<dyn serialport::SerialPort>> {
        self.port
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "port is closed"))
    }
}

impl SerialPort for RealSerialPort {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn configure(&mut self, config: &LineConfig) -> io::Result<()> {
        let data_bits = to_serialport_data_bits(config.data_bits)?;
        let stop_bits = to_serialport_stop_bits(config.stop_bits)?;
        let port = self.port_mut()?;
        port.set_baud_rate(config.baud_rate)?;
        port.set_data_bits(data_bits)?;
        port.set_stop_bits(stop_bits)?;
        port.set_parity(to_serialport_parity(config.parity))?;
        port.set_flow_control(serialport::FlowControl::None)?;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        let port = self.port_mut()?;
        port.set_timeout(timeout)?;
        port.read(buf)
    }

    fn write(&mut self, data: &[u8], timeout: Duration) -> io::Result<()> {
        let port = self.port_mut()?;
        port.set_timeout(timeout)?;
        port.write_all(data)?;
        port.flush()
    }

    fn try_clone_port(&self) -> io::Result<Box<dyn SerialPort>> {
        let port = self
            .port
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "port is closed"))?;
        let clone = port.try_clone()?;
        Ok(Box::new(RealSerialPort {
            name: self.name.clone(),
            port: Some(clone),
        }))
    }

    fn close(&mut self) -> io::Result<()> {
        // Dropping the handle closes the file descriptor.
        self.port.take();
        Ok(())
    }
}

/// Serial driver backed by the operating system's port list
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemSerialDriver;

impl SystemSerialDriver {
    /// Create the system driver
    pub fn new() -> Self {
        Self
    }
}

impl SerialDriver for SystemSerialDriver {
    fn list_candidates(&self) -> Result<Vec<CandidateDevice>> {
        list_ports()
    }

    fn probe(&self, device: &CandidateDevice) -> Option<DriverInfo> {
        let ports = serialport::available_ports().ok()?;
        let port = ports
            .iter()
            .find(|port| port.port_name == device.port_name)?;
        Some(DriverInfo {
            driver_name: get_driver_name(port),
            ports: vec![port.port_name.clone()],
        })
    }

    fn open(&self, device: &CandidateDevice, port_index: usize) -> io::Result<Box<dyn SerialPort>> {
        if port_index != 0 {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} has no port {}", device.port_name, port_index),
            ));
        }
        Ok(Box::new(RealSerialPort::open(&device.port_name)?))
    }
}
