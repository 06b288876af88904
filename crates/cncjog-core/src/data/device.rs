//! Candidate device descriptions and derived connection status

use serde::{Deserialize, Serialize};
use std::fmt;

/// An enumerated, not-yet-opened serial device eligible for connection
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CandidateDevice {
    /// Port name (e.g., "/dev/ttyUSB0", "COM3")
    pub port_name: String,

    /// Manufacturer name if available
    pub manufacturer: Option<String>,

    /// Product name if available
    pub product: Option<String>,

    /// Serial number if available
    pub serial_number: Option<String>,

    /// USB vendor ID if applicable
    pub vid: Option<u16>,

    /// USB product ID if applicable
    pub pid: Option<u16>,
}

impl CandidateDevice {
    /// Create a candidate known only by its port name
    pub fn new(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            manufacturer: None,
            product: None,
            serial_number: None,
            vid: None,
            pid: None,
        }
    }

    /// Set manufacturer and product names
    pub fn with_names(mut self, manufacturer: impl Into<String>, product: impl Into<String>) -> Self {
        self.manufacturer = Some(manufacturer.into());
        self.product = Some(product.into());
        self
    }

    /// Set USB IDs
    pub fn with_usb_ids(mut self, vid: u16, pid: u16) -> Self {
        self.vid = Some(vid);
        self.pid = Some(pid);
        self
    }

    /// Label shown to the operator when choosing a device
    ///
    /// Prefers "manufacturer product", then the USB IDs, then the port name.
    pub fn display_name(&self) -> String {
        match (&self.manufacturer, &self.product, self.vid, self.pid) {
            (Some(manufacturer), Some(product), _, _) => format!("{} {}", manufacturer, product),
            (_, _, Some(vid), Some(pid)) => format!("VID:{} PID:{}", vid, pid),
            _ => self.port_name.clone(),
        }
    }
}

impl fmt::Display for CandidateDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.port_name)
    }
}

/// Connection state as seen from outside the connection manager
///
/// Mirrors the manager's internal state without exposing the port handle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    /// No device is open or pending
    #[default]
    Disconnected,
    /// Waiting for the permission broker to answer for this device
    AwaitingPermission(CandidateDevice),
    /// The device is open and the read loop is running
    Open(CandidateDevice),
}

impl ConnectionStatus {
    /// Whether a port is currently open
    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionStatus::Open(_))
    }

    /// Whether nothing is open or pending
    pub fn is_disconnected(&self) -> bool {
        matches!(self, ConnectionStatus::Disconnected)
    }

    /// Short state name for logs and error messages
    pub fn name(&self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "Disconnected",
            ConnectionStatus::AwaitingPermission(_) => "AwaitingPermission",
            ConnectionStatus::Open(_) => "Open",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Disconnected => write!(f, "Disconnected"),
            ConnectionStatus::AwaitingPermission(device) => {
                write!(f, "Awaiting permission for {}", device)
            }
            ConnectionStatus::Open(device) => write!(f, "Connected to {}", device),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_prefers_names() {
        let device = CandidateDevice::new("/dev/ttyUSB0")
            .with_names("FTDI", "FT232R")
            .with_usb_ids(0x0403, 0x6001);
        assert_eq!(device.display_name(), "FTDI FT232R");
    }

    #[test]
    fn test_display_name_falls_back_to_ids() {
        let device = CandidateDevice::new("/dev/ttyACM0").with_usb_ids(6790, 29987);
        assert_eq!(device.display_name(), "VID:6790 PID:29987");

        let bare = CandidateDevice::new("COM3");
        assert_eq!(bare.display_name(), "COM3");
    }

    #[test]
    fn test_status_names() {
        let device = CandidateDevice::new("COM3");
        assert_eq!(ConnectionStatus::default().name(), "Disconnected");
        assert!(ConnectionStatus::Open(device.clone()).is_open());
        assert_eq!(
            ConnectionStatus::AwaitingPermission(device).to_string(),
            "Awaiting permission for COM3"
        );
    }
}
