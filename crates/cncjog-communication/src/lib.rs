//! # CNC Jogger Communication
//!
//! Serial connection management and command formatting for CNC Jogger.
//! Owns the single exclusive serial handle, runs the permission, open and
//! read lifecycle, and formats the GRBL commands a jog session emits.

pub mod communication;
pub mod firmware;

pub use communication::{
    connection::ConnectionManager,
    permission::{AutoGrantBroker, PermissionBroker, PermissionOutcome, PermissionResponder},
    serial::{list_ports, SystemSerialDriver},
    virtual_port::{VirtualRead, VirtualSerialDriver},
    DriverInfo, LineConfig, SerialDriver, SerialParity, SerialPort, READ_TIMEOUT, WRITE_TIMEOUT,
};

pub use firmware::grbl::command_creator::JogCommand;
