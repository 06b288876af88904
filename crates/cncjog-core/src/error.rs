//! Error handling for CNC Jogger
//!
//! Provides the error types used across the workspace:
//! - Connection errors (permission, discovery, serial transport)
//! - A unified `Error` wrapping every layer
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Connection error type
///
/// Represents errors related to discovering, opening, and talking to the
/// serial device. Every variant except `InvalidState` and `NotConnected`
/// leaves the connection in the Disconnected state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// Operation requires an open connection
    #[error("Not connected")]
    NotConnected,

    /// Operation is not valid from the current connection state
    #[error("Invalid connection state: expected {expected}, was {actual}")]
    InvalidState {
        /// The state the operation requires.
        expected: String,
        /// The state the manager was in.
        actual: String,
    },

    /// Permission to use the device was refused
    #[error("Permission refused for {device}")]
    PermissionDenied {
        /// Label of the refused device.
        device: String,
    },

    /// No driver recognizes the device
    #[error("No suitable driver found for {device}")]
    NoDriver {
        /// Label of the unrecognized device.
        device: String,
    },

    /// The device exposes no serial ports
    #[error("No ports found on {device}")]
    NoPorts {
        /// Label of the device.
        device: String,
    },

    /// Failed to open or configure the port
    #[error("Failed to open port {port}: {reason}")]
    FailedToOpen {
        /// The name of the port that failed to open.
        port: String,
        /// The reason the port failed to open.
        reason: String,
    },

    /// Connection lost while reading or writing
    #[error("Connection lost: {reason}")]
    ConnectionLost {
        /// The reason the connection was lost.
        reason: String,
    },

    /// Port enumeration failed
    #[error("Failed to enumerate ports: {reason}")]
    Enumeration {
        /// The reason enumeration failed.
        reason: String,
    },
}

impl ConnectionError {
    /// Build an `InvalidState` error from two state names
    pub fn invalid_state(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::InvalidState {
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

/// Main error type for CNC Jogger
///
/// A unified error type that can represent any error from all layers.
#[derive(Error, Debug)]
pub enum Error {
    /// Connection error
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Check if this is a connection error
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Error::Connection(_))
    }

    /// Check if this error means no connection is open
    pub fn is_not_connected(&self) -> bool {
        matches!(self, Error::Connection(ConnectionError::NotConnected))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;
