//! Device permission boundary
//!
//! Opening a device may require the platform to ask the operator first.
//! The connection manager hands a [`PermissionBroker`] the candidate and a
//! one-shot [`PermissionResponder`]; the broker answers whenever, from
//! whatever thread, and the manager completes the transition.

use super::connection::ConnectionManager;
use cncjog_core::CandidateDevice;

/// Result of a permission request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionOutcome {
    /// Device the answer refers to; `None` means "the one that was asked for"
    pub device: Option<CandidateDevice>,
    /// Whether access was granted
    pub granted: bool,
}

impl PermissionOutcome {
    /// Access granted for the given device
    pub fn granted(device: CandidateDevice) -> Self {
        Self {
            device: Some(device),
            granted: true,
        }
    }

    /// Access refused for the given device
    pub fn denied(device: CandidateDevice) -> Self {
        Self {
            device: Some(device),
            granted: false,
        }
    }
}

/// Platform service that grants or refuses access to a device
pub trait PermissionBroker: Send + Sync {
    /// Ask for access; the answer goes through `responder`, possibly later
    fn request_permission(&self, device: &CandidateDevice, responder: PermissionResponder);
}

/// One-shot handle for answering a single permission request
///
/// Answers to a request that is no longer pending (the operator
/// disconnected, or started another request) are ignored.
pub struct PermissionResponder {
    manager: ConnectionManager,
    request_id: u64,
}

impl PermissionResponder {
    pub(crate) fn new(manager: ConnectionManager, request_id: u64) -> Self {
        Self {
            manager,
            request_id,
        }
    }

    /// Deliver the broker's answer
    pub fn respond(self, outcome: PermissionOutcome) {
        self.manager.complete_permission(self.request_id, outcome);
    }

    /// Grant access to `device`
    pub fn grant(self, device: CandidateDevice) {
        self.respond(PermissionOutcome::granted(device));
    }

    /// Refuse access to `device`
    pub fn deny(self, device: CandidateDevice) {
        self.respond(PermissionOutcome::denied(device));
    }
}

impl std::fmt::Debug for PermissionResponder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionResponder")
            .field("request_id", &self.request_id)
            .finish()
    }
}

/// Broker for platforms where opening a port needs no runtime grant
///
/// Answers immediately on the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoGrantBroker;

impl PermissionBroker for AutoGrantBroker {
    fn request_permission(&self, device: &CandidateDevice, responder: PermissionResponder) {
        tracing::debug!("Auto-granting access to {}", device);
        responder.grant(device.clone());
    }
}
