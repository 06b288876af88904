//! Event system for connection reporting
//!
//! Provides:
//! - Event types for connection state changes, log text, and failures
//! - Event dispatcher for publishing events to subscribers
//!
//! The connection read loop runs on its own thread; it never touches UI
//! state directly. Everything it reports goes through the dispatcher and is
//! drained, in order, by whoever owns the UI context.

use crate::data::ConnectionStatus;
use crate::error::ConnectionError;
use tokio::sync::broadcast;

/// Connection event types
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// Connection state changed
    StateChanged(ConnectionStatus),
    /// Informational log line for the operator
    Log(String),
    /// Text received from the machine, trimmed
    Received(String),
    /// A command was written to the port
    Sent(String),
    /// A connection attempt or an open connection failed
    Failed(ConnectionError),
}

impl ConnectionEvent {
    /// Text to append to the operator log, if this event produces any
    pub fn log_line(&self) -> Option<String> {
        match self {
            ConnectionEvent::StateChanged(_) => None,
            ConnectionEvent::Log(line) | ConnectionEvent::Received(line) => Some(line.clone()),
            ConnectionEvent::Sent(command) => Some(format!("> {}", command.trim())),
            ConnectionEvent::Failed(err) => Some(err.to_string()),
        }
    }
}

impl std::fmt::Display for ConnectionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionEvent::StateChanged(status) => write!(f, "State: {}", status),
            ConnectionEvent::Log(line) => write!(f, "{}", line),
            ConnectionEvent::Received(text) => write!(f, "< {}", text),
            ConnectionEvent::Sent(command) => write!(f, "> {}", command.trim()),
            ConnectionEvent::Failed(err) => write!(f, "Error: {}", err),
        }
    }
}

/// Event dispatcher for publishing events to subscribers
#[derive(Clone)]
pub struct EventDispatcher {
    /// Broadcast sender channel for connection events.
    tx: broadcast::Sender<ConnectionEvent>,
}

impl EventDispatcher {
    /// Create a new event dispatcher
    ///
    /// # Arguments
    /// * `buffer_size` - Size of the broadcast buffer (default 256)
    pub fn new(buffer_size: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer_size);
        Self { tx }
    }

    /// Create a new event dispatcher with default buffer size
    pub fn default_with_buffer() -> Self {
        Self::new(256)
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.tx.subscribe()
    }

    /// Publish an event to all subscribers
    pub fn publish(
        &self,
        event: ConnectionEvent,
    ) -> Result<usize, broadcast::error::SendError<ConnectionEvent>> {
        self.tx.send(event)
    }

    /// Publish an event, dropping it when nobody is listening
    pub fn emit(&self, event: ConnectionEvent) {
        if let Err(broadcast::error::SendError(event)) = self.tx.send(event) {
            tracing::trace!("No subscribers for event: {}", event);
        }
    }

    /// Get number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::default_with_buffer()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_reaches_subscribers_in_order() {
        let dispatcher = EventDispatcher::default();
        let mut rx = dispatcher.subscribe();

        dispatcher.emit(ConnectionEvent::Log("one".to_string()));
        dispatcher.emit(ConnectionEvent::Received("ok".to_string()));

        assert_eq!(rx.try_recv().ok(), Some(ConnectionEvent::Log("one".to_string())));
        assert_eq!(rx.try_recv().ok(), Some(ConnectionEvent::Received("ok".to_string())));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_emit_without_subscribers() {
        let dispatcher = EventDispatcher::new(4);
        assert_eq!(dispatcher.subscriber_count(), 0);
        dispatcher.emit(ConnectionEvent::Log("dropped".to_string()));
        assert!(dispatcher.publish(ConnectionEvent::Log("x".to_string())).is_err());
    }

    #[test]
    fn test_log_lines() {
        assert_eq!(
            ConnectionEvent::Sent("G91\nG0 X0.10\nG90\n".to_string()).log_line(),
            Some("> G91\nG0 X0.10\nG90".to_string())
        );
        assert_eq!(
            ConnectionEvent::Failed(ConnectionError::NotConnected).log_line(),
            Some("Not connected".to_string())
        );
        assert_eq!(
            ConnectionEvent::StateChanged(ConnectionStatus::Disconnected).log_line(),
            None
        );
    }
}
