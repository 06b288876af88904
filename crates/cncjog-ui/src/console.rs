//! Operator log
//!
//! Bounded, timestamped record of everything the session reports: its own
//! messages, commands sent, controller replies and connection failures.

use chrono::{DateTime, Local};
use cncjog_core::ConnectionEvent;
use std::collections::VecDeque;

/// Default number of lines kept
pub const DEFAULT_MAX_LINES: usize = 500;

/// Console line kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLevel {
    /// Session or connection information
    Info,
    /// Connection failure
    Error,
    /// Command written to the machine
    Sent,
    /// Text received from the machine
    Received,
}

impl std::fmt::Display for MessageLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Error => write!(f, "ERR"),
            Self::Sent => write!(f, "TX"),
            Self::Received => write!(f, "RX"),
        }
    }
}

/// One console line
#[derive(Debug, Clone)]
pub struct ConsoleLine {
    pub level: MessageLevel,
    pub text: String,
    pub timestamp: DateTime<Local>,
}

impl ConsoleLine {
    pub fn new(level: MessageLevel, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
            timestamp: Local::now(),
        }
    }

    /// Line for a connection event, if the event produces one
    pub fn from_event(event: &ConnectionEvent) -> Option<Self> {
        let level = match event {
            ConnectionEvent::StateChanged(_) => return None,
            ConnectionEvent::Log(_) => MessageLevel::Info,
            ConnectionEvent::Received(_) => MessageLevel::Received,
            ConnectionEvent::Sent(_) => MessageLevel::Sent,
            ConnectionEvent::Failed(_) => MessageLevel::Error,
        };
        event.log_line().map(|text| Self::new(level, text))
    }

    /// Formatted with a wall-clock prefix
    pub fn formatted_with_time(&self) -> String {
        format!(
            "[{}] [{}] {}",
            self.timestamp.format("%H:%M:%S"),
            self.level,
            self.text
        )
    }
}

/// Bounded console history
#[derive(Debug, Clone)]
pub struct ConsoleLog {
    lines: VecDeque<ConsoleLine>,
    max_lines: usize,
}

impl Default for ConsoleLog {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINES)
    }
}

impl ConsoleLog {
    pub fn new(max_lines: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            max_lines: max_lines.max(1),
        }
    }

    /// Append a line, dropping the oldest beyond the limit
    pub fn push(&mut self, line: ConsoleLine) {
        self.lines.push_back(line);
        while self.lines.len() > self.max_lines {
            self.lines.pop_front();
        }
    }

    pub fn lines(&self) -> impl Iterator<Item = &ConsoleLine> {
        self.lines.iter()
    }

    pub fn last(&self) -> Option<&ConsoleLine> {
        self.lines.back()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}
