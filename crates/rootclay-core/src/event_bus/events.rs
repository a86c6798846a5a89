//! Event type definitions for the event bus.
//!
//! Events are cloneable and serializable so front ends can log or forward
//! them as JSON.

use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;
use crate::state::StreamState;

/// Event emitted by the streaming core
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Console text: device chatter, echoed commands, lifecycle notes
    Log {
        /// The log line.
        text: String,
    },
    /// Stream progress in percent
    Progress {
        /// Completed share of the source, 0..=100.
        percent: u8,
    },
    /// The stream finished successfully
    Completed,
    /// The caller stopped the stream
    Stopped,
    /// The device rejected or failed a command
    Fault {
        /// The response line reported by the device.
        detail: String,
    },
    /// A fatal error ended the session or the link
    Error {
        /// Error classification.
        kind: ErrorKind,
        /// Human-readable detail.
        detail: String,
    },
    /// The engine changed state
    StateChanged {
        /// The new state.
        state: StreamState,
    },
}

impl StreamEvent {
    /// Convenience constructor for log events
    pub fn log(text: impl Into<String>) -> Self {
        StreamEvent::Log { text: text.into() }
    }

    /// Get the category of this event
    pub fn category(&self) -> EventCategory {
        match self {
            StreamEvent::Log { .. } => EventCategory::Log,
            StreamEvent::Progress { .. } => EventCategory::Progress,
            StreamEvent::Completed | StreamEvent::Stopped | StreamEvent::StateChanged { .. } => {
                EventCategory::Lifecycle
            }
            StreamEvent::Fault { .. } | StreamEvent::Error { .. } => EventCategory::Error,
        }
    }

    /// Whether this event ends a session
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StreamEvent::Completed | StreamEvent::Stopped | StreamEvent::Error { .. }
        )
    }

    /// Get a short description of this event for logging
    pub fn description(&self) -> String {
        match self {
            StreamEvent::Log { text } => text.clone(),
            StreamEvent::Progress { percent } => format!("Progress {}%", percent),
            StreamEvent::Completed => "Stream completed".to_string(),
            StreamEvent::Stopped => "Stream stopped".to_string(),
            StreamEvent::Fault { detail } => format!("Device fault: {}", detail),
            StreamEvent::Error { kind, detail } => format!("{}: {}", kind, detail),
            StreamEvent::StateChanged { state } => format!("State: {}", state),
        }
    }
}

/// Event category for filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventCategory {
    /// Console output.
    Log,
    /// Progress updates.
    Progress,
    /// State changes and terminal events.
    Lifecycle,
    /// Device faults and fatal errors.
    Error,
}

impl std::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventCategory::Log => write!(f, "Log"),
            EventCategory::Progress => write!(f, "Progress"),
            EventCategory::Lifecycle => write!(f, "Lifecycle"),
            EventCategory::Error => write!(f, "Error"),
        }
    }
}
