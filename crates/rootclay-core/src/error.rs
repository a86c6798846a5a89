//! Error handling for RootClay
//!
//! Provides error types for each layer of the streaming core:
//! - Connection errors (port open, writes, link loss)
//! - Stream errors (command sources, session state, device responses)
//!
//! All error types use `thiserror`. [`Error::kind`] collapses any error into
//! the flat [`ErrorKind`] reported to observers through `onError`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Connection error type
///
/// Represents failures of the byte channel between host and device.
#[derive(Error, Debug, Clone)]
pub enum ConnectionError {
    /// Failed to open port
    #[error("Failed to open port {port}: {reason}")]
    PortOpen {
        /// The name of the port that failed to open.
        port: String,
        /// The reason the port failed to open.
        reason: String,
    },

    /// A write to the device failed
    #[error("Write to {port} failed: {reason}")]
    Write {
        /// The port being written to.
        port: String,
        /// The reason the write failed.
        reason: String,
    },

    /// No link is open
    #[error("Not connected")]
    NotConnected,

    /// The link dropped while open
    #[error("Connection lost: {reason}")]
    ConnectionLost {
        /// The reason the connection was lost.
        reason: String,
    },

    /// Invalid connection parameters
    #[error("Invalid connection parameters: {reason}")]
    InvalidParameters {
        /// The reason the parameters are invalid.
        reason: String,
    },

    /// Port enumeration failed
    #[error("Failed to enumerate ports: {reason}")]
    Enumeration {
        /// The reason enumeration failed.
        reason: String,
    },
}

/// Stream error type
///
/// Represents failures of a streaming session or of a control call that is
/// not permitted in the engine's current state.
#[derive(Error, Debug, Clone)]
pub enum StreamError {
    /// The command source could not be read
    #[error("Failed to read {origin}: {reason}")]
    SourceRead {
        /// Description of the origin (file path or "inline text").
        origin: String,
        /// The reason the read failed.
        reason: String,
    },

    /// A session is already streaming or paused
    #[error("A stream is already {state}")]
    SessionActive {
        /// The state of the active session.
        state: String,
    },

    /// The request needs a session in a different state
    #[error("Cannot {requested} while {current}")]
    InvalidTransition {
        /// The current state name.
        current: String,
        /// The requested operation.
        requested: String,
    },

    /// The device did not acknowledge in time
    #[error("No acknowledgment for '{command}' after {timeout_ms}ms")]
    AckTimeout {
        /// The unacknowledged command.
        command: String,
        /// The timeout duration in milliseconds.
        timeout_ms: u64,
    },

    /// The device reported a fault and the fault policy halts the stream
    #[error("Device fault: {detail}")]
    DeviceFault {
        /// The response line reported by the device.
        detail: String,
    },

    /// A command was rejected before transmission
    #[error("Invalid command: {reason}")]
    InvalidCommand {
        /// Why the command was rejected.
        reason: String,
    },
}

/// Flat classification of errors reported to observers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The port could not be opened.
    PortOpen,
    /// A write to the device failed.
    Write,
    /// The command source could not be read.
    SourceRead,
    /// The device reported a fault.
    DeviceFault,
    /// The device did not acknowledge in time.
    AckTimeout,
    /// The link dropped while open.
    ConnectionLost,
    /// The control call is not allowed in the current state.
    InvalidState,
    /// The input to a control call was malformed.
    InvalidInput,
    /// Anything else.
    Other,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::PortOpen => "PortOpenError",
            ErrorKind::Write => "WriteError",
            ErrorKind::SourceRead => "SourceReadError",
            ErrorKind::DeviceFault => "DeviceFault",
            ErrorKind::AckTimeout => "AckTimeoutError",
            ErrorKind::ConnectionLost => "ConnectionLost",
            ErrorKind::InvalidState => "InvalidState",
            ErrorKind::InvalidInput => "InvalidInput",
            ErrorKind::Other => "Other",
        };
        f.write_str(name)
    }
}

/// Main error type for RootClay
#[derive(Error, Debug)]
pub enum Error {
    /// Connection error
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Stream error
    #[error(transparent)]
    Stream(#[from] StreamError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Classify this error for observers
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Connection(e) => match e {
                ConnectionError::PortOpen { .. } => ErrorKind::PortOpen,
                ConnectionError::Write { .. } => ErrorKind::Write,
                ConnectionError::NotConnected => ErrorKind::InvalidState,
                ConnectionError::ConnectionLost { .. } => ErrorKind::ConnectionLost,
                ConnectionError::InvalidParameters { .. } => ErrorKind::InvalidInput,
                ConnectionError::Enumeration { .. } => ErrorKind::Other,
            },
            Error::Stream(e) => match e {
                StreamError::SourceRead { .. } => ErrorKind::SourceRead,
                StreamError::SessionActive { .. } | StreamError::InvalidTransition { .. } => {
                    ErrorKind::InvalidState
                }
                StreamError::AckTimeout { .. } => ErrorKind::AckTimeout,
                StreamError::DeviceFault { .. } => ErrorKind::DeviceFault,
                StreamError::InvalidCommand { .. } => ErrorKind::InvalidInput,
            },
            Error::Io(_) => ErrorKind::Other,
            Error::Other(_) => ErrorKind::Other,
        }
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Stream(StreamError::AckTimeout { .. }))
    }

    /// Check if this is a connection error
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Error::Connection(_))
    }

    /// Check if this is a stream error
    pub fn is_stream_error(&self) -> bool {
        matches!(self, Error::Stream(_))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        let err: Error = ConnectionError::PortOpen {
            port: "/dev/ttyUSB0".to_string(),
            reason: "busy".to_string(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::PortOpen);
        assert!(err.is_connection_error());

        let err: Error = StreamError::AckTimeout {
            command: "G28".to_string(),
            timeout_ms: 500,
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::AckTimeout);
        assert!(err.is_timeout());

        let err: Error = StreamError::SessionActive {
            state: "Paused".to_string(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn test_display_messages() {
        let err = StreamError::SourceRead {
            origin: "part.gcode".to_string(),
            reason: "No such file".to_string(),
        };
        assert_eq!(err.to_string(), "Failed to read part.gcode: No such file");
        assert_eq!(ErrorKind::Write.to_string(), "WriteError");
    }
}
