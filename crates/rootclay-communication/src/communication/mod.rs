//! Device link abstraction
//!
//! A [`DeviceLink`] is the write half of an open connection; its read half is
//! a channel of decoded response lines delivered as they are framed. A
//! [`LinkOpener`] produces both halves together as a [`LinkHandle`].

pub mod framing;
pub mod mock;
pub mod serial;

use rootclay_core::{ConnectionError, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Serial parity setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerialParity {
    /// No parity bit
    #[default]
    None,
    /// Even parity
    Even,
    /// Odd parity
    Odd,
}

/// Parameters for opening a link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    /// Port path (e.g., "/dev/ttyUSB0", "COM3")
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Data bits (5-8)
    pub data_bits: u8,
    /// Stop bits (1 or 2)
    pub stop_bits: u8,
    /// Parity
    pub parity: SerialParity,
    /// Hardware flow control
    pub flow_control: bool,
    /// Assert DTR when the port opens
    pub dtr: bool,
    /// Assert RTS when the port opens
    pub rts: bool,
    /// Read timeout of the reader thread in milliseconds
    pub timeout_ms: u64,
}

impl Default for ConnectionParams {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: 115200,
            data_bits: 8,
            stop_bits: 1,
            parity: SerialParity::None,
            flow_control: false,
            dtr: true,
            rts: true,
            timeout_ms: 50,
        }
    }
}

impl ConnectionParams {
    /// Default 8N1 parameters for a port and baud rate
    pub fn serial(port: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port: port.into(),
            baud_rate,
            ..Default::default()
        }
    }

    /// Check the parameters before touching the hardware
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| {
            Err(ConnectionError::InvalidParameters {
                reason: reason.to_string(),
            }
            .into())
        };

        if self.port.trim().is_empty() {
            return invalid("port must not be empty");
        }
        if self.baud_rate == 0 {
            return invalid("baud rate must be > 0");
        }
        if !(5..=8).contains(&self.data_bits) {
            return invalid("data bits must be 5-8");
        }
        if !(1..=2).contains(&self.stop_bits) {
            return invalid("stop bits must be 1 or 2");
        }
        Ok(())
    }
}

/// Receiver of decoded response lines
pub type ResponseReceiver = mpsc::UnboundedReceiver<String>;

/// Write half of an open connection
///
/// Writes take `&mut self`, so two writes on one handle can never overlap.
pub trait DeviceLink: Send {
    /// Name of the underlying port
    fn port_name(&self) -> &str;

    /// Write raw bytes
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Write one command followed by the line delimiter
    fn write_line(&mut self, line: &str) -> Result<()> {
        let mut frame = Vec::with_capacity(line.len() + 1);
        frame.extend_from_slice(line.as_bytes());
        frame.push(b'\n');
        self.write(&frame)
    }

    /// Whether the link is still open
    fn is_open(&self) -> bool;

    /// Close the link. Closing twice is a no-op.
    fn close(&mut self) -> Result<()>;
}

/// Both halves of a freshly opened connection
pub struct LinkHandle {
    /// Write half
    pub link: Box<dyn DeviceLink>,
    /// Response lines as they are framed
    pub responses: ResponseReceiver,
}

impl std::fmt::Debug for LinkHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkHandle")
            .field("port", &self.link.port_name())
            .finish()
    }
}

/// Opens links; the seam where tests substitute a simulated device
pub trait LinkOpener: Send + Sync {
    /// Open a connection, failing with a port-open error
    fn open(&self, params: &ConnectionParams) -> Result<LinkHandle>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params_are_8n1() {
        let params = ConnectionParams::serial("/dev/ttyACM0", 250000);
        assert_eq!(params.data_bits, 8);
        assert_eq!(params.stop_bits, 1);
        assert_eq!(params.parity, SerialParity::None);
        assert!(params.dtr && params.rts);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_params() {
        assert!(ConnectionParams::serial("", 115200).validate().is_err());
        assert!(ConnectionParams::serial("COM3", 0).validate().is_err());

        let params = ConnectionParams {
            stop_bits: 3,
            ..ConnectionParams::serial("COM3", 115200)
        };
        assert!(params.validate().is_err());
    }
}
