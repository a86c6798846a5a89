//! Serial port link
//!
//! Opens the printer's USB serial port with the `serialport` crate. Writes go
//! straight to the port from the caller; reads run on a dedicated thread that
//! frames bytes into lines and forwards them over a channel. The channel
//! closes when the read side fails, which the controller treats as a lost
//! connection.

use super::framing::LineFramer;
use super::{ConnectionParams, DeviceLink, LinkHandle, LinkOpener, SerialParity};
use rootclay_core::{ConnectionError, Result};
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::mpsc;

/// Information about an available serial port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialPortInfo {
    /// Port name (e.g., "/dev/ttyUSB0", "COM3")
    pub port_name: String,

    /// Port description (e.g., "USB Serial Port")
    pub description: String,

    /// Manufacturer name if available
    pub manufacturer: Option<String>,

    /// Serial number if available
    pub serial_number: Option<String>,

    /// USB vendor ID if applicable
    pub vid: Option<u16>,

    /// USB product ID if applicable
    pub pid: Option<u16>,
}

impl SerialPortInfo {
    /// Create a new port info
    pub fn new(port_name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            description: description.into(),
            manufacturer: None,
            serial_number: None,
            vid: None,
            pid: None,
        }
    }

    fn from_serialport(port: &serialport::SerialPortInfo) -> Self {
        let mut info = Self::new(&port.port_name, describe(&port.port_type));
        if let serialport::SerialPortType::UsbPort(usb) = &port.port_type {
            info.vid = Some(usb.vid);
            info.pid = Some(usb.pid);
            info.manufacturer = usb.manufacturer.clone();
            info.serial_number = usb.serial_number.clone();
        }
        info
    }
}

/// List serial ports that look like printer controllers
///
/// Keeps only USB-style device names:
/// - Windows: COM*
/// - Linux: /dev/ttyUSB*, /dev/ttyACM*
/// - macOS: /dev/cu.usbserial-*, /dev/cu.usbmodem*
pub fn list_ports() -> Result<Vec<SerialPortInfo>> {
    let ports = serialport::available_ports().map_err(|e| {
        tracing::error!("Failed to enumerate serial ports: {}", e);
        ConnectionError::Enumeration {
            reason: e.to_string(),
        }
    })?;

    Ok(ports
        .iter()
        .filter(|port| is_printer_port(&port.port_name))
        .map(SerialPortInfo::from_serialport)
        .collect())
}

fn is_printer_port(port_name: &str) -> bool {
    if let Some(number) = port_name.strip_prefix("COM") {
        return !number.is_empty() && number.chars().all(|c| c.is_ascii_digit());
    }

    port_name.starts_with("/dev/ttyUSB")
        || port_name.starts_with("/dev/ttyACM")
        || port_name.starts_with("/dev/cu.usbserial-")
        || port_name.starts_with("/dev/cu.usbmodem")
}

fn describe(port_type: &serialport::SerialPortType) -> String {
    match port_type {
        serialport::SerialPortType::UsbPort(usb) => format!(
            "USB {} {}",
            usb.manufacturer.as_deref().unwrap_or("Device"),
            usb.product.as_deref().unwrap_or("Serial Port")
        ),
        serialport::SerialPortType::BluetoothPort => "Bluetooth Serial".to_string(),
        serialport::SerialPortType::PciPort => "PCI Serial".to_string(),
        serialport::SerialPortType::Unknown => "Serial Port".to_string(),
    }
}

fn to_serialport_parity(parity: SerialParity) -> serialport::Parity {
    match parity {
        SerialParity::None => serialport::Parity::None,
        SerialParity::Even => serialport::Parity::Even,
        SerialParity::Odd => serialport::Parity::Odd,
    }
}

/// An open serial port
pub struct SerialLink {
    port_name: String,
    port: Option<Box<dyn serialport::SerialPort>>,
    running: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}

impl SerialLink {
    /// Open the port described by `params` and start its reader thread
    pub fn open(params: &ConnectionParams) -> Result<LinkHandle> {
        params.validate()?;

        let open_error = |reason: String| ConnectionError::PortOpen {
            port: params.port.clone(),
            reason,
        };

        let data_bits = match params.data_bits {
            5 => serialport::DataBits::Five,
            6 => serialport::DataBits::Six,
            7 => serialport::DataBits::Seven,
            _ => serialport::DataBits::Eight,
        };
        let stop_bits = match params.stop_bits {
            2 => serialport::StopBits::Two,
            _ => serialport::StopBits::One,
        };

        let mut port = serialport::new(&params.port, params.baud_rate)
            .timeout(Duration::from_millis(params.timeout_ms.max(1)))
            .data_bits(data_bits)
            .stop_bits(stop_bits)
            .parity(to_serialport_parity(params.parity))
            .flow_control(if params.flow_control {
                serialport::FlowControl::Hardware
            } else {
                serialport::FlowControl::None
            })
            .dtr_on_open(params.dtr)
            .open()
            .map_err(|e| {
                tracing::warn!("Failed to open serial port {}: {}", params.port, e);
                open_error(e.to_string())
            })?;

        if params.rts {
            port.write_request_to_send(true)
                .map_err(|e| open_error(format!("failed to assert RTS: {}", e)))?;
        }

        let reader_port = port
            .try_clone()
            .map_err(|e| open_error(format!("failed to clone port handle: {}", e)))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let running = Arc::new(AtomicBool::new(true));
        let reader = spawn_reader(params.port.clone(), reader_port, running.clone(), tx)
            .map_err(|e| open_error(format!("failed to start reader: {}", e)))?;

        tracing::info!("Opened {} at {} baud", params.port, params.baud_rate);

        Ok(LinkHandle {
            link: Box::new(Self {
                port_name: params.port.clone(),
                port: Some(port),
                running,
                reader: Some(reader),
            }),
            responses: rx,
        })
    }
}

fn spawn_reader(
    port_name: String,
    mut port: Box<dyn serialport::SerialPort>,
    running: Arc<AtomicBool>,
    tx: mpsc::UnboundedSender<String>,
) -> io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("rootclay-serial-reader".to_string())
        .spawn(move || {
            let mut framer = LineFramer::new();
            let mut buf = [0u8; 1024];

            while running.load(Ordering::SeqCst) {
                match port.read(&mut buf) {
                    Ok(0) => {}
                    Ok(n) => {
                        for line in framer.push(&buf[..n]) {
                            if tx.send(line).is_err() {
                                return;
                            }
                        }
                    }
                    Err(e)
                        if matches!(
                            e.kind(),
                            io::ErrorKind::TimedOut
                                | io::ErrorKind::WouldBlock
                                | io::ErrorKind::Interrupted
                        ) => {}
                    Err(e) => {
                        if running.load(Ordering::SeqCst) {
                            tracing::error!("Read from {} failed: {}", port_name, e);
                        }
                        break;
                    }
                }
            }
            tracing::debug!("Reader for {} exiting", port_name);
        })
}

impl DeviceLink for SerialLink {
    fn port_name(&self) -> &str {
        &self.port_name
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        let port = self.port.as_mut().ok_or(ConnectionError::NotConnected)?;
        port.write_all(data)
            .and_then(|_| port.flush())
            .map_err(|e| {
                ConnectionError::Write {
                    port: self.port_name.clone(),
                    reason: e.to_string(),
                }
                .into()
            })
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn close(&mut self) -> Result<()> {
        if self.port.take().is_none() {
            return Ok(());
        }

        self.running.store(false, Ordering::SeqCst);
        if let Some(reader) = self.reader.take() {
            if reader.join().is_err() {
                tracing::warn!("Reader for {} panicked", self.port_name);
            }
        }
        tracing::info!("Closed {}", self.port_name);
        Ok(())
    }
}

impl Drop for SerialLink {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Opens real serial ports
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialOpener;

impl LinkOpener for SerialOpener {
    fn open(&self, params: &ConnectionParams) -> Result<LinkHandle> {
        SerialLink::open(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_printer_port_patterns() {
        assert!(is_printer_port("COM3"));
        assert!(is_printer_port("/dev/ttyUSB0"));
        assert!(is_printer_port("/dev/ttyACM1"));
        assert!(is_printer_port("/dev/cu.usbmodem14101"));
        assert!(!is_printer_port("COM"));
        assert!(!is_printer_port("/dev/ttyS0"));
        assert!(!is_printer_port("/dev/cu.Bluetooth-Incoming-Port"));
    }

    #[test]
    fn test_open_missing_port_is_port_open_error() {
        let params = ConnectionParams::serial("/dev/ttyUSB-rootclay-missing", 115200);
        let err = SerialLink::open(&params).unwrap_err();
        assert_eq!(err.kind(), rootclay_core::ErrorKind::PortOpen);
    }
}
