//! # RootClay Communication
//!
//! Everything between a G-code script and the printer's serial port:
//! - the byte link ([`DeviceLink`]) and its serial implementation
//! - response framing and classification
//! - the ping-pong [`StreamEngine`] that paces a [`CommandSource`]
//! - the [`PrinterController`] control surface that owns the engine
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use rootclay_communication::{ControllerConfig, PrinterController, SerialOpener, SourceOrigin};
//! use rootclay_core::EventBus;
//!
//! let bus = Arc::new(EventBus::new());
//! let controller = PrinterController::spawn(Arc::new(SerialOpener), bus, ControllerConfig::default());
//! controller.connect("/dev/ttyUSB0", 115200).await?;
//! controller.start_stream(SourceOrigin::File("vase.gcode".into())).await?;
//! ```

pub mod communication;
pub mod controller;
pub mod firmware;
pub mod streaming;

pub use communication::{
    framing::LineFramer,
    mock::{MockDevice, MockOpener},
    serial::{list_ports, SerialLink, SerialOpener, SerialPortInfo},
    ConnectionParams, DeviceLink, LinkHandle, LinkOpener, ResponseReceiver, SerialParity,
};

pub use controller::{ControllerConfig, PrinterController};

pub use firmware::{
    commands::PrinterCommand,
    response_parser::{AckMatch, DeviceResponse, ResponseParser},
};

pub use streaming::{
    engine::{FaultPolicy, StreamConfig, StreamEngine},
    sanitizer::{sanitize, SanitizedLine, COMMENT_DELIMITER},
    source::{CommandSource, SourceOrigin},
};
