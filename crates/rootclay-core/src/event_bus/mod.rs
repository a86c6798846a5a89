//! # Event Bus Module
//!
//! Event types and sinks through which the streaming core reports to the
//! surrounding application.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rootclay_core::event_bus::{EventBus, EventCategory, EventFilter, StreamEvent};
//!
//! let bus = EventBus::new();
//! let subscription = bus.subscribe(
//!     EventFilter::Categories(vec![EventCategory::Progress]),
//!     |event| {
//!         if let StreamEvent::Progress { percent } = event {
//!             println!("{}%", percent);
//!         }
//!     },
//! );
//!
//! // Hand `Arc::new(bus)` to the controller as its EventSink.
//! ```

mod bus;
mod events;
mod sink;

pub use bus::*;
pub use events::*;
pub use sink::*;
