//! # RootClay Core
//!
//! Core types shared by the RootClay crates: the error hierarchy, the stream
//! state model and the event surface consumed by front ends.

pub mod error;
pub mod event_bus;
pub mod state;

pub use error::{ConnectionError, Error, ErrorKind, Result, StreamError};

pub use event_bus::{
    ChannelSink, EventBus, EventBusConfig, EventCategory, EventFilter, EventSink,
    EventSinkHandle, NullSink, StreamEvent, SubscriptionId,
};

pub use state::{progress_percent, StreamSnapshot, StreamState};
