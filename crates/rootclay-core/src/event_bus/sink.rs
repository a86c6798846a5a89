//! Event sink interface
//!
//! The streaming engine reports everything through an [`EventSink`]. Sinks
//! are called on the engine's control loop and must return quickly.

use std::sync::Arc;
use tokio::sync::mpsc;

use super::events::StreamEvent;
use crate::error::ErrorKind;

/// Receiver of engine events
pub trait EventSink: Send + Sync {
    /// Deliver one event
    fn emit(&self, event: StreamEvent);

    /// Console text
    fn on_log(&self, text: &str) {
        self.emit(StreamEvent::log(text));
    }

    /// Progress percentage
    fn on_progress(&self, percent: u8) {
        self.emit(StreamEvent::Progress { percent });
    }

    /// Successful completion
    fn on_completed(&self) {
        self.emit(StreamEvent::Completed);
    }

    /// Device-reported fault
    fn on_fault(&self, detail: &str) {
        self.emit(StreamEvent::Fault {
            detail: detail.to_string(),
        });
    }

    /// Fatal error
    fn on_error(&self, kind: ErrorKind, detail: &str) {
        self.emit(StreamEvent::Error {
            kind,
            detail: detail.to_string(),
        });
    }
}

/// Shared handle to a sink
pub type EventSinkHandle = Arc<dyn EventSink>;

/// Sink that drops every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: StreamEvent) {}
}

/// Sink forwarding events into an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<StreamEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiver draining it
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StreamEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: StreamEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("Event receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_sink_forwards() {
        let (sink, mut rx) = ChannelSink::new();
        sink.on_log("hello");
        sink.on_progress(40);
        sink.on_error(ErrorKind::Write, "broken pipe");

        assert_eq!(rx.try_recv().unwrap(), StreamEvent::log("hello"));
        assert_eq!(rx.try_recv().unwrap(), StreamEvent::Progress { percent: 40 });
        assert_eq!(
            rx.try_recv().unwrap(),
            StreamEvent::Error {
                kind: ErrorKind::Write,
                detail: "broken pipe".to_string()
            }
        );
    }

    #[test]
    fn test_channel_sink_survives_dropped_receiver() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        sink.on_completed();
    }
}
