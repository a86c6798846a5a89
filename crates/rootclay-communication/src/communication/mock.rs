//! Simulated printer for tests and dry runs
//!
//! A [`MockDevice`] records every line written to it and answers from a
//! script. [`MockOpener`] hands out links bound to the device, so a
//! controller can be driven end to end without hardware.

use super::{ConnectionParams, DeviceLink, LinkHandle, LinkOpener};
use parking_lot::Mutex;
use rootclay_core::{ConnectionError, Result};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Default)]
struct MockState {
    writes: Vec<String>,
    scripted: VecDeque<Vec<String>>,
    auto_reply: Option<String>,
    fail_writes: bool,
    fail_open: bool,
    responder: Option<mpsc::UnboundedSender<String>>,
    opened: usize,
    closed: usize,
}

/// Shared handle to a simulated device
#[derive(Debug, Clone, Default)]
pub struct MockDevice {
    state: Arc<Mutex<MockState>>,
}

impl MockDevice {
    /// A device that never answers unless scripted
    pub fn new() -> Self {
        Self::default()
    }

    /// A device that answers every line with `ok`
    pub fn auto_ok() -> Self {
        let device = Self::new();
        device.set_auto_reply(Some("ok"));
        device
    }

    /// Reply used when the script queue is empty
    pub fn set_auto_reply(&self, reply: Option<&str>) {
        self.state.lock().auto_reply = reply.map(str::to_string);
    }

    /// Queue the replies for the next write, in order
    pub fn script<I, S>(&self, replies: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state
            .lock()
            .scripted
            .push_back(replies.into_iter().map(Into::into).collect());
    }

    /// Deliver a line as if the device had sent it unprompted
    ///
    /// Returns false when no link is open.
    pub fn inject(&self, line: impl Into<String>) -> bool {
        let state = self.state.lock();
        match &state.responder {
            Some(tx) => tx.send(line.into()).is_ok(),
            None => false,
        }
    }

    /// Drop the response channel, as a cable pull would
    pub fn disconnect(&self) {
        self.state.lock().responder = None;
    }

    /// Make subsequent writes fail
    pub fn set_fail_writes(&self, fail: bool) {
        self.state.lock().fail_writes = fail;
    }

    /// Make subsequent opens fail
    pub fn set_fail_open(&self, fail: bool) {
        self.state.lock().fail_open = fail;
    }

    /// Every line written so far, without the trailing newline
    pub fn writes(&self) -> Vec<String> {
        self.state.lock().writes.clone()
    }

    /// Written lines that carry a command, skipping bare wake-up newlines
    pub fn commands(&self) -> Vec<String> {
        self.writes().into_iter().filter(|w| !w.is_empty()).collect()
    }

    /// Forget recorded writes
    pub fn clear_writes(&self) {
        self.state.lock().writes.clear();
    }

    /// Number of links opened
    pub fn open_count(&self) -> usize {
        self.state.lock().opened
    }

    /// Number of links closed
    pub fn close_count(&self) -> usize {
        self.state.lock().closed
    }

    /// Open a link directly, bypassing an opener
    pub fn open_link(&self, port: &str) -> Result<LinkHandle> {
        let mut state = self.state.lock();
        if state.fail_open {
            return Err(ConnectionError::PortOpen {
                port: port.to_string(),
                reason: "simulated open failure".to_string(),
            }
            .into());
        }

        let (tx, rx) = mpsc::unbounded_channel();
        state.responder = Some(tx);
        state.opened += 1;

        Ok(LinkHandle {
            link: Box::new(MockLink {
                port_name: port.to_string(),
                device: self.clone(),
                open: true,
            }),
            responses: rx,
        })
    }
}

struct MockLink {
    port_name: String,
    device: MockDevice,
    open: bool,
}

impl DeviceLink for MockLink {
    fn port_name(&self) -> &str {
        &self.port_name
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        if !self.open {
            return Err(ConnectionError::NotConnected.into());
        }

        let mut state = self.device.state.lock();
        if state.fail_writes {
            return Err(ConnectionError::Write {
                port: self.port_name.clone(),
                reason: "simulated write failure".to_string(),
            }
            .into());
        }

        let text = String::from_utf8_lossy(data);
        let line = text.strip_suffix('\n').unwrap_or(&text).to_string();
        let is_command = !line.trim().is_empty();
        state.writes.push(line);

        if !is_command {
            return Ok(());
        }

        let replies = match state.scripted.pop_front() {
            Some(replies) => replies,
            None => state.auto_reply.iter().cloned().collect(),
        };
        if let Some(tx) = &state.responder {
            for reply in replies {
                let _ = tx.send(reply);
            }
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn close(&mut self) -> Result<()> {
        if self.open {
            self.open = false;
            let mut state = self.device.state.lock();
            state.closed += 1;
            state.responder = None;
        }
        Ok(())
    }
}

impl Drop for MockLink {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Opener that binds every link to one [`MockDevice`]
#[derive(Debug, Clone, Default)]
pub struct MockOpener {
    device: MockDevice,
}

impl MockOpener {
    /// Create an opener for `device`
    pub fn new(device: MockDevice) -> Self {
        Self { device }
    }

    /// The simulated device
    pub fn device(&self) -> &MockDevice {
        &self.device
    }
}

impl LinkOpener for MockOpener {
    fn open(&self, params: &ConnectionParams) -> Result<LinkHandle> {
        params.validate()?;
        self.device.open_link(&params.port)
    }
}
