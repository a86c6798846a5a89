//! Printer controller
//!
//! [`PrinterController`] is the control surface front ends talk to. It owns
//! a [`StreamEngine`] inside a single tokio task and serializes every input
//! through that task's loop:
//! - control requests, each answered over a oneshot channel
//! - response lines from the open link
//! - the acknowledgment deadline
//! - the wake-up nudge deadline
//!
//! Blocking work (opening a port, counting the lines of a file) runs on the
//! blocking pool so the loop itself never stalls on I/O it does not own.

use crate::communication::{ConnectionParams, LinkOpener, ResponseReceiver};
use crate::streaming::engine::{StreamConfig, StreamEngine};
use crate::streaming::source::{CommandSource, SourceOrigin};
use parking_lot::RwLock;
use rootclay_core::{
    ConnectionError, Error, EventSinkHandle, Result, StreamError, StreamSnapshot,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Default delay before the wake-up newline after connecting
pub const DEFAULT_WAKE_DELAY: Duration = Duration::from_secs(1);

/// Controller configuration
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Streaming behavior
    pub stream: StreamConfig,
    /// Template for [`PrinterController::connect`]; port and baud are overridden
    pub connection: ConnectionParams,
    /// Delay before a bare newline is written to wake the device; `None` disables it
    pub wake_delay: Option<Duration>,
    /// Capacity of the control request queue
    pub request_queue: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            stream: StreamConfig::default(),
            connection: ConnectionParams::default(),
            wake_delay: Some(DEFAULT_WAKE_DELAY),
            request_queue: 32,
        }
    }
}

enum ControlRequest {
    Connect {
        params: ConnectionParams,
        reply: oneshot::Sender<Result<()>>,
    },
    Disconnect {
        reply: oneshot::Sender<bool>,
    },
    SendImmediate {
        command: String,
        reply: oneshot::Sender<Result<()>>,
    },
    StartStream {
        origin: SourceOrigin,
        reply: oneshot::Sender<Result<()>>,
    },
    Pause {
        reply: oneshot::Sender<Result<()>>,
    },
    Resume {
        reply: oneshot::Sender<Result<()>>,
    },
    Stop {
        reply: oneshot::Sender<bool>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to the controller task
pub struct PrinterController {
    command_tx: mpsc::Sender<ControlRequest>,
    connection: ConnectionParams,
    snapshot: Arc<RwLock<StreamSnapshot>>,
    task: Option<JoinHandle<()>>,
}

impl PrinterController {
    /// Spawn the controller task on the current tokio runtime
    pub fn spawn(
        opener: Arc<dyn LinkOpener>,
        sink: EventSinkHandle,
        config: ControllerConfig,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::channel(config.request_queue.max(1));
        let snapshot = Arc::new(RwLock::new(StreamSnapshot::default()));
        let connection = config.connection.clone();

        let control = ControlLoop {
            engine: StreamEngine::new(sink.clone(), config.stream.clone()),
            sink,
            opener,
            responses: None,
            wake_at: None,
            config,
            snapshot: snapshot.clone(),
        };
        let task = tokio::spawn(control.run(command_rx));

        Self {
            command_tx,
            connection,
            snapshot,
            task: Some(task),
        }
    }

    /// Open `port` at `baud_rate` using the configured connection template
    pub async fn connect(&self, port: &str, baud_rate: u32) -> Result<()> {
        let params = ConnectionParams {
            port: port.to_string(),
            baud_rate,
            ..self.connection.clone()
        };
        self.connect_with(params).await
    }

    /// Open a link with explicit parameters, closing any current one first
    pub async fn connect_with(&self, params: ConnectionParams) -> Result<()> {
        self.request(|reply| ControlRequest::Connect { params, reply })
            .await?
    }

    /// Stop any session and close the link
    ///
    /// Returns false when nothing was connected.
    pub async fn disconnect(&self) -> Result<bool> {
        self.request(|reply| ControlRequest::Disconnect { reply })
            .await
    }

    /// Write one manual command; rejected while a stream is active
    pub async fn send_immediate(&self, command: impl Into<String>) -> Result<()> {
        let command = command.into();
        self.request(|reply| ControlRequest::SendImmediate { command, reply })
            .await?
    }

    /// Start streaming a source
    pub async fn start_stream(&self, origin: SourceOrigin) -> Result<()> {
        self.request(|reply| ControlRequest::StartStream { origin, reply })
            .await?
    }

    /// Pause the active stream
    pub async fn pause_stream(&self) -> Result<()> {
        self.request(|reply| ControlRequest::Pause { reply }).await?
    }

    /// Resume a paused stream
    pub async fn resume_stream(&self) -> Result<()> {
        self.request(|reply| ControlRequest::Resume { reply }).await?
    }

    /// Stop the active stream
    ///
    /// Returns false when no stream was active.
    pub async fn stop_stream(&self) -> Result<bool> {
        self.request(|reply| ControlRequest::Stop { reply }).await
    }

    /// Latest published engine state
    pub fn snapshot(&self) -> StreamSnapshot {
        self.snapshot.read().clone()
    }

    /// Disconnect and wait for the task to exit
    pub async fn shutdown(mut self) -> Result<()> {
        self.request(|reply| ControlRequest::Shutdown { reply })
            .await?;
        if let Some(task) = self.task.take() {
            task.await
                .map_err(|e| Error::other(format!("controller task failed: {}", e)))?;
        }
        Ok(())
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> ControlRequest,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.command_tx.send(make(tx)).await.map_err(|_| stopped())?;
        rx.await.map_err(|_| stopped())
    }
}

impl Drop for PrinterController {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

fn stopped() -> Error {
    Error::other("controller task is not running")
}

struct ControlLoop {
    engine: StreamEngine,
    sink: EventSinkHandle,
    opener: Arc<dyn LinkOpener>,
    responses: Option<ResponseReceiver>,
    wake_at: Option<Instant>,
    config: ControllerConfig,
    snapshot: Arc<RwLock<StreamSnapshot>>,
}

impl ControlLoop {
    async fn run(mut self, mut requests: mpsc::Receiver<ControlRequest>) {
        tracing::debug!("Controller task started");

        loop {
            let ack_deadline = self.engine.ack_deadline();
            let wake_at = self.wake_at;

            tokio::select! {
                request = requests.recv() => match request {
                    Some(ControlRequest::Shutdown { reply }) => {
                        self.close_link();
                        self.publish();
                        let _ = reply.send(());
                        break;
                    }
                    Some(request) => self.handle(request).await,
                    None => {
                        self.close_link();
                        break;
                    }
                },
                line = recv_line(&mut self.responses) => match line {
                    Some(line) => self.engine.handle_response(&line),
                    None => {
                        self.responses = None;
                        self.wake_at = None;
                        self.engine.connection_lost("response channel closed");
                    }
                },
                _ = sleep_until_opt(ack_deadline) => {
                    self.engine.check_ack_timeout(Instant::now());
                }
                _ = sleep_until_opt(wake_at) => {
                    self.wake_at = None;
                    if let Err(e) = self.engine.nudge() {
                        tracing::warn!("Wake-up write failed: {}", e);
                    }
                }
            }

            self.publish();
        }

        tracing::debug!("Controller task exiting");
    }

    async fn handle(&mut self, request: ControlRequest) {
        match request {
            ControlRequest::Connect { params, reply } => {
                let result = self.connect(params).await;
                self.respond(reply, result);
            }
            ControlRequest::Disconnect { reply } => {
                let was_connected = self.close_link();
                if was_connected {
                    self.sink.on_log("Disconnected");
                }
                self.respond(reply, was_connected);
            }
            ControlRequest::SendImmediate { command, reply } => {
                let result = self.engine.send_immediate(&command);
                self.respond(reply, result);
            }
            ControlRequest::StartStream { origin, reply } => {
                let result = self.start_stream(origin).await;
                self.respond(reply, result);
            }
            ControlRequest::Pause { reply } => {
                let result = self.engine.pause();
                self.respond(reply, result);
            }
            ControlRequest::Resume { reply } => {
                let result = self.engine.resume();
                self.respond(reply, result);
            }
            ControlRequest::Stop { reply } => {
                let stopped = self.engine.stop();
                self.respond(reply, stopped);
            }
            ControlRequest::Shutdown { reply } => {
                self.close_link();
                self.respond(reply, ());
            }
        }
    }

    async fn connect(&mut self, params: ConnectionParams) -> Result<()> {
        params.validate()?;
        self.close_link();

        let opener = self.opener.clone();
        let port = params.port.clone();
        let baud_rate = params.baud_rate;
        let handle = tokio::task::spawn_blocking(move || opener.open(&params))
            .await
            .map_err(|e| Error::other(format!("port open task failed: {}", e)))?
            .inspect_err(|e| tracing::warn!("Connect to {} failed: {}", port, e))?;

        self.engine.attach_link(handle.link);
        self.responses = Some(handle.responses);
        self.wake_at = self.config.wake_delay.map(|delay| Instant::now() + delay);

        tracing::info!("Connected to {} at {} baud", port, baud_rate);
        self.sink
            .on_log(&format!("Connected to {} at {} baud", port, baud_rate));
        Ok(())
    }

    async fn start_stream(&mut self, origin: SourceOrigin) -> Result<()> {
        let state = self.engine.state();
        if state.is_active() {
            return Err(StreamError::SessionActive {
                state: state.to_string(),
            }
            .into());
        }
        if !self.engine.is_connected() {
            return Err(ConnectionError::NotConnected.into());
        }

        self.sink.on_log(&format!("Analyzing {}", origin));
        let source = tokio::task::spawn_blocking(move || CommandSource::open(origin))
            .await
            .map_err(|e| Error::other(format!("source open task failed: {}", e)))??;

        self.wake_at = None;
        self.engine.start(source)
    }

    /// Close the link and forget its response channel
    fn close_link(&mut self) -> bool {
        self.responses = None;
        self.wake_at = None;
        self.engine.detach_link()
    }

    fn publish(&self) {
        *self.snapshot.write() = self.engine.snapshot();
    }

    fn respond<T>(&self, reply: oneshot::Sender<T>, value: T) {
        self.publish();
        if reply.send(value).is_err() {
            tracing::trace!("Caller dropped before the reply");
        }
    }
}

async fn recv_line(responses: &mut Option<ResponseReceiver>) -> Option<String> {
    match responses {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
