//! Ping-pong streaming engine
//!
//! The engine paces a [`CommandSource`] over a [`DeviceLink`] with one rule:
//! at most one command is outstanding. The first command is written as soon
//! as a session starts; every later command is written only after the device
//! acknowledges the one before it.
//!
//! The engine is a synchronous state machine. It never reads the link
//! itself; the owner feeds it response lines through
//! [`StreamEngine::handle_response`] and timer expiries through
//! [`StreamEngine::check_ack_timeout`].

use crate::communication::DeviceLink;
use crate::firmware::response_parser::{AckMatch, DeviceResponse, ResponseParser};
use crate::streaming::sanitizer::{sanitize, SanitizedLine};
use crate::streaming::source::CommandSource;
use rootclay_core::{
    progress_percent, ConnectionError, Error, EventSink, EventSinkHandle, Result, StreamError,
    StreamEvent, StreamSnapshot, StreamState,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

/// Default time to wait for an acknowledgment
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(60);
/// Default number of line advances between progress reports
pub const DEFAULT_PROGRESS_INTERVAL: usize = 10;

/// What a device fault does to the running session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultPolicy {
    /// Report the fault and keep waiting for the next acknowledgment
    #[default]
    Continue,
    /// Report the fault and fail the session
    Halt,
}

/// Streaming behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    /// How acknowledgments are recognized
    pub ack_match: AckMatch,
    /// Reaction to device faults
    pub fault_policy: FaultPolicy,
    /// Time allowed between device responses while a command is in flight
    pub ack_timeout: Option<Duration>,
    /// Line advances between progress reports
    pub progress_interval: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            ack_match: AckMatch::default(),
            fault_policy: FaultPolicy::default(),
            ack_timeout: Some(DEFAULT_ACK_TIMEOUT),
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

#[derive(Debug)]
struct InFlight {
    command: String,
    last_activity: Instant,
}

#[derive(Debug, Clone, Copy, Default)]
struct SessionStats {
    total_lines: usize,
    current_index: usize,
    percent: u8,
}

#[derive(Debug)]
struct StreamSession {
    source: CommandSource,
    stats: SessionStats,
    in_flight: Option<InFlight>,
    lines_since_report: usize,
    writes: usize,
}

enum PumpOutcome {
    AwaitingAck,
    Exhausted,
    Failed(Error),
}

impl StreamSession {
    fn new(source: CommandSource) -> Self {
        Self {
            stats: SessionStats {
                total_lines: source.total_lines(),
                ..Default::default()
            },
            source,
            in_flight: None,
            lines_since_report: 0,
            writes: 0,
        }
    }

    /// Count one evaluated line and report progress on every interval
    fn advance(&mut self, sink: &dyn EventSink, interval: usize) {
        self.stats.current_index += 1;
        self.lines_since_report += 1;

        if self.lines_since_report >= interval.max(1) {
            self.lines_since_report = 0;
            let percent = progress_percent(self.stats.current_index, self.stats.total_lines)
                .min(99)
                .max(self.stats.percent);
            self.stats.percent = percent;
            sink.on_progress(percent);
        }
    }

    /// Write the next eligible command, skipping blank and comment lines
    fn transmit_next(
        &mut self,
        link: &mut dyn DeviceLink,
        sink: &dyn EventSink,
        interval: usize,
    ) -> PumpOutcome {
        loop {
            let raw = match self.source.next_line() {
                Ok(Some(raw)) => raw,
                Ok(None) => return PumpOutcome::Exhausted,
                Err(e) => return PumpOutcome::Failed(e),
            };

            let command = match sanitize(&raw) {
                SanitizedLine::Skip => {
                    self.advance(sink, interval);
                    continue;
                }
                SanitizedLine::Command(command) => command,
            };

            tracing::debug!("-> {}", command);
            if let Err(e) = link.write_line(command) {
                return PumpOutcome::Failed(e);
            }
            self.writes += 1;
            self.in_flight = Some(InFlight {
                command: command.to_string(),
                last_activity: Instant::now(),
            });
            return PumpOutcome::AwaitingAck;
        }
    }
}

enum Phase {
    Idle,
    Streaming(StreamSession),
    Paused(StreamSession),
    Completed,
    Stopped,
    Failed,
}

impl Phase {
    fn state(&self) -> StreamState {
        match self {
            Phase::Idle => StreamState::Idle,
            Phase::Streaming(_) => StreamState::Streaming,
            Phase::Paused(_) => StreamState::Paused,
            Phase::Completed => StreamState::Completed,
            Phase::Stopped => StreamState::Stopped,
            Phase::Failed => StreamState::Failed,
        }
    }

    fn session(&self) -> Option<&StreamSession> {
        match self {
            Phase::Streaming(session) | Phase::Paused(session) => Some(session),
            _ => None,
        }
    }

    fn session_mut(&mut self) -> Option<&mut StreamSession> {
        match self {
            Phase::Streaming(session) | Phase::Paused(session) => Some(session),
            _ => None,
        }
    }
}

/// Flow-control state machine for one device link
pub struct StreamEngine {
    link: Option<Box<dyn DeviceLink>>,
    sink: EventSinkHandle,
    parser: ResponseParser,
    config: StreamConfig,
    phase: Phase,
    last_stats: SessionStats,
}

impl StreamEngine {
    /// Create an engine with no link attached
    pub fn new(sink: EventSinkHandle, config: StreamConfig) -> Self {
        Self {
            link: None,
            sink,
            parser: ResponseParser::new(config.ack_match),
            config,
            phase: Phase::Idle,
            last_stats: SessionStats::default(),
        }
    }

    /// Streaming configuration
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Attach a link, detaching any previous one
    pub fn attach_link(&mut self, link: Box<dyn DeviceLink>) {
        self.detach_link();
        tracing::info!("Attached link {}", link.port_name());
        self.link = Some(link);
    }

    /// Stop any session and close the link
    ///
    /// Returns false when no link was attached.
    pub fn detach_link(&mut self) -> bool {
        self.stop();
        match self.link.take() {
            Some(mut link) => {
                if let Err(e) = link.close() {
                    tracing::warn!("Closing {} failed: {}", link.port_name(), e);
                }
                tracing::info!("Detached link {}", link.port_name());
                true
            }
            None => false,
        }
    }

    /// Whether a link is attached
    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    /// Port name of the attached link
    pub fn port_name(&self) -> Option<&str> {
        self.link.as_ref().map(|link| link.port_name())
    }

    /// Current public state
    pub fn state(&self) -> StreamState {
        self.phase.state()
    }

    /// Point-in-time view for observers
    pub fn snapshot(&self) -> StreamSnapshot {
        let session = self.phase.session();
        let stats = session.map_or(self.last_stats, |s| s.stats);
        StreamSnapshot {
            state: self.state(),
            port: self.port_name().map(str::to_string),
            total_lines: stats.total_lines,
            current_index: stats.current_index,
            percent: stats.percent,
            in_flight: session
                .and_then(|s| s.in_flight.as_ref())
                .map(|f| f.command.clone()),
        }
    }

    /// Begin streaming `source`, writing its first command immediately
    ///
    /// Fails without touching the device when a session is already active or
    /// no link is attached. A write failure after the session began is
    /// reported through the sink and leaves the engine `Failed`.
    pub fn start(&mut self, source: CommandSource) -> Result<()> {
        let state = self.state();
        if state.is_active() {
            return Err(StreamError::SessionActive {
                state: state.to_string(),
            }
            .into());
        }
        if self.link.is_none() {
            return Err(ConnectionError::NotConnected.into());
        }

        tracing::info!(
            "Streaming {} ({} lines)",
            source.origin(),
            source.total_lines()
        );
        self.sink.on_log(&format!(
            "Streaming {} ({} lines)",
            source.origin(),
            source.total_lines()
        ));

        self.phase = Phase::Streaming(StreamSession::new(source));
        self.sink.emit(StreamEvent::StateChanged {
            state: StreamState::Streaming,
        });
        self.pump();
        Ok(())
    }

    /// Suspend transmission; the in-flight command is still awaited
    pub fn pause(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Streaming(session) => {
                self.phase = Phase::Paused(session);
                tracing::info!("Stream paused");
                self.sink.on_log("Stream paused");
                self.sink.emit(StreamEvent::StateChanged {
                    state: StreamState::Paused,
                });
                Ok(())
            }
            phase @ Phase::Paused(_) => {
                self.phase = phase;
                Ok(())
            }
            phase => {
                let current = phase.state();
                self.phase = phase;
                Err(invalid_transition(current, "pause"))
            }
        }
    }

    /// Continue a paused session
    ///
    /// Nothing is written while the command sent before the pause is still
    /// unacknowledged; its acknowledgment releases the next one.
    pub fn resume(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Paused(session) => {
                self.phase = Phase::Streaming(session);
                tracing::info!("Stream resumed");
                self.sink.on_log("Stream resumed");
                self.sink.emit(StreamEvent::StateChanged {
                    state: StreamState::Streaming,
                });
                self.pump();
                Ok(())
            }
            phase @ Phase::Streaming(_) => {
                self.phase = phase;
                Ok(())
            }
            phase => {
                let current = phase.state();
                self.phase = phase;
                Err(invalid_transition(current, "resume"))
            }
        }
    }

    /// Abandon the active session
    ///
    /// Returns true if a session was stopped; calling it again is a no-op.
    pub fn stop(&mut self) -> bool {
        let Some(mut session) = self.close_session(Phase::Stopped) else {
            return false;
        };
        session.source.close();

        tracing::info!(
            "Stream stopped at line {} of {}",
            session.stats.current_index,
            session.stats.total_lines
        );
        self.sink.emit(StreamEvent::StateChanged {
            state: StreamState::Stopped,
        });
        self.sink.on_log("Stream stopped");
        self.sink.emit(StreamEvent::Stopped);
        true
    }

    /// Write one manual command outside of a session
    pub fn send_immediate(&mut self, command: &str) -> Result<()> {
        let state = self.state();
        if state.is_active() {
            return Err(StreamError::SessionActive {
                state: state.to_string(),
            }
            .into());
        }

        let SanitizedLine::Command(command) = sanitize(command) else {
            return Err(StreamError::InvalidCommand {
                reason: "command is blank or only a comment".to_string(),
            }
            .into());
        };

        let link = self.link.as_mut().ok_or(ConnectionError::NotConnected)?;
        self.sink.on_log(&format!("> {}", command));
        tracing::debug!("-> {} (manual)", command);
        link.write_line(command)
    }

    /// Write a bare newline to wake the device if no session is running
    pub fn nudge(&mut self) -> Result<()> {
        if self.state().is_active() {
            return Ok(());
        }
        let link = self.link.as_mut().ok_or(ConnectionError::NotConnected)?;
        tracing::debug!("Waking {}", link.port_name());
        link.write(b"\n")
    }

    /// Feed one response line from the device
    pub fn handle_response(&mut self, line: &str) {
        let now = Instant::now();
        if let Some(in_flight) = self
            .phase
            .session_mut()
            .and_then(|s| s.in_flight.as_mut())
        {
            in_flight.last_activity = now;
        }

        let Some(response) = self.parser.parse(line) else {
            return;
        };
        tracing::debug!("<- {}", response.text());

        match response {
            DeviceResponse::Ack(text) => self.on_ack(&text),
            DeviceResponse::Fault(text) => self.on_fault(text),
            DeviceResponse::Info(text) => self.sink.on_log(&text),
        }
    }

    fn on_ack(&mut self, text: &str) {
        let interval = self.config.progress_interval;
        let Some(session) = self.phase.session_mut() else {
            self.sink.on_log(text);
            return;
        };
        let Some(acked) = session.in_flight.take() else {
            tracing::debug!("Ignoring acknowledgment with nothing in flight: {}", text);
            return;
        };

        tracing::trace!("Acknowledged {}", acked.command);
        session.advance(self.sink.as_ref(), interval);

        if matches!(self.phase, Phase::Streaming(_)) {
            self.pump();
        }
    }

    fn on_fault(&mut self, text: String) {
        tracing::warn!("Device fault: {}", text);
        self.sink.on_fault(&text);

        if self.state().is_active() && self.config.fault_policy == FaultPolicy::Halt {
            self.fail(StreamError::DeviceFault { detail: text }.into());
        }
    }

    /// Deadline of the acknowledgment timer, if one is armed
    pub fn ack_deadline(&self) -> Option<Instant> {
        let timeout = self.config.ack_timeout?;
        let in_flight = self.phase.session()?.in_flight.as_ref()?;
        Some(in_flight.last_activity + timeout)
    }

    /// Fail the session if the acknowledgment timer expired by `now`
    pub fn check_ack_timeout(&mut self, now: Instant) -> bool {
        let Some(deadline) = self.ack_deadline() else {
            return false;
        };
        if now < deadline {
            return false;
        }

        let command = self
            .phase
            .session()
            .and_then(|s| s.in_flight.as_ref())
            .map(|f| f.command.clone())
            .unwrap_or_default();
        let timeout_ms = self
            .config
            .ack_timeout
            .map_or(0, |t| t.as_millis() as u64);
        self.fail(
            StreamError::AckTimeout {
                command,
                timeout_ms,
            }
            .into(),
        );
        true
    }

    /// The response channel closed underneath an attached link
    pub fn connection_lost(&mut self, reason: &str) {
        tracing::error!("Connection lost: {}", reason);
        let err: Error = ConnectionError::ConnectionLost {
            reason: reason.to_string(),
        }
        .into();

        if self.state().is_active() {
            self.fail(err);
        } else {
            self.sink.on_error(err.kind(), &err.to_string());
        }

        if let Some(mut link) = self.link.take() {
            let _ = link.close();
        }
    }

    fn pump(&mut self) {
        let interval = self.config.progress_interval;
        let outcome = {
            let Phase::Streaming(session) = &mut self.phase else {
                return;
            };
            if session.in_flight.is_some() {
                return;
            }
            let Some(link) = self.link.as_mut() else {
                return self.fail(ConnectionError::NotConnected.into());
            };
            session.transmit_next(&mut **link, self.sink.as_ref(), interval)
        };

        match outcome {
            PumpOutcome::AwaitingAck => {}
            PumpOutcome::Exhausted => self.complete(),
            PumpOutcome::Failed(e) => self.fail(e),
        }
    }

    fn complete(&mut self) {
        let Some(mut session) = self.close_session(Phase::Completed) else {
            return;
        };
        session.source.close();
        self.last_stats.percent = 100;

        tracing::info!(
            "Stream completed: {} lines, {} commands",
            session.stats.total_lines,
            session.writes
        );
        self.sink.on_progress(100);
        self.sink.on_log(&format!(
            "Stream completed ({} commands sent)",
            session.writes
        ));
        self.sink.emit(StreamEvent::StateChanged {
            state: StreamState::Completed,
        });
        self.sink.on_completed();
    }

    fn fail(&mut self, err: Error) {
        let Some(mut session) = self.close_session(Phase::Failed) else {
            return;
        };
        session.source.close();

        tracing::error!(
            "Stream failed at line {} of {}: {}",
            session.stats.current_index,
            session.stats.total_lines,
            err
        );
        self.sink.emit(StreamEvent::StateChanged {
            state: StreamState::Failed,
        });
        self.sink.on_error(err.kind(), &err.to_string());
    }

    /// Move to a terminal phase, handing back the session if one was active
    fn close_session(&mut self, terminal: Phase) -> Option<StreamSession> {
        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Streaming(session) | Phase::Paused(session) => {
                self.last_stats = session.stats;
                self.phase = terminal;
                Some(session)
            }
            phase => {
                self.phase = phase;
                None
            }
        }
    }
}

impl std::fmt::Debug for StreamEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamEngine")
            .field("state", &self.state())
            .field("port", &self.port_name())
            .field("config", &self.config)
            .finish()
    }
}

fn invalid_transition(current: StreamState, requested: &str) -> Error {
    StreamError::InvalidTransition {
        current: current.to_string(),
        requested: requested.to_string(),
    }
    .into()
}
