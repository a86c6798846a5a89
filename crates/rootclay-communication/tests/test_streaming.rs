use rootclay_communication::{
    CommandSource, FaultPolicy, MockDevice, ResponseReceiver, SourceOrigin, StreamConfig,
    StreamEngine,
};
use rootclay_core::{ChannelSink, ErrorKind, StreamEvent, StreamState};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

struct Rig {
    engine: StreamEngine,
    device: MockDevice,
    responses: ResponseReceiver,
    events: UnboundedReceiver<StreamEvent>,
}

fn rig(device: MockDevice, config: StreamConfig) -> Rig {
    let (sink, events) = ChannelSink::new();
    let mut engine = StreamEngine::new(Arc::new(sink), config);
    let handle = device.open_link("/dev/ttyUSB0").unwrap();
    engine.attach_link(handle.link);
    Rig {
        engine,
        device,
        responses: handle.responses,
        events,
    }
}

impl Rig {
    fn settle(&mut self) {
        while let Ok(line) = self.responses.try_recv() {
            self.engine.handle_response(&line);
        }
    }

    fn events(&mut self) -> Vec<StreamEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }
}

fn count(events: &[StreamEvent], wanted: &StreamEvent) -> usize {
    events.iter().filter(|e| *e == wanted).count()
}

fn progress(events: &[StreamEvent]) -> Vec<u8> {
    events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::Progress { percent } => Some(*percent),
            _ => None,
        })
        .collect()
}

#[test]
fn test_comment_lines_are_skipped() {
    let mut rig = rig(MockDevice::auto_ok(), StreamConfig::default());
    rig.engine
        .start(CommandSource::from_text("G28\n;comment\nG1 X10\n"))
        .unwrap();
    rig.settle();

    assert_eq!(rig.device.writes(), vec!["G28", "G1 X10"]);
    let events = rig.events();
    assert_eq!(count(&events, &StreamEvent::Completed), 1);
    assert_eq!(rig.engine.state(), StreamState::Completed);
}

#[test]
fn test_k_commands_k_writes() {
    let mut script = String::new();
    let mut expected = Vec::new();
    for i in 0..57 {
        let command = format!("G1 X{} Y{}", i, i * 2);
        script.push_str(&format!("{} ; move {}\n", command, i));
        if i % 5 == 0 {
            script.push_str("\n; layer change\n");
        }
        expected.push(command);
    }

    let mut rig = rig(MockDevice::auto_ok(), StreamConfig::default());
    rig.engine.start(CommandSource::from_text(script)).unwrap();
    rig.settle();

    assert_eq!(rig.device.writes(), expected);
    let events = rig.events();
    assert_eq!(count(&events, &StreamEvent::Completed), 1);

    let reported = progress(&events);
    assert!(reported.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(reported.last(), Some(&100));
    assert_eq!(reported.iter().filter(|p| **p == 100).count(), 1);
}

#[test]
fn test_comment_only_source_completes_without_writes() {
    let mut rig = rig(MockDevice::auto_ok(), StreamConfig::default());
    rig.engine
        .start(CommandSource::from_text("; header\n\n   \n;; end\n"))
        .unwrap();

    assert!(rig.device.writes().is_empty());
    assert_eq!(rig.engine.state(), StreamState::Completed);
    let events = rig.events();
    assert_eq!(count(&events, &StreamEvent::Completed), 1);
    assert_eq!(progress(&events).last(), Some(&100));
}

#[test]
fn test_stop_twice_stops_once() {
    let mut rig = rig(MockDevice::new(), StreamConfig::default());
    rig.engine.start(CommandSource::from_text("G28\nM84")).unwrap();

    assert!(rig.engine.stop());
    assert!(!rig.engine.stop());
    assert_eq!(rig.engine.state(), StreamState::Stopped);

    let events = rig.events();
    assert_eq!(count(&events, &StreamEvent::Stopped), 1);
    assert_eq!(
        count(
            &events,
            &StreamEvent::StateChanged {
                state: StreamState::Stopped
            }
        ),
        1
    );
}

#[test]
fn test_pause_then_resume_does_not_resend() {
    let mut rig = rig(MockDevice::new(), StreamConfig::default());
    rig.engine
        .start(CommandSource::from_text("G28\nG1 Z5\nM84"))
        .unwrap();
    assert_eq!(rig.device.writes(), vec!["G28"]);

    rig.engine.pause().unwrap();
    rig.engine.resume().unwrap();
    assert_eq!(rig.device.writes(), vec!["G28"]);

    rig.engine.handle_response("ok");
    assert_eq!(rig.device.writes(), vec!["G28", "G1 Z5"]);
}

#[test]
fn test_ack_while_paused_waits_for_resume() {
    let mut rig = rig(MockDevice::new(), StreamConfig::default());
    rig.engine
        .start(CommandSource::from_text("G28\nG1 Z5"))
        .unwrap();

    rig.engine.pause().unwrap();
    rig.engine.handle_response("ok");
    assert_eq!(rig.device.writes(), vec!["G28"]);
    assert_eq!(rig.engine.snapshot().current_index, 1);

    // nothing in flight, so this one is ignored
    rig.engine.handle_response("ok");
    assert_eq!(rig.engine.snapshot().current_index, 1);

    rig.engine.resume().unwrap();
    assert_eq!(rig.device.writes(), vec!["G28", "G1 Z5"]);
}

#[test]
fn test_checksum_fault_continues() {
    let device = MockDevice::new();
    let mut rig = rig(device.clone(), StreamConfig::default());
    rig.engine
        .start(CommandSource::from_text("G1 X1\nG1 X2\nG1 X3"))
        .unwrap();

    rig.engine.handle_response("ok");
    rig.engine.handle_response("Error: Line Checksum");
    assert_eq!(rig.device.writes(), vec!["G1 X1", "G1 X2"]);
    assert_eq!(rig.engine.state(), StreamState::Streaming);

    rig.engine.handle_response("ok");
    rig.engine.handle_response("ok");
    assert_eq!(rig.device.writes(), vec!["G1 X1", "G1 X2", "G1 X3"]);
    assert_eq!(rig.engine.state(), StreamState::Completed);

    let events = rig.events();
    assert_eq!(
        count(
            &events,
            &StreamEvent::Fault {
                detail: "Error: Line Checksum".to_string()
            }
        ),
        1
    );
    assert_eq!(count(&events, &StreamEvent::Completed), 1);
}

#[test]
fn test_halt_policy_fails_session() {
    let config = StreamConfig {
        fault_policy: FaultPolicy::Halt,
        ..Default::default()
    };
    let mut rig = rig(MockDevice::new(), config);
    rig.engine
        .start(CommandSource::from_text("G1 X1\nG1 X2"))
        .unwrap();

    rig.engine.handle_response("Error: Printer halted. kill() called!");
    assert_eq!(rig.engine.state(), StreamState::Failed);

    rig.engine.handle_response("ok");
    assert_eq!(rig.device.writes(), vec!["G1 X1"]);

    let events = rig.events();
    let errors: Vec<_> = events
        .iter()
        .filter(|e| matches!(e, StreamEvent::Error { .. }))
        .collect();
    assert_eq!(errors.len(), 1);
    assert!(matches!(
        errors[0],
        StreamEvent::Error {
            kind: ErrorKind::DeviceFault,
            ..
        }
    ));
    assert!(!events.contains(&StreamEvent::Completed));
}

#[test]
fn test_ack_timeout_fails_session() {
    let config = StreamConfig {
        ack_timeout: Some(Duration::from_secs(5)),
        ..Default::default()
    };
    let mut rig = rig(MockDevice::new(), config);
    rig.engine.start(CommandSource::from_text("G28")).unwrap();

    let deadline = rig.engine.ack_deadline().unwrap();
    assert!(!rig.engine.check_ack_timeout(deadline - Duration::from_millis(1)));
    assert!(rig.engine.check_ack_timeout(deadline));
    assert_eq!(rig.engine.state(), StreamState::Failed);
    assert_eq!(rig.engine.ack_deadline(), None);

    let events = rig.events();
    assert!(events.iter().any(|e| matches!(
        e,
        StreamEvent::Error {
            kind: ErrorKind::AckTimeout,
            ..
        }
    )));
}

#[test]
fn test_any_response_rearms_ack_timer() {
    let config = StreamConfig {
        ack_timeout: Some(Duration::from_secs(5)),
        ..Default::default()
    };
    let mut rig = rig(MockDevice::new(), config);
    rig.engine.start(CommandSource::from_text("M109 S60")).unwrap();

    let first = rig.engine.ack_deadline().unwrap();
    std::thread::sleep(Duration::from_millis(5));
    rig.engine.handle_response("T:40.1 /60.0");
    let rearmed = rig.engine.ack_deadline().unwrap();
    assert!(rearmed > first);
}

#[test]
fn test_disabled_ack_timeout() {
    let config = StreamConfig {
        ack_timeout: None,
        ..Default::default()
    };
    let mut rig = rig(MockDevice::new(), config);
    rig.engine.start(CommandSource::from_text("G28")).unwrap();
    assert_eq!(rig.engine.ack_deadline(), None);
}

#[test]
fn test_late_ok_after_stop_is_ignored() {
    let mut rig = rig(MockDevice::new(), StreamConfig::default());
    rig.engine
        .start(CommandSource::from_text("G28\nG1 X10"))
        .unwrap();
    rig.engine.stop();
    rig.events();

    rig.engine.handle_response("ok");
    assert_eq!(rig.device.writes(), vec!["G28"]);
    assert_eq!(rig.engine.state(), StreamState::Stopped);
    assert!(rig.events().iter().all(|e| !e.is_terminal()));
}

#[test]
fn test_start_while_active_is_rejected() {
    let mut rig = rig(MockDevice::new(), StreamConfig::default());
    rig.engine.start(CommandSource::from_text("G28")).unwrap();

    let err = rig
        .engine
        .start(CommandSource::from_text("M84"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert_eq!(rig.device.writes(), vec!["G28"]);

    rig.engine.pause().unwrap();
    let err = rig
        .engine
        .start(CommandSource::from_text("M84"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
}

#[test]
fn test_restart_after_completion() {
    let mut rig = rig(MockDevice::auto_ok(), StreamConfig::default());
    rig.engine.start(CommandSource::from_text("G28")).unwrap();
    rig.settle();
    rig.engine.start(CommandSource::from_text("M84")).unwrap();
    rig.settle();

    assert_eq!(rig.device.writes(), vec!["G28", "M84"]);
    assert_eq!(count(&rig.events(), &StreamEvent::Completed), 2);
}

#[test]
fn test_send_immediate() {
    let mut rig = rig(MockDevice::new(), StreamConfig::default());
    rig.engine.send_immediate("  G28 ; home ").unwrap();
    assert_eq!(rig.device.writes(), vec!["G28"]);
    assert!(rig.events().contains(&StreamEvent::log("> G28")));

    let err = rig.engine.send_immediate("; nothing").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    rig.engine.start(CommandSource::from_text("M84")).unwrap();
    let err = rig.engine.send_immediate("G28").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert_eq!(rig.device.writes(), vec!["G28", "M84"]);
}

#[test]
fn test_ok_for_manual_command_is_logged() {
    let mut rig = rig(MockDevice::auto_ok(), StreamConfig::default());
    rig.engine.send_immediate("M84").unwrap();
    rig.settle();

    let events = rig.events();
    assert_eq!(events, vec![StreamEvent::log("> M84"), StreamEvent::log("ok")]);
}

#[test]
fn test_file_source_streams() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, ";FLAVOR:Marlin").unwrap();
    writeln!(file, "G28").unwrap();
    writeln!(file, "G1 E10 F300 ; prime").unwrap();
    writeln!(file, "M84").unwrap();

    let source = CommandSource::open(SourceOrigin::File(file.path().to_path_buf())).unwrap();
    assert_eq!(source.total_lines(), 4);

    let mut rig = rig(MockDevice::auto_ok(), StreamConfig::default());
    rig.engine.start(source).unwrap();
    rig.settle();

    assert_eq!(rig.device.writes(), vec!["G28", "G1 E10 F300", "M84"]);
    assert_eq!(rig.engine.state(), StreamState::Completed);
}

#[test]
fn test_connection_lost_fails_session() {
    let device = MockDevice::new();
    let mut rig = rig(device.clone(), StreamConfig::default());
    rig.engine.start(CommandSource::from_text("G28\nM84")).unwrap();

    rig.engine.connection_lost("device vanished");
    assert_eq!(rig.engine.state(), StreamState::Failed);
    assert!(!rig.engine.is_connected());
    assert!(rig.events().iter().any(|e| matches!(
        e,
        StreamEvent::Error {
            kind: ErrorKind::ConnectionLost,
            ..
        }
    )));
}
