use rootclay_core::{ErrorKind, EventBus, EventCategory, EventFilter, EventSink, StreamEvent, StreamState};
use std::sync::{Arc, Mutex};

#[test]
fn test_event_json_shape() {
    let json = serde_json::to_string(&StreamEvent::Progress { percent: 42 }).unwrap();
    assert_eq!(json, r#"{"event":"progress","percent":42}"#);

    let json = serde_json::to_string(&StreamEvent::Completed).unwrap();
    assert_eq!(json, r#"{"event":"completed"}"#);

    let json = serde_json::to_string(&StreamEvent::Error {
        kind: ErrorKind::AckTimeout,
        detail: "no reply".to_string(),
    })
    .unwrap();
    assert_eq!(
        json,
        r#"{"event":"error","kind":"AckTimeout","detail":"no reply"}"#
    );
}

#[test]
fn test_event_json_parses_back() {
    let event: StreamEvent =
        serde_json::from_str(r#"{"event":"state_changed","state":"Paused"}"#).unwrap();
    assert_eq!(
        event,
        StreamEvent::StateChanged {
            state: StreamState::Paused
        }
    );
}

#[test]
fn test_terminal_events() {
    assert!(StreamEvent::Completed.is_terminal());
    assert!(StreamEvent::Stopped.is_terminal());
    assert!(!StreamEvent::Fault {
        detail: "Error: Line Checksum".to_string()
    }
    .is_terminal());
    assert_eq!(StreamEvent::Stopped.category(), EventCategory::Lifecycle);
}

#[test]
fn test_bus_as_sink_object() {
    let bus = Arc::new(EventBus::new());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = seen.clone();
    bus.subscribe(EventFilter::All, move |event| {
        seen_clone.lock().unwrap().push(event.description());
    });

    let sink: Arc<dyn EventSink> = bus.clone();
    sink.on_log("> G28");
    sink.on_completed();

    assert_eq!(
        *seen.lock().unwrap(),
        vec!["> G28".to_string(), "Stream completed".to_string()]
    );
}
