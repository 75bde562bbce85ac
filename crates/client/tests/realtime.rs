//! State-machine tests for the realtime client, driven by a scripted
//! connector instead of a real socket.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use farmline_client::ws::{
    listener, Connector, ConnectionState, RealtimeClient, RealtimeConfig, RealtimeError,
    RealtimeEvent, Transport, TransportError, TransportSignal,
};
use futures_channel::mpsc::UnboundedSender;
use serde_json::json;

const RETRY: Duration = Duration::from_millis(3000);

#[derive(Default)]
struct MockState {
    connects: Vec<String>,
    signals: Option<UnboundedSender<TransportSignal>>,
    sent: Vec<String>,
    close_requests: u32,
}

/// Connector whose transports are driven by the test: lifecycle signals are
/// injected by hand, outbound frames and close requests are recorded.
#[derive(Clone, Default)]
struct MockConnector {
    state: Arc<Mutex<MockState>>,
}

impl MockConnector {
    fn connect_count(&self) -> usize {
        self.state.lock().unwrap().connects.len()
    }

    fn last_url(&self) -> String {
        self.state.lock().unwrap().connects.last().cloned().unwrap()
    }

    fn sent(&self) -> Vec<String> {
        self.state.lock().unwrap().sent.clone()
    }

    fn close_requests(&self) -> u32 {
        self.state.lock().unwrap().close_requests
    }

    fn signal(&self, signal: TransportSignal) {
        let tx = self.state.lock().unwrap().signals.clone();
        if let Some(tx) = tx {
            let _ = tx.unbounded_send(signal);
        }
    }

    fn open(&self) {
        self.signal(TransportSignal::Opened);
    }

    fn frame(&self, text: &str) {
        self.signal(TransportSignal::Message(text.to_string()));
    }

    /// Unexpected close (link dropped by the peer or the network).
    fn drop_link(&self) {
        self.signal(TransportSignal::Closed);
    }

    fn fail(&self, detail: &str) {
        self.signal(TransportSignal::Errored(detail.to_string()));
    }
}

impl Connector for MockConnector {
    fn connect(
        &self,
        url: &str,
        signals: UnboundedSender<TransportSignal>,
    ) -> Box<dyn Transport> {
        let mut state = self.state.lock().unwrap();
        state.connects.push(url.to_string());
        state.signals = Some(signals);
        Box::new(MockTransport {
            state: self.state.clone(),
        })
    }
}

struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl Transport for MockTransport {
    fn send(&mut self, text: String) -> Result<(), TransportError> {
        self.state.lock().unwrap().sent.push(text);
        Ok(())
    }

    fn close(&mut self) {
        // A requested close is acknowledged with the close signal, like a
        // real socket completing its close handshake.
        let tx = {
            let mut state = self.state.lock().unwrap();
            state.close_requests += 1;
            state.signals.clone()
        };
        if let Some(tx) = tx {
            let _ = tx.unbounded_send(TransportSignal::Closed);
        }
    }
}

#[derive(Clone, Default)]
struct Recorder {
    events: Arc<Mutex<Vec<RealtimeEvent>>>,
}

impl Recorder {
    fn subscribe(&self, client: &RealtimeClient, event_type: &str) {
        let events = self.events.clone();
        client.on(
            event_type,
            listener(move |event| events.lock().unwrap().push(event.clone())),
        );
    }

    fn events(&self) -> Vec<RealtimeEvent> {
        self.events.lock().unwrap().clone()
    }

    fn count(&self) -> usize {
        self.events.lock().unwrap().len()
    }
}

fn client(mock: &MockConnector) -> RealtimeClient {
    RealtimeClient::with_connector(RealtimeConfig::new("wss://example/api"), mock.clone())
}

/// Let spawned signal loops run.
async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

async fn advance(duration: Duration) {
    tokio::time::advance(duration).await;
    settle().await;
}

#[tokio::test(start_paused = true)]
async fn connect_without_endpoint_fails_fast() {
    let mock = MockConnector::default();
    let client = RealtimeClient::with_connector(RealtimeConfig::default(), mock.clone());

    assert_eq!(client.connect("u1"), Err(RealtimeError::MissingEndpoint));
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(mock.connect_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn open_publishes_connected_once_with_subject() {
    let mock = MockConnector::default();
    let client = client(&mock);
    let recorder = Recorder::default();
    recorder.subscribe(&client, "connected");

    client.connect("u1").unwrap();
    assert_eq!(client.state(), ConnectionState::Connecting);
    assert_eq!(mock.last_url(), "wss://example/api/ws/u1");

    mock.open();
    settle().await;

    assert_eq!(client.state(), ConnectionState::Open);
    let events = recorder.events();
    assert_eq!(events.len(), 1);
    match &events[0] {
        RealtimeEvent::Connected { subject } => assert_eq!(subject, "u1"),
        other => panic!("expected connected event, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn wire_frames_are_routed_by_envelope_type() {
    let mock = MockConnector::default();
    let client = client(&mock);
    let recorder = Recorder::default();
    recorder.subscribe(&client, "chat_message");

    client.connect("u1").unwrap();
    mock.open();
    mock.frame(r#"{"type":"chat_message","text":"hi"}"#);
    settle().await;

    let events = recorder.events();
    assert_eq!(events.len(), 1);
    match &events[0] {
        RealtimeEvent::Wire(envelope) => {
            assert_eq!(envelope.event_type, "chat_message");
            assert_eq!(envelope.get("text"), Some(&json!("hi")));
        }
        other => panic!("expected wire event, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn malformed_frame_is_dropped_and_connection_survives() {
    let mock = MockConnector::default();
    let client = client(&mock);
    let recorder = Recorder::default();
    recorder.subscribe(&client, "chat_message");
    recorder.subscribe(&client, "error");
    recorder.subscribe(&client, "disconnected");

    client.connect("u1").unwrap();
    mock.open();
    mock.frame("definitely not json");
    settle().await;

    assert_eq!(recorder.count(), 0);
    assert_eq!(client.state(), ConnectionState::Open);

    // A later well-formed frame is still processed.
    mock.frame(r#"{"type":"chat_message","text":"still here"}"#);
    settle().await;
    assert_eq!(recorder.count(), 1);
}

#[tokio::test(start_paused = true)]
async fn transport_error_publishes_error_without_closing() {
    let mock = MockConnector::default();
    let client = client(&mock);
    let recorder = Recorder::default();
    recorder.subscribe(&client, "error");

    client.connect("u1").unwrap();
    mock.open();
    mock.fail("broken pipe");
    settle().await;

    assert_eq!(client.state(), ConnectionState::Open);
    let events = recorder.events();
    assert_eq!(events.len(), 1);
    match &events[0] {
        RealtimeEvent::Error { detail } => assert_eq!(detail, "broken pipe"),
        other => panic!("expected error event, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn unexpected_close_schedules_one_retry_after_fixed_interval() {
    let mock = MockConnector::default();
    let client = client(&mock);
    let recorder = Recorder::default();
    recorder.subscribe(&client, "disconnected");

    client.connect("u1").unwrap();
    mock.open();
    settle().await;

    mock.drop_link();
    settle().await;

    assert_eq!(recorder.count(), 1);
    assert_eq!(client.state(), ConnectionState::ReconnectScheduled { attempt: 1 });

    // Not before the interval...
    advance(RETRY - Duration::from_millis(1)).await;
    assert_eq!(mock.connect_count(), 1);

    // ...exactly one attempt after it, to the same subject.
    advance(Duration::from_millis(1)).await;
    assert_eq!(mock.connect_count(), 2);
    assert_eq!(mock.last_url(), "wss://example/api/ws/u1");
    assert_eq!(client.state(), ConnectionState::Connecting);
}

#[tokio::test(start_paused = true)]
async fn reconnect_stops_after_max_consecutive_failures() {
    let mock = MockConnector::default();
    let client = client(&mock);

    client.connect("u1").unwrap();
    settle().await;

    // Five consecutive failed sessions exhaust the budget.
    for expected_attempt in 1..=5u32 {
        mock.drop_link();
        settle().await;
        assert_eq!(
            client.state(),
            ConnectionState::ReconnectScheduled { attempt: expected_attempt }
        );
        advance(RETRY).await;
        assert_eq!(mock.connect_count(), 1 + expected_attempt as usize);
    }

    // The sixth failure exceeds the budget: no further attempt, ever.
    mock.drop_link();
    settle().await;
    assert_eq!(client.state(), ConnectionState::Disconnected);
    advance(RETRY * 10).await;
    assert_eq!(mock.connect_count(), 6);

    // A manual connect grants a fresh budget.
    client.connect("u1").unwrap();
    settle().await;
    assert_eq!(mock.connect_count(), 7);
    mock.drop_link();
    settle().await;
    assert_eq!(client.state(), ConnectionState::ReconnectScheduled { attempt: 1 });
}

#[tokio::test(start_paused = true)]
async fn successful_open_resets_attempt_counter() {
    let mock = MockConnector::default();
    let client = client(&mock);

    client.connect("u1").unwrap();
    settle().await;

    // Three failures in a row.
    for _ in 0..3 {
        mock.drop_link();
        settle().await;
        advance(RETRY).await;
    }
    assert_eq!(mock.connect_count(), 4);

    // Then an open: counter back to zero.
    mock.open();
    settle().await;
    assert_eq!(client.state(), ConnectionState::Open);

    mock.drop_link();
    settle().await;
    assert_eq!(client.state(), ConnectionState::ReconnectScheduled { attempt: 1 });
}

#[tokio::test(start_paused = true)]
async fn manual_disconnect_suppresses_reconnect() {
    let mock = MockConnector::default();
    let client = client(&mock);
    let recorder = Recorder::default();
    recorder.subscribe(&client, "disconnected");

    client.connect("u1").unwrap();
    mock.open();
    settle().await;

    client.disconnect();
    settle().await;

    // The close is still reported, but no retry is scheduled.
    assert_eq!(recorder.count(), 1);
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(mock.close_requests(), 1);
    advance(RETRY * 10).await;
    assert_eq!(mock.connect_count(), 1);

    // Idempotent.
    client.disconnect();
    assert_eq!(mock.close_requests(), 1);
}

#[tokio::test(start_paused = true)]
async fn disconnect_during_backoff_cancels_the_pending_timer() {
    let mock = MockConnector::default();
    let client = client(&mock);

    client.connect("u1").unwrap();
    mock.open();
    settle().await;
    mock.drop_link();
    settle().await;
    assert_eq!(client.state(), ConnectionState::ReconnectScheduled { attempt: 1 });

    client.disconnect();
    assert_eq!(client.state(), ConnectionState::Disconnected);

    advance(RETRY * 10).await;
    assert_eq!(mock.connect_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn connect_while_open_supersedes_cleanly() {
    let mock = MockConnector::default();
    let client = client(&mock);
    let recorder = Recorder::default();
    recorder.subscribe(&client, "connected");
    recorder.subscribe(&client, "disconnected");

    client.connect("u1").unwrap();
    mock.open();
    settle().await;

    client.connect("u2").unwrap();
    settle().await;

    // Old transport closed; its late close signal publishes nothing and
    // must not trigger the reconnect policy.
    assert_eq!(mock.close_requests(), 1);
    assert_eq!(mock.connect_count(), 2);
    assert_eq!(mock.last_url(), "wss://example/api/ws/u2");
    assert_eq!(client.state(), ConnectionState::Connecting);
    assert_eq!(recorder.count(), 1); // only the first connected

    mock.open();
    settle().await;
    let events = recorder.events();
    match events.last().unwrap() {
        RealtimeEvent::Connected { subject } => assert_eq!(subject, "u2"),
        other => panic!("expected connected event, got {other:?}"),
    }
    advance(RETRY * 10).await;
    assert_eq!(mock.connect_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn send_outside_open_state_writes_nothing() {
    let mock = MockConnector::default();
    let client = client(&mock);

    // Never connected.
    client.send_ping();
    assert!(mock.sent().is_empty());

    // Connecting, not yet open.
    client.connect("u1").unwrap();
    client.send_ping();
    settle().await;
    assert!(mock.sent().is_empty());

    // Closed again.
    mock.open();
    settle().await;
    client.disconnect();
    settle().await;
    client.send_ping();
    assert!(mock.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn send_and_convenience_wrappers_write_typed_frames() {
    let mock = MockConnector::default();
    let client = client(&mock);

    client.connect("u1").unwrap();
    mock.open();
    settle().await;

    client.join_conversation("c1");
    client.send_ping();
    client.send(&json!({"type": "typing", "conversation_id": "c1"}));

    let sent: Vec<serde_json::Value> = mock
        .sent()
        .iter()
        .map(|s| serde_json::from_str(s).unwrap())
        .collect();
    assert_eq!(
        sent,
        vec![
            json!({"type": "join_conversation", "conversation_id": "c1"}),
            json!({"type": "ping"}),
            json!({"type": "typing", "conversation_id": "c1"}),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn listeners_survive_reconnection() {
    let mock = MockConnector::default();
    let client = client(&mock);
    let recorder = Recorder::default();
    recorder.subscribe(&client, "connected");

    client.connect("u1").unwrap();
    mock.open();
    settle().await;
    mock.drop_link();
    settle().await;
    advance(RETRY).await;
    mock.open();
    settle().await;

    // Same listener fired for both opens; nothing was re-registered.
    assert_eq!(recorder.count(), 2);
}

#[tokio::test(start_paused = true)]
async fn failed_connect_attempt_reports_error_then_retries() {
    let mock = MockConnector::default();
    let client = client(&mock);
    let recorder = Recorder::default();
    recorder.subscribe(&client, "error");

    client.connect("u1").unwrap();
    settle().await;

    // Handshake failure: errored then closed, before any open.
    mock.fail("connection refused");
    mock.drop_link();
    settle().await;

    assert_eq!(recorder.count(), 1);
    assert_eq!(client.state(), ConnectionState::ReconnectScheduled { attempt: 1 });
    advance(RETRY).await;
    assert_eq!(mock.connect_count(), 2);
}
