use crate::helpers::{FakeConnector, WAIT, next_message, test_bridge};

use bridge_core::error::{BridgeError, TransportError};
use bridge_core::hub::{BridgeMessage, DiagnosticKind, EventHub};
use bridge_core::transport::TransportChannel;

use models::{CommandType, CorrelationId, OutboundRequest};

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::spawn as TokioSpawn;
use tokio::time::{sleep, timeout};

/// **VALUE**: Verifies that the connection is reused while alive and replaced after the
/// companion goes away.
///
/// **WHY THIS MATTERS**: The browser tears the native host down whenever it likes. The
/// next command must transparently bring it back, exactly once.
///
/// **BUG THIS CATCHES**: Would catch reconnecting on every send, or never noticing a dead
/// connection and failing every later send.
#[tokio::test]
async fn given_companion_closes_when_ensuring_again_then_new_generation() {
    // GIVEN: A bridge connected once
    let (connector, companions) = FakeConnector::new();
    let bridge = test_bridge(connector.clone());
    let first = bridge.ensure_connection().await.expect("connect");
    let again = bridge.ensure_connection().await.expect("reuse");
    assert_eq!(first.generation, 1);
    assert_eq!(again, first, "Live connection must be reused");
    assert_eq!(connector.connects(), 1);

    // WHEN: The companion closes its end
    drop(companions.next().await);
    timeout(WAIT, async {
        while bridge.is_connected().await {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("Connection never marked dead");

    // THEN: The next ensure opens generation 2
    let second = bridge.ensure_connection().await.expect("reconnect");
    assert_eq!(second.generation, 2);
    assert_eq!(second.identity, "fake-companion-2");
    assert_eq!(connector.connects(), 2);
}

/// **VALUE**: Verifies that `send` never connects on its own.
///
/// **WHY THIS MATTERS**: Callers rely on `SendFailed` to know they must re-ensure the
/// connection; a hidden reconnect would bypass their retry policy.
///
/// **BUG THIS CATCHES**: Would catch `send` behaving like `deliver`.
#[tokio::test]
async fn given_no_connection_when_sending_then_send_failed() {
    // GIVEN: A channel that never connected
    let (connector, _companions) = FakeConnector::new();
    let channel = TransportChannel::new(connector.clone(), EventHub::new());
    let request = OutboundRequest {
        id: CorrelationId::new("1"),
        command: CommandType::Ping,
        payload: json!({}),
    };

    // WHEN: Sending
    let result = channel.send(&request).await;

    // THEN: SendFailed, and nothing was spawned
    assert!(matches!(result, Err(TransportError::SendFailed { .. })));
    assert_eq!(connector.connects(), 0);
}

#[tokio::test]
async fn given_live_connection_when_sending_then_companion_receives_frame() {
    let (connector, companions) = FakeConnector::new();
    let channel = TransportChannel::new(connector, EventHub::new());
    channel.ensure_connection().await.expect("connect");
    let mut companion = companions.next().await;

    let request = OutboundRequest {
        id: CorrelationId::new("9"),
        command: CommandType::Info,
        payload: json!({}),
    };
    channel.send(&request).await.expect("send");

    assert_eq!(
        companion.next_request().await,
        json!({"id": "9", "type": "companion.info", "payload": {}})
    );
}

/// **VALUE**: Verifies that an unreachable companion surfaces as `Unavailable`.
///
/// **BUG THIS CATCHES**: Would catch connector errors being swallowed or mapped to
/// `SendFailed`, which tells callers to retry immediately.
#[tokio::test]
async fn given_companion_down_when_ensuring_then_unavailable() {
    let (connector, _companions) = FakeConnector::new();
    connector.set_unavailable(true);
    let bridge = test_bridge(connector);

    match bridge.ensure_connection().await {
        Err(BridgeError::Transport(e)) => assert!(e.is_unavailable(), "got {e}"),
        other => panic!("Expected Unavailable, got {other:?}"),
    }
}

/// **VALUE**: Verifies that a well-framed but undecodable message becomes a diagnostic and
/// reading continues.
///
/// **WHY THIS MATTERS**: One bad message from a newer companion must not cut the user off
/// from every later event.
///
/// **BUG THIS CATCHES**: Would catch the reader task exiting, or panicking, on bad JSON.
#[tokio::test]
async fn given_malformed_frame_when_received_then_diagnostic_and_stream_continues() {
    // GIVEN: A connected bridge with a listener
    let (connector, companions) = FakeConnector::new();
    let bridge = test_bridge(connector);
    let mut listener = bridge.subscribe();
    bridge.ensure_connection().await.expect("connect");
    let mut companion = companions.next().await;

    // WHEN: A garbage frame, then a valid event
    companion.send(json!({"hello": "world"})).await;
    companion
        .send(json!({"kind": "event", "type": "host.ready", "root": "/opt/companion"}))
        .await;

    // THEN: A MalformedMessage diagnostic, then the event
    match next_message(&mut listener).await {
        BridgeMessage::Diagnostic(d) => assert_eq!(d.kind, DiagnosticKind::MalformedMessage),
        other => panic!("Expected diagnostic, got {other:?}"),
    }
    let event = next_message(&mut listener).await;
    assert_eq!(
        event
            .as_inbound()
            .and_then(|m| m.as_event())
            .map(|e| e.event_type().to_string()),
        Some(String::from("host.ready"))
    );
    assert!(bridge.is_connected().await);
}

/// **VALUE**: Verifies that a frame too large to accept drops the connection with a
/// `FramingLost` diagnostic.
///
/// **BUG THIS CATCHES**: Would catch the reader trying to skip the frame and then
/// interpreting body bytes as the next length prefix.
#[tokio::test]
async fn given_oversized_frame_when_received_then_framing_lost_and_disconnected() {
    let (connector, companions) = FakeConnector::new();
    let bridge = test_bridge(connector);
    let mut listener = bridge.subscribe();
    bridge.ensure_connection().await.expect("connect");
    let mut companion = companions.next().await;

    companion.send_raw(&(2u32 * 1024 * 1024).to_ne_bytes()).await;

    match next_message(&mut listener).await {
        BridgeMessage::Diagnostic(d) => assert_eq!(d.kind, DiagnosticKind::FramingLost),
        other => panic!("Expected diagnostic, got {other:?}"),
    }
    assert!(!bridge.is_connected().await);
}

/// **VALUE**: Verifies that inbound messages reach a listener in arrival order.
///
/// **WHY THIS MATTERS**: `job.log` lines shown out of order make downloader output
/// unreadable, and a terminal event overtaking `job.started` breaks the tracker.
///
/// **BUG THIS CATCHES**: Would catch spawning a task per message.
#[tokio::test]
async fn given_many_events_when_received_then_listener_sees_arrival_order() {
    let (connector, companions) = FakeConnector::new();
    let bridge = test_bridge(connector);
    let mut listener = bridge.subscribe();
    bridge.ensure_connection().await.expect("connect");
    let mut companion = companions.next().await;

    for n in 0..50 {
        companion
            .send(json!({"kind": "event", "type": "job.log", "jobId": "A", "line": n.to_string()}))
            .await;
    }

    for n in 0..50 {
        let message = next_message(&mut listener).await;
        let event = message
            .as_inbound()
            .and_then(|m| m.as_event())
            .expect("event");
        match event {
            models::EventEnvelope::Known(models::CompanionEvent::JobLog { line, .. }) => {
                assert_eq!(line, &n.to_string());
            }
            other => panic!("Expected job.log, got {other:?}"),
        }
    }
}

/// **VALUE**: Verifies that a missing companion executable is reported as `Unavailable`.
///
/// **BUG THIS CATCHES**: Would catch a spawn error escaping as a panic, or the local
/// binary fallback masking the original failure.
#[tokio::test]
async fn given_missing_executable_when_connecting_then_unavailable() {
    use bridge_core::transport::{Connector, ProcessConnector};

    let connector = ProcessConnector::new(
        "serp-companion-that-does-not-exist",
        Vec::new(),
        "com.serp.companion",
    );

    match connector.connect().await {
        Err(e) => assert!(e.is_unavailable(), "got {e}"),
        Ok(stream) => panic!("Unexpectedly spawned {}", stream.identity),
    }
}

/// **VALUE**: Verifies the real process path end to end using `cat` as a stand-in companion.
///
/// **WHY THIS MATTERS**: The production connector wires stdin/stdout of a child process;
/// in-memory pipes cannot catch a mix-up there.
///
/// **BUG THIS CATCHES**: Would catch stdin and stdout being swapped, a missing flush, or
/// a child that is not kept alive with the connection. `cat` echoes our request back,
/// which is not a valid inbound message, so a MalformedMessage diagnostic proves the
/// round trip.
#[cfg(unix)]
#[tokio::test]
async fn given_echo_process_when_issuing_then_echo_arrives_as_diagnostic() {
    use bridge_core::pairing::PairProber;
    use bridge_core::transport::ProcessConnector;
    use bridge_core::{Bridge, BridgeSettings};
    use std::sync::Arc;

    let connector = Arc::new(ProcessConnector::new("cat", Vec::new(), "cat"));
    let prober = PairProber::new(Vec::new(), Duration::from_millis(100)).expect("client");
    let bridge = Bridge::new(connector, prober, BridgeSettings::default());
    let mut listener = bridge.subscribe();

    bridge.ping().await.expect("ping");

    match next_message(&mut listener).await {
        BridgeMessage::Diagnostic(d) => assert_eq!(d.kind, DiagnosticKind::MalformedMessage),
        other => panic!("Expected diagnostic, got {other:?}"),
    }
    bridge.disconnect().await;
    assert!(!bridge.is_connected().await);
}

/// **VALUE**: Verifies that racing senders on a disconnected channel share one connect
/// and that every frame reaches the companion whole.
///
/// **WHY THIS MATTERS**: The UI fires ping, info and start at once after the host was
/// torn down. Two connects would spawn two companions; interleaved writes would corrupt
/// the stream for good.
///
/// **BUG THIS CATCHES**: Would catch connecting outside the slot lock, or writing a frame
/// in pieces without holding the lock for the whole frame.
#[tokio::test]
async fn given_concurrent_senders_when_disconnected_then_one_connect_and_whole_frames() {
    // GIVEN: A channel with a slow connector and large requests
    const SENDERS: usize = 16;
    let (connector, companions) = FakeConnector::new();
    connector.set_connect_delay(Duration::from_millis(50));
    let channel = Arc::new(TransportChannel::new(connector.clone(), EventHub::new()));
    let filler = "x".repeat(16 * 1024);

    // WHEN: All of them deliver at the same time
    let mut tasks = Vec::new();
    for n in 0..SENDERS {
        let channel = Arc::clone(&channel);
        let request = OutboundRequest {
            id: CorrelationId::new(n.to_string()),
            command: CommandType::Ping,
            payload: json!({"filler": filler}),
        };
        tasks.push(TokioSpawn(async move { channel.deliver(&request).await }));
    }
    let mut companion = companions.next().await;

    // THEN: One connect, and the companion reads every frame intact
    let mut seen = HashSet::new();
    for _ in 0..SENDERS {
        let request = companion.next_request().await;
        assert_eq!(request["payload"]["filler"].as_str().map(str::len), Some(16 * 1024));
        seen.insert(request["id"].as_str().expect("id").to_string());
    }
    for task in tasks {
        let info = task.await.expect("task").expect("deliver");
        assert_eq!(info.generation, 1);
    }
    assert_eq!(seen.len(), SENDERS, "Every request id arrives exactly once");
    assert_eq!(connector.connects(), 1);
}

/// **VALUE**: Verifies that the channel lets go of a connection the companion closed.
///
/// **WHY THIS MATTERS**: A closed companion must not linger as a held process and
/// pipe until the next command happens to come along.
///
/// **BUG THIS CATCHES**: Would catch the reader only flagging the connection dead while
/// the slot keeps the writer and child alive.
#[tokio::test]
async fn given_companion_closes_output_when_reader_sees_eof_then_bridge_releases_connection() {
    // GIVEN: A live connection
    let (connector, companions) = FakeConnector::new();
    let channel = TransportChannel::new(connector.clone(), EventHub::new());
    channel.ensure_connection().await.expect("connect");
    let mut companion = companions.next().await;

    // WHEN: The companion closes its output but keeps reading
    companion.close_output().await;

    // THEN: The bridge drops its writer without being asked to send anything
    assert!(
        companion.bridge_hung_up().await,
        "Bridge kept the dead connection in its slot"
    );
    assert!(!channel.is_connected().await);
    assert_eq!(connector.connects(), 1, "Releasing must not reconnect");
}
