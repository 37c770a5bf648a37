use crate::correlation::{IdSequence, await_response};
use crate::error::CorrelationError;
use crate::hub::{BridgeMessage, EventHub};

use models::{CorrelationId, InboundMessage, ResponseMessage};

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

fn response(id: &str) -> BridgeMessage {
    BridgeMessage::Inbound(InboundMessage::Response(ResponseMessage {
        id: Some(CorrelationId::new(id)),
        ok: true,
        result: None,
        error: None,
    }))
}

/// **VALUE**: Verifies that ids start at "1" and increase by one.
///
/// **WHY THIS MATTERS**: The companion echoes ids verbatim, and log lines are easier to
/// follow when ids are small sequential numbers.
///
/// **BUG THIS CATCHES**: Would catch an off-by-one start or a counter that is not advanced.
#[test]
fn given_fresh_sequence_when_next_id_called_then_counts_from_one() {
    let ids = IdSequence::new();
    assert_eq!(ids.next_id().as_str(), "1");
    assert_eq!(ids.next_id().as_str(), "2");
    assert_eq!(ids.next_id().as_str(), "3");
}

/// **VALUE**: Verifies that concurrent callers never receive the same id.
///
/// **WHY THIS MATTERS**: Two UI surfaces can issue commands at the same moment. A duplicate
/// id would deliver one caller's response to the other.
///
/// **BUG THIS CATCHES**: Would catch a load-then-store counter instead of an atomic increment.
#[test]
fn given_many_threads_when_next_id_called_then_ids_are_pairwise_distinct() {
    // GIVEN: A shared sequence and eight threads
    let ids = Arc::new(IdSequence::new());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let ids = Arc::clone(&ids);
            std::thread::spawn(move || (0..500).map(|_| ids.next_id()).collect::<Vec<_>>())
        })
        .collect();

    // WHEN: Collecting every issued id
    let mut seen = HashSet::new();
    for handle in handles {
        for id in handle.join().expect("thread") {
            // THEN: No id is seen twice
            assert!(seen.insert(id.clone()), "Duplicate id {id}");
        }
    }
    assert_eq!(seen.len(), 4000);
}

/// **VALUE**: Verifies that the waiter skips unrelated responses and returns the matching one.
///
/// **WHY THIS MATTERS**: Every listener sees every response, including other callers'.
///
/// **BUG THIS CATCHES**: Would catch a waiter that returns the first response it sees.
#[tokio::test]
async fn given_other_responses_first_when_awaiting_then_returns_matching_response() {
    // GIVEN: A subscription that receives an unrelated response before ours
    let hub = EventHub::new();
    let mut subscription = hub.subscribe();
    hub.publish(response("7"));
    hub.publish(response("8"));

    // WHEN: Waiting for id 8
    let matched = await_response(
        &mut subscription,
        &CorrelationId::new("8"),
        Duration::from_secs(1),
    )
    .await
    .expect("response");

    // THEN: The matching response is returned
    assert_eq!(matched.id, Some(CorrelationId::new("8")));
}

/// **VALUE**: Verifies that the caller-chosen window is honored.
///
/// **WHY THIS MATTERS**: The companion can stay silent forever; a caller that waits
/// must get control back.
///
/// **BUG THIS CATCHES**: Would catch a missing timeout, which hangs the caller.
#[tokio::test]
async fn given_no_response_when_awaiting_then_times_out() {
    let hub = EventHub::new();
    let mut subscription = hub.subscribe();

    let result = await_response(
        &mut subscription,
        &CorrelationId::new("1"),
        Duration::from_millis(20),
    )
    .await;

    match result {
        Err(CorrelationError::Timeout { id, window_ms, .. }) => {
            assert_eq!(id, "1");
            assert_eq!(window_ms, 20);
        }
        other => panic!("Expected Timeout, got {other:?}"),
    }
}

/// **VALUE**: Verifies that a vanished hub ends the wait with `Closed` instead of a timeout.
///
/// **BUG THIS CATCHES**: Would catch a waiter that spins until the window expires after
/// the bridge is dropped.
#[tokio::test]
async fn given_hub_dropped_when_awaiting_then_reports_closed() {
    let hub = EventHub::new();
    let mut subscription = hub.subscribe();
    drop(hub);

    let result = await_response(
        &mut subscription,
        &CorrelationId::new("1"),
        Duration::from_secs(5),
    )
    .await;

    assert!(matches!(result, Err(CorrelationError::Closed { .. })));
}
