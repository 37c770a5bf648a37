use crate::{CompanionEvent, CorrelationId, EventEnvelope, InboundMessage};

use serde_json::json;

fn parse(value: serde_json::Value) -> InboundMessage {
    serde_json::from_value(value).expect("valid inbound message")
}

/// **VALUE**: Verifies that `job.started` decodes into the typed variant with args and log file.
///
/// **WHY THIS MATTERS**: The tracker keys its whole state machine on this event.
///
/// **BUG THIS CATCHES**: Would catch the camelCase rename of `jobId`/`logFile` being lost.
#[test]
fn given_job_started_frame_when_decoded_then_yields_typed_event() {
    // GIVEN: A job.started frame as written by the companion
    let message = parse(json!({
        "kind": "event",
        "type": "job.started",
        "jobId": "A",
        "args": ["python", "-o", "/tmp/out"],
        "logFile": "/tmp/a.log"
    }));

    // WHEN / THEN: The typed event carries every field
    match message {
        InboundMessage::Event(EventEnvelope::Known(CompanionEvent::JobStarted {
            job_id,
            args,
            log_file,
        })) => {
            assert_eq!(job_id, "A");
            assert_eq!(args, vec!["python", "-o", "/tmp/out"]);
            assert_eq!(log_file.as_deref(), Some("/tmp/a.log"));
        }
        other => panic!("Expected JobStarted, got {other:?}"),
    }
}

/// **VALUE**: Verifies that unknown event types survive decoding.
///
/// **WHY THIS MATTERS**: Newer companions add events. Rejecting them would turn every new
/// event into a malformed-message diagnostic and hide it from listeners.
///
/// **BUG THIS CATCHES**: Would catch the untagged fallback being removed.
#[test]
fn given_unknown_event_type_when_decoded_then_kept_verbatim() {
    // GIVEN: An event type outside the vocabulary
    let message = parse(json!({
        "kind": "event",
        "type": "job.progress",
        "jobId": "A",
        "percent": 42
    }));

    // WHEN: Inspecting the envelope
    let envelope = message.as_event().expect("event");

    // THEN: Type, job id and extra fields are preserved
    assert_eq!(envelope.event_type(), "job.progress");
    assert_eq!(envelope.job_id(), Some("A"));
    match envelope {
        EventEnvelope::Unrecognized(event) => {
            assert_eq!(event.fields.get("percent"), Some(&json!(42)));
            assert!(!event.fields.contains_key("kind"));
        }
        EventEnvelope::Known(_) => panic!("job.progress is not a known event"),
    }
}

/// **VALUE**: Verifies that a known type missing its job id is not silently typed.
///
/// **WHY THIS MATTERS**: A `job.completed` without a job id must never clear the current job.
///
/// **BUG THIS CATCHES**: Would catch `job_id` becoming optional with a default.
#[test]
fn given_job_completed_without_job_id_when_decoded_then_falls_back_to_unrecognized() {
    let message = parse(json!({"kind": "event", "type": "job.completed", "code": 0}));

    let envelope = message.as_event().expect("event");

    assert!(matches!(envelope, EventEnvelope::Unrecognized(_)));
    assert_eq!(envelope.event_type(), "job.completed");
    assert_eq!(envelope.job_id(), None);
}

/// **VALUE**: Verifies that responses expose their correlation id and `result.jobId`.
///
/// **WHY THIS MATTERS**: Callers match responses purely by the echoed id.
///
/// **BUG THIS CATCHES**: Would catch the id field being dropped or renamed.
#[test]
fn given_start_response_when_decoded_then_answers_its_request() {
    // GIVEN: A successful start response
    let message = parse(json!({
        "kind": "response",
        "id": "7",
        "ok": true,
        "result": {"jobId": "A"}
    }));

    // WHEN
    let response = message.as_response().expect("response");

    // THEN
    assert!(response.answers(&CorrelationId::new("7")));
    assert!(!response.answers(&CorrelationId::new("8")));
    assert_eq!(response.result_job_id(), Some("A"));
}

#[test]
fn given_error_response_with_null_id_when_decoded_then_has_no_id() {
    let message = parse(json!({
        "kind": "response",
        "id": null,
        "ok": false,
        "error": "unknown_type:bogus"
    }));

    let response = message.as_response().expect("response");

    assert_eq!(response.id, None);
    assert_eq!(response.error.as_deref(), Some("unknown_type:bogus"));
    assert_eq!(response.result_job_id(), None);
}

/// **VALUE**: Verifies that a frame without `kind` is rejected.
///
/// **WHY THIS MATTERS**: The transport reports undecodable frames as diagnostics; this is the
/// signal it relies on.
///
/// **BUG THIS CATCHES**: Would catch a default `kind` being introduced.
#[test]
fn given_frame_without_kind_when_decoded_then_fails() {
    let result: Result<InboundMessage, _> =
        serde_json::from_value(json!({"id": "1", "type": "companion.ping", "payload": {}}));

    assert!(result.is_err());
}
