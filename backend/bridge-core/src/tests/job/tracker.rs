use crate::error::JobError;
use crate::hub::{Diagnostic, DiagnosticKind};
use crate::job::{AuthMode, JobPhase, JobTracker};

use models::{CorrelationId, InboundMessage};

use serde_json::{Value, json};

fn inbound(value: Value) -> InboundMessage {
    serde_json::from_value(value).expect("valid inbound message")
}

fn started(job_id: &str, args: &[&str]) -> InboundMessage {
    inbound(json!({"kind": "event", "type": "job.started", "jobId": job_id, "args": args}))
}

fn terminal(kind: &str, job_id: &str, code: i32) -> InboundMessage {
    inbound(json!({"kind": "event", "type": kind, "jobId": job_id, "code": code}))
}

fn tracker() -> JobTracker {
    JobTracker::new(100)
}

/// **VALUE**: Verifies the happy path: started then completed returns to Idle.
///
/// **WHY THIS MATTERS**: Leaving a finished job current would block every later start
/// with a conflict.
///
/// **BUG THIS CATCHES**: Would catch the terminal event setting `Completed` without
/// clearing the current slot.
#[test]
fn given_started_job_when_completed_then_tracker_is_idle_with_outcome() {
    // GIVEN: Job A running
    let mut tracker = tracker();
    tracker.apply(&started("A", &["-o", "/tmp/out"]));
    assert_eq!(tracker.phase(), JobPhase::Running);
    assert_eq!(tracker.current_job_id(), Some("A"));

    // WHEN: A completes
    tracker.apply(&terminal("job.completed", "A", 0));

    // THEN: Idle, with the outcome remembered
    assert_eq!(tracker.phase(), JobPhase::Idle);
    assert!(tracker.current_job_id().is_none());
    let outcome = tracker.last_outcome().expect("outcome");
    assert_eq!(outcome.job_id, "A");
    assert_eq!(outcome.phase, JobPhase::Completed);
    assert_eq!(outcome.code, Some(0));
    assert_eq!(tracker.diagnostics().last(), Some("[job A] completed (0)"));
}

/// **VALUE**: Verifies that a terminal event for another job id is diagnostic only.
///
/// **WHY THIS MATTERS**: A late `job.failed` from a cancelled earlier job must not
/// clear the job the user is watching now.
///
/// **BUG THIS CATCHES**: Would catch terminal handling that ignores the job id.
#[test]
fn given_running_job_when_failed_for_other_id_then_current_job_unchanged() {
    // GIVEN: Job A running
    let mut tracker = tracker();
    tracker.apply(&started("A", &[]));

    // WHEN: A failure for job B arrives
    tracker.apply(&terminal("job.failed", "B", 1));

    // THEN: A is still current and running
    assert_eq!(tracker.current_job_id(), Some("A"));
    assert_eq!(tracker.phase(), JobPhase::Running);
    assert!(tracker.last_outcome().is_none());
    assert_eq!(
        tracker.diagnostics().last(),
        Some("[job B] failed (1), not the current job")
    );
}

#[test]
fn given_failed_job_when_applied_then_outcome_is_failed() {
    let mut tracker = tracker();
    tracker.apply(&started("A", &[]));
    tracker.apply(&terminal("job.failed", "A", 2));

    assert_eq!(tracker.phase(), JobPhase::Idle);
    let outcome = tracker.last_outcome().expect("outcome");
    assert_eq!(outcome.phase, JobPhase::Failed);
    assert_eq!(outcome.code, Some(2));
}

/// **VALUE**: Verifies that a start is refused while a job is current.
///
/// **WHY THIS MATTERS**: The companion runs one job at a time; issuing a second start
/// would only produce a confusing `job.active` reply.
///
/// **BUG THIS CATCHES**: Would catch `check_can_start` passing while a job is running.
#[test]
fn given_running_job_when_checking_start_then_conflict_names_active_job() {
    let mut tracker = tracker();
    tracker.apply(&started("A", &[]));

    match tracker.check_can_start() {
        Err(JobError::ConflictingJobStart { active_job_id, .. }) => assert_eq!(active_job_id, "A"),
        other => panic!("Expected ConflictingJobStart, got {other:?}"),
    }
    assert_eq!(tracker.current_job_id(), Some("A"));
}

#[test]
fn given_idle_tracker_when_checking_start_then_allowed() {
    assert!(tracker().check_can_start().is_ok());
}

/// **VALUE**: Verifies that an unanswered start blocks a second one and that its answer
/// still lands on the first start.
///
/// **WHY THIS MATTERS**: The response is what links the companion's job id to the auth
/// the job was started with. Overwriting the pending start would hand job A someone
/// else's auth.
///
/// **BUG THIS CATCHES**: Would catch `check_can_start` ignoring the pending start.
#[test]
fn given_pending_start_when_checking_start_then_start_pending_and_answer_keeps_auth() {
    // GIVEN: A cookie start with a bearer, written on generation 1
    let mut tracker = tracker();
    let first = CorrelationId::new("1");
    tracker.record_start_issued(first.clone(), AuthMode::CookieFile, true);
    tracker.record_start_delivered(&first, 1);

    // WHEN: Another start is checked
    let check = tracker.check_can_start();

    // THEN: Refused, naming the pending start
    match check {
        Err(JobError::StartPending { correlation_id, .. }) => assert_eq!(correlation_id, first),
        other => panic!("Expected StartPending, got {other:?}"),
    }

    // AND: The answer to the first start keeps its auth
    tracker.apply(&inbound(json!({
        "kind": "response", "id": "1", "ok": true, "result": {"jobId": "A"}
    })));
    let job = tracker.current().expect("job A");
    assert_eq!(job.id, "A");
    assert_eq!(job.phase, JobPhase::Starting);
    assert_eq!(job.auth, Some(AuthMode::CookieFile));
    assert!(job.bearer_supplied);
}

/// **VALUE**: Verifies when a pending start counts as lost.
///
/// **WHY THIS MATTERS**: A start whose connection is gone will never be answered and must
/// stop blocking. One still being written, or on the live connection, must not be dropped.
///
/// **BUG THIS CATCHES**: Would catch expiring in-flight starts, or never expiring at all.
#[test]
fn given_pending_start_when_expiring_then_only_lost_connections_drop_it() {
    let mut tracker = tracker();
    let id = CorrelationId::new("7");
    tracker.record_start_issued(id.clone(), AuthMode::BrowserProfile(String::from("chrome")), false);

    // In flight: no generation recorded yet
    assert!(!tracker.expire_stale_start(None));
    assert!(tracker.pending().is_some());

    // Written on the live connection
    tracker.record_start_delivered(&id, 3);
    assert!(!tracker.expire_stale_start(Some(3)));
    assert!(tracker.pending().is_some());

    // That connection is gone
    assert!(tracker.expire_stale_start(Some(4)));
    assert!(tracker.pending().is_none());
    assert!(tracker.check_can_start().is_ok());
    assert_eq!(
        tracker.diagnostics().last(),
        Some("[err] start 7: connection closed before the companion answered")
    );
}

/// **VALUE**: Verifies the bearer retry scenario: the job stays Running and the retried
/// arguments are recorded.
///
/// **WHY THIS MATTERS**: The retry is done by the companion. The user only learns about
/// it through this diagnostic, and must not see the job as finished.
///
/// **BUG THIS CATCHES**: Would catch the retry event being treated as a new job or a
/// terminal event.
#[test]
fn given_running_job_when_retry_bearer_then_stays_running_and_records_args() {
    // GIVEN: Job A started with cookie auth and a bearer
    let mut tracker = tracker();
    let id = CorrelationId::new("1");
    tracker.record_start_issued(id.clone(), AuthMode::CookieFile, true);
    tracker.apply(&inbound(json!({
        "kind": "response", "id": "1", "ok": true, "result": {"jobId": "A"}
    })));
    tracker.apply(&started("A", &["-o", "/tmp/a"]));

    // WHEN: The companion retries with the bearer
    tracker.apply(&inbound(json!({
        "kind": "event", "type": "job.retry_bearer", "jobId": "A", "args": ["-o", "/tmp/out"]
    })));

    // THEN: Still Running for A, retried args recorded
    let job = tracker.current().expect("current job");
    assert_eq!(job.id, "A");
    assert_eq!(job.phase, JobPhase::Running);
    assert_eq!(job.auth, Some(AuthMode::CookieFile));
    assert!(job.bearer_supplied);
    assert_eq!(
        job.bearer_retry_args.as_deref(),
        Some(&["-o".to_string(), "/tmp/out".to_string()][..])
    );
    assert_eq!(
        tracker.diagnostics().last(),
        Some("[job A] retrying with bearer: -o /tmp/out")
    );
}

/// **VALUE**: Verifies that a bearer retry for a job that is not current changes nothing.
///
/// **BUG THIS CATCHES**: Would catch the retry resurrecting an old job as current.
#[test]
fn given_idle_tracker_when_retry_bearer_for_unknown_job_then_diagnostic_only() {
    let mut tracker = tracker();
    tracker.apply(&inbound(json!({
        "kind": "event", "type": "job.retry_bearer", "jobId": "Z", "args": ["-o", "/x"]
    })));

    assert!(tracker.current().is_none());
    assert_eq!(
        tracker.diagnostics().last(),
        Some("[job Z] retrying with bearer: -o /x, not the current job")
    );
}

/// **VALUE**: Verifies that the start response moves the tracker to Starting with the pending auth.
///
/// **WHY THIS MATTERS**: Between the response and `job.started` a cancel must already
/// know the job id.
///
/// **BUG THIS CATCHES**: Would catch ignoring `result.jobId` on the start response.
#[test]
fn given_pending_start_when_response_arrives_then_job_is_starting() {
    let mut tracker = tracker();
    tracker.record_start_issued(
        CorrelationId::new("4"),
        AuthMode::BrowserProfile(String::from("chrome")),
        false,
    );

    tracker.apply(&inbound(json!({
        "kind": "response", "id": "4", "ok": true, "result": {"jobId": "J"}
    })));

    let job = tracker.current().expect("current job");
    assert_eq!(job.id, "J");
    assert_eq!(job.phase, JobPhase::Starting);
    assert_eq!(job.auth, Some(AuthMode::BrowserProfile(String::from("chrome"))));
    assert!(tracker.pending().is_none());
}

#[test]
fn given_pending_start_when_response_fails_then_pending_cleared_and_logged() {
    let mut tracker = tracker();
    tracker.record_start_issued(CorrelationId::new("4"), AuthMode::CookieFile, false);

    tracker.apply(&inbound(json!({
        "kind": "response", "id": "4", "ok": false, "error": "missing_courseUrl"
    })));

    assert!(tracker.pending().is_none());
    assert!(tracker.current().is_none());
    assert_eq!(
        tracker.diagnostics().last(),
        Some("[err] start: missing_courseUrl")
    );
}

/// **VALUE**: Verifies the popup-style lines written for a started job.
///
/// **BUG THIS CATCHES**: Would catch losing the output directory that follows `-o`.
#[test]
fn given_started_with_output_arg_when_applied_then_logs_args_and_output() {
    let mut tracker = tracker();
    tracker.apply(&started("A", &["udemy-dl", "-o", "/tmp/out"]));

    let lines = tracker.diagnostics().to_vec();
    assert_eq!(
        lines,
        vec![
            "[job A] started",
            "[job A] args: udemy-dl -o /tmp/out",
            "[job A] output: /tmp/out",
        ]
    );
    assert_eq!(
        tracker.current().and_then(|job| job.output_dir()),
        Some("/tmp/out")
    );
}

/// **VALUE**: Verifies that a finished job is not brought back by a late `job.started`.
///
/// **BUG THIS CATCHES**: Would catch an out-of-order `job.started` resurrecting a job the
/// user already saw complete.
#[test]
fn given_completed_job_when_late_started_arrives_then_not_resurrected() {
    let mut tracker = tracker();
    tracker.apply(&started("A", &[]));
    tracker.apply(&terminal("job.completed", "A", 0));

    tracker.apply(&started("A", &[]));

    assert!(tracker.current().is_none());
}

#[test]
fn given_companion_job_active_when_applied_then_conflict_logged_and_state_kept() {
    let mut tracker = tracker();
    tracker.apply(&started("A", &[]));

    tracker.apply(&inbound(json!({"kind": "event", "type": "job.active", "jobId": "A"})));

    assert_eq!(tracker.current_job_id(), Some("A"));
    assert_eq!(
        tracker.diagnostics().last(),
        Some("[err] job A is already running")
    );
}

#[test]
fn given_host_and_log_events_when_applied_then_phase_unchanged() {
    let mut tracker = tracker();
    tracker.apply(&started("A", &[]));

    tracker.apply(&inbound(json!({
        "kind": "event", "type": "host.cookies_saved", "path": "/tmp/cookies.txt", "bytes": 120
    })));
    tracker.apply(&inbound(json!({
        "kind": "event", "type": "job.log", "jobId": "A", "line": "Downloading lecture 1"
    })));
    tracker.apply(&inbound(json!({"kind": "event", "type": "job.canceled", "jobId": "A"})));

    assert_eq!(tracker.phase(), JobPhase::Running);
    let lines = tracker.diagnostics().to_vec();
    assert!(lines.contains(&String::from(
        "[host] cookies.txt saved: /tmp/cookies.txt (120 bytes)"
    )));
    assert!(lines.contains(&String::from("[job A] Downloading lecture 1")));
    assert_eq!(lines.last().map(String::as_str), Some("[job A] canceled"));
}

#[test]
fn given_framing_diagnostic_when_recorded_then_logged_as_error() {
    let mut tracker = tracker();
    tracker.record_diagnostic(&Diagnostic::new(DiagnosticKind::FramingLost, "stream ended"));
    assert_eq!(tracker.diagnostics().last(), Some("[err] stream ended"));
}
