use crate::helpers::{FakeConnector, WAIT, next_message, test_bridge, wait_for_jobs};

use bridge_core::StartOutcome;
use bridge_core::error::{BridgeError, CorrelationError, JobError};
use bridge_core::hub::{BridgeMessage, DiagnosticKind};
use bridge_core::job::{AuthMode, JobPhase};

use models::{CommandType, CookieJar, StartJobRequest};

use common::RedactedSecret;

use std::time::Duration;

use serde_json::{Value, json};
use tokio::time::{sleep, timeout};

const COURSE_URL: &str = "https://www.udemy.com/course/rust-fundamentals/";

fn id_of(request: &Value) -> String {
    request["id"].as_str().expect("string id").to_string()
}

/// **VALUE**: Verifies the empty-cookie-jar start: the fallback browser profile is sent and
/// no cookie text is attached.
///
/// **WHY THIS MATTERS**: An empty `cookiesTxt` makes the downloader fail authentication,
/// while the browser profile can still work.
///
/// **BUG THIS CATCHES**: Would catch the fallback not being applied, or `browser: "file"`
/// being sent without a cookie file.
#[tokio::test]
async fn given_empty_cookie_jar_when_starting_then_payload_uses_browser_profile() {
    // GIVEN: A bridge and a start request with an empty jar
    let (connector, companions) = FakeConnector::new();
    let bridge = test_bridge(connector);
    let mut request = StartJobRequest::new(COURSE_URL);
    request.cookies = Some(CookieJar::empty());
    request.download_captions = true;

    // WHEN: Starting the job
    let outcome = bridge.start_job(&request).await.expect("start");

    // THEN: The companion receives browser=chrome and no cookiesTxt
    let mut companion = companions.next().await;
    let sent = companion.next_request().await;
    assert_eq!(sent["type"], "udemy.start");
    let payload = &sent["payload"];
    assert_eq!(payload["courseUrl"], COURSE_URL);
    assert_eq!(payload["browser"], "chrome");
    assert_eq!(payload["captionLang"], "en");
    assert_eq!(payload["preferCookies"], false);
    assert!(payload.get("cookiesTxt").is_none(), "No cookie text: {payload}");
    assert!(payload.get("bearer").is_none());
    assert_eq!(outcome, StartOutcome::Issued(models::CorrelationId::new(id_of(&sent))));
}

#[tokio::test]
async fn given_cookies_and_bearer_when_starting_then_payload_carries_both() {
    let (connector, companions) = FakeConnector::new();
    let bridge = test_bridge(connector);
    let mut request = StartJobRequest::new(COURSE_URL);
    request.cookies = Some(CookieJar::new(
        ".udemy.com\tTRUE\t/\tTRUE\t0\taccess_token\tabc\n",
        1,
    ));
    request.bearer = Some(RedactedSecret::new("bearer-token"));
    request.quality = Some(720);

    bridge.start_job(&request).await.expect("start");

    let sent = companions.next().await.next_request().await;
    let payload = &sent["payload"];
    assert_eq!(payload["browser"], "file");
    assert_eq!(payload["preferCookies"], true);
    assert!(payload["cookiesTxt"].as_str().is_some_and(|t| t.contains("access_token")));
    assert_eq!(payload["bearer"], "bearer-token");
    assert_eq!(payload["quality"], 720);

    let snapshot = bridge.job_snapshot().await;
    assert_eq!(snapshot.pending_start, Some(AuthMode::CookieFile));
}

/// **VALUE**: Walks a job through its whole life: accepted, started, bearer retry, completed.
///
/// **WHY THIS MATTERS**: This is what the popup shows the user. Every step must land in
/// the right phase, and the job must not be considered finished during the retry.
///
/// **BUG THIS CATCHES**: Would catch the tracker missing inbound messages (late
/// subscription), the retry being treated as terminal, or the slot not clearing.
#[tokio::test]
async fn given_started_job_when_companion_reports_retry_then_completion_then_idle() {
    // GIVEN: A start issued with cookies and a bearer
    let (connector, companions) = FakeConnector::new();
    let bridge = test_bridge(connector);
    let mut request = StartJobRequest::new(COURSE_URL);
    request.cookies = Some(CookieJar::new("cookie-line", 1));
    request.bearer = Some(RedactedSecret::new("token"));
    bridge.start_job(&request).await.expect("start");
    let mut companion = companions.next().await;
    let sent = companion.next_request().await;

    // WHEN: The companion accepts and starts job A
    companion
        .send(json!({"kind": "response", "id": id_of(&sent), "ok": true, "result": {"jobId": "A"}}))
        .await;
    let snapshot = wait_for_jobs(&bridge, |s| s.current_job_id() == Some("A")).await;
    assert!(matches!(snapshot.phase(), JobPhase::Starting | JobPhase::Running));

    companion
        .send(json!({
            "kind": "event", "type": "job.started", "jobId": "A",
            "args": ["udemy-dl", "-o", "/tmp/out"], "logFile": "/tmp/a.log"
        }))
        .await;
    let snapshot = wait_for_jobs(&bridge, |s| s.phase() == JobPhase::Running).await;
    let job = snapshot.current.expect("job");
    assert_eq!(job.log_file.as_deref(), Some("/tmp/a.log"));
    assert!(job.bearer_supplied);

    // WHEN: The companion retries with the bearer
    companion
        .send(json!({
            "kind": "event", "type": "job.retry_bearer", "jobId": "A", "args": ["-o", "/tmp/out"]
        }))
        .await;

    // THEN: Still running A, with the retried args
    let snapshot = wait_for_jobs(&bridge, |s| {
        s.current
            .as_ref()
            .is_some_and(|job| job.bearer_retry_args.is_some())
    })
    .await;
    assert_eq!(snapshot.phase(), JobPhase::Running);
    assert_eq!(snapshot.current_job_id(), Some("A"));
    assert!(
        snapshot
            .diagnostics
            .contains(&String::from("[job A] retrying with bearer: -o /tmp/out"))
    );

    // WHEN: A completes
    companion
        .send(json!({"kind": "event", "type": "job.completed", "jobId": "A", "code": 0}))
        .await;

    // THEN: Idle with a Completed outcome
    let snapshot = wait_for_jobs(&bridge, |s| s.is_idle() && s.last_outcome.is_some()).await;
    let outcome = snapshot.last_outcome.expect("outcome");
    assert_eq!(outcome.job_id, "A");
    assert_eq!(outcome.phase, JobPhase::Completed);
}

/// **VALUE**: Verifies that a second start while a job runs is refused locally.
///
/// **WHY THIS MATTERS**: Double clicks on "Start" are common. The running job must keep
/// going and the user must be told why nothing happened.
///
/// **BUG THIS CATCHES**: Would catch the second start being sent, or the current job id
/// being overwritten.
#[tokio::test]
async fn given_running_job_when_starting_again_then_rejected_without_sending() {
    // GIVEN: Job A running
    let (connector, companions) = FakeConnector::new();
    let bridge = test_bridge(connector);
    bridge.ensure_connection().await.expect("connect");
    let mut companion = companions.next().await;
    companion
        .send(json!({"kind": "event", "type": "job.started", "jobId": "A", "args": []}))
        .await;
    wait_for_jobs(&bridge, |s| s.current_job_id() == Some("A")).await;
    let mut listener = bridge.subscribe();

    // WHEN: Starting another job
    let outcome = bridge
        .start_job(&StartJobRequest::new(COURSE_URL))
        .await
        .expect("start call");

    // THEN: Rejected, a conflict diagnostic, nothing sent, A still current
    assert_eq!(
        outcome,
        StartOutcome::Rejected {
            active_job_id: String::from("A")
        }
    );
    match next_message(&mut listener).await {
        BridgeMessage::Diagnostic(d) => assert_eq!(d.kind, DiagnosticKind::ConflictingJobStart),
        other => panic!("Expected conflict diagnostic, got {other:?}"),
    }
    assert!(
        companion
            .try_next_request(Duration::from_millis(100))
            .await
            .is_none(),
        "Nothing must be sent for a rejected start"
    );
    let snapshot = bridge.job_snapshot().await;
    assert_eq!(snapshot.current_job_id(), Some("A"));
    assert_eq!(
        snapshot.diagnostics.last().map(String::as_str),
        Some("[err] job A is already running")
    );
}

/// **VALUE**: Verifies that a start issued before the previous one was answered is
/// refused, and that the answer still lands on the first start.
///
/// **WHY THIS MATTERS**: Only the start response ties the companion's job id to the auth
/// the job was started with. Two unanswered starts would hand job A the second start's
/// auth and raise false bearer warnings later.
///
/// **BUG THIS CATCHES**: Would catch the start guard looking only at the current job and
/// letting a second start overwrite the pending one.
#[tokio::test]
async fn given_unanswered_start_when_starting_again_then_pending_and_first_auth_kept() {
    // GIVEN: A start with cookies and a bearer, not answered yet
    let (connector, companions) = FakeConnector::new();
    let bridge = test_bridge(connector);
    let mut first = StartJobRequest::new(COURSE_URL);
    first.cookies = Some(CookieJar::new("cookie-line", 1));
    first.bearer = Some(RedactedSecret::new("token"));
    let StartOutcome::Issued(first_id) = bridge.start_job(&first).await.expect("first") else {
        panic!("First start must be issued");
    };
    let mut companion = companions.next().await;
    let sent = companion.next_request().await;
    assert_eq!(id_of(&sent), first_id.as_str());
    let mut listener = bridge.subscribe();

    // WHEN: A second start follows immediately
    let outcome = bridge
        .start_job(&StartJobRequest::new(COURSE_URL))
        .await
        .expect("second start call");

    // THEN: Refused without sending, with a conflict diagnostic
    assert_eq!(
        outcome,
        StartOutcome::Pending {
            correlation_id: first_id.clone()
        }
    );
    match next_message(&mut listener).await {
        BridgeMessage::Diagnostic(d) => assert_eq!(d.kind, DiagnosticKind::ConflictingJobStart),
        other => panic!("Expected conflict diagnostic, got {other:?}"),
    }
    assert!(
        companion
            .try_next_request(Duration::from_millis(100))
            .await
            .is_none(),
        "Only one udemy.start may be written"
    );

    // AND: The first answer makes job A Starting with the first start's auth
    companion
        .send(json!({"kind": "response", "id": first_id.as_str(), "ok": true, "result": {"jobId": "A"}}))
        .await;
    let snapshot = wait_for_jobs(&bridge, |s| s.current_job_id() == Some("A")).await;
    let job = snapshot.current.expect("job A");
    assert_eq!(job.phase, JobPhase::Starting);
    assert_eq!(job.auth, Some(AuthMode::CookieFile));
    assert!(job.bearer_supplied);
}

/// **VALUE**: Verifies that a start whose connection closed unanswered stops blocking.
///
/// **WHY THIS MATTERS**: The browser can kill the native host right after a start. Its
/// answer can never arrive, and the user must be able to start again.
///
/// **BUG THIS CATCHES**: Would catch a pending start that blocks every later start forever.
#[tokio::test]
async fn given_start_lost_with_its_connection_when_starting_again_then_issued() {
    // GIVEN: A start written on generation 1, then the companion goes away
    let (connector, companions) = FakeConnector::new();
    let bridge = test_bridge(connector);
    bridge
        .start_job(&StartJobRequest::new(COURSE_URL))
        .await
        .expect("first");
    let mut companion = companions.next().await;
    companion.next_request().await;
    drop(companion);
    timeout(WAIT, async {
        while bridge.is_connected().await {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("Connection never dropped");

    // WHEN: Starting again
    let outcome = bridge
        .start_job(&StartJobRequest::new(COURSE_URL))
        .await
        .expect("second");

    // THEN: Issued on a new connection, with the lost start logged
    assert!(matches!(outcome, StartOutcome::Issued(_)), "Got {outcome:?}");
    let sent = companions.next().await.next_request().await;
    assert_eq!(sent["type"], "udemy.start");
    let snapshot = bridge.job_snapshot().await;
    assert!(
        snapshot
            .diagnostics
            .iter()
            .any(|line| line.ends_with("connection closed before the companion answered")),
        "{:?}",
        snapshot.diagnostics
    );
}

/// **VALUE**: Verifies that job decisions see every message a listener has already seen.
///
/// **WHY THIS MATTERS**: The popup enables "Cancel" from its own listener. Once it has
/// shown `job.completed`, a cancel must not be sent for the finished job.
///
/// **BUG THIS CATCHES**: Would catch the tracker being read before its actor applied
/// messages already queued for it.
#[tokio::test]
async fn given_listener_saw_completion_when_cancelling_then_no_active_job() {
    // GIVEN: Job A running and a listener attached
    let (connector, companions) = FakeConnector::new();
    let bridge = test_bridge(connector);
    bridge.ensure_connection().await.expect("connect");
    let mut companion = companions.next().await;
    companion
        .send(json!({"kind": "event", "type": "job.started", "jobId": "A", "args": []}))
        .await;
    wait_for_jobs(&bridge, |s| s.current_job_id() == Some("A")).await;
    let mut listener = bridge.subscribe();

    // WHEN: The listener receives job.completed and cancels right away
    companion
        .send(json!({"kind": "event", "type": "job.completed", "jobId": "A", "code": 0}))
        .await;
    let seen = next_message(&mut listener).await;
    assert!(seen.as_inbound().is_some(), "Expected the completion event, got {seen:?}");
    let result = bridge.cancel_current().await;

    // THEN: There is nothing to cancel and nothing is sent
    assert!(
        matches!(result, Err(BridgeError::Job(JobError::NoActiveJob { .. }))),
        "Got {result:?}"
    );
    assert!(
        companion
            .try_next_request(Duration::from_millis(100))
            .await
            .is_none()
    );
}

/// **VALUE**: Verifies that cancelling with no job fails with `NoActiveJob` and sends nothing.
///
/// **BUG THIS CATCHES**: Would catch a cancel with an empty job id reaching the companion,
/// or a connection being opened just to send it.
#[tokio::test]
async fn given_idle_when_cancelling_then_no_active_job_and_nothing_issued() {
    let (connector, _companions) = FakeConnector::new();
    let bridge = test_bridge(connector.clone());

    let result = bridge.cancel_current().await;

    assert!(matches!(
        result,
        Err(BridgeError::Job(JobError::NoActiveJob { .. }))
    ));
    assert_eq!(connector.connects(), 0);
}

/// **VALUE**: Verifies that cancel sends the current job id and leaves the job current.
///
/// **WHY THIS MATTERS**: The companion may fail to stop the job; only its terminal event
/// is authoritative.
///
/// **BUG THIS CATCHES**: Would catch a cancel that clears the slot locally.
#[tokio::test]
async fn given_running_job_when_cancelling_then_cancel_sent_and_job_kept() {
    let (connector, companions) = FakeConnector::new();
    let bridge = test_bridge(connector);
    bridge.ensure_connection().await.expect("connect");
    let mut companion = companions.next().await;
    companion
        .send(json!({"kind": "event", "type": "job.started", "jobId": "A", "logFile": "/tmp/a.log"}))
        .await;
    wait_for_jobs(&bridge, |s| s.current_job_id() == Some("A")).await;

    bridge.cancel_current().await.expect("cancel");

    let sent = companion.next_request().await;
    assert_eq!(sent["type"], "udemy.cancel");
    assert_eq!(sent["payload"], json!({"jobId": "A"}));
    assert_eq!(bridge.job_snapshot().await.current_job_id(), Some("A"));

    bridge.open_log().await.expect("open log");
    let sent = companion.next_request().await;
    assert_eq!(sent["type"], "companion.openLog");
    assert_eq!(sent["payload"], json!({"logFile": "/tmp/a.log"}));
}

/// **VALUE**: Verifies `request` returns the response carrying its own id.
///
/// **BUG THIS CATCHES**: Would catch subscribing after issuing, which loses fast replies.
#[tokio::test]
async fn given_companion_answers_when_requesting_then_matching_response_returned() {
    let (connector, companions) = FakeConnector::new();
    let bridge = std::sync::Arc::new(test_bridge(connector));

    let requester = {
        let bridge = std::sync::Arc::clone(&bridge);
        tokio::spawn(async move {
            bridge
                .request(CommandType::Info, json!({}), Duration::from_secs(2))
                .await
        })
    };

    let mut companion = companions.next().await;
    let sent = companion.next_request().await;
    companion
        .send(json!({"kind": "response", "id": "999", "ok": true, "result": {}}))
        .await;
    companion
        .send(json!({
            "kind": "response", "id": id_of(&sent), "ok": true,
            "result": {"ffmpeg": true, "ytDlp": "2024.10.07", "python": "3.12"}
        }))
        .await;

    let response = requester.await.expect("task").expect("response");
    assert!(response.ok);
    assert_eq!(response.id.map(|id| id.to_string()), Some(id_of(&sent)));
    assert_eq!(response.result.expect("result")["python"], "3.12");
}

#[tokio::test]
async fn given_silent_companion_when_requesting_then_timeout() {
    let (connector, _companions) = FakeConnector::new();
    let bridge = test_bridge(connector);

    let result = bridge
        .request(CommandType::Ping, json!({}), Duration::from_millis(50))
        .await;

    assert!(matches!(
        result,
        Err(BridgeError::Correlation(CorrelationError::Timeout { .. }))
    ));
}

/// **VALUE**: Verifies that every subscriber sees an inbound event regardless of who issued
/// the request.
///
/// **BUG THIS CATCHES**: Would catch responses being routed only to the issuing caller.
#[tokio::test]
async fn given_two_subscribers_when_response_arrives_then_both_receive_it() {
    let (connector, companions) = FakeConnector::new();
    let bridge = test_bridge(connector);
    let mut first = bridge.subscribe();
    let mut second = bridge.subscribe();

    let id = bridge.ping().await.expect("ping");
    let mut companion = companions.next().await;
    companion.next_request().await;
    companion
        .send(json!({"kind": "response", "id": id.as_str(), "ok": true, "result": {"pong": true}}))
        .await;

    for listener in [&mut first, &mut second] {
        let message = next_message(listener).await;
        let response = message
            .as_inbound()
            .and_then(|m| m.as_response())
            .expect("response");
        assert!(response.answers(&id));
    }
}

/// **VALUE**: Verifies that ids keep increasing across requests and reconnects.
///
/// **BUG THIS CATCHES**: Would catch an id counter owned by the connection.
#[tokio::test]
async fn given_reconnect_when_issuing_then_ids_keep_increasing() {
    let (connector, companions) = FakeConnector::new();
    let bridge = test_bridge(connector);

    let first = bridge.ping().await.expect("ping");
    drop(companions.next().await);
    tokio::time::timeout(crate::helpers::WAIT, async {
        while bridge.is_connected().await {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("disconnect noticed");
    let second = bridge.info().await.expect("info");

    assert_eq!(first.as_str(), "1");
    assert_eq!(second.as_str(), "2");
}
