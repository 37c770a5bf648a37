use bridge_core::pairing::{CandidateEndpoint, PairProber};

use std::net::TcpListener;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const IDENTITY: &str = "abcdefghijklmnopabcdefghijklmnop";
const PROBE_TIMEOUT: Duration = Duration::from_millis(300);

fn candidate(server: &MockServer) -> CandidateEndpoint {
    CandidateEndpoint::new("127.0.0.1", server.address().port())
}

/// A loopback port with nothing listening on it.
fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    listener.local_addr().expect("addr").port()
}

async fn affirmative(server: &MockServer, manifest: &str, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path("/pair"))
        .and(query_param("extId", IDENTITY))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"ok": true, "manifest": manifest})),
        )
        .expect(expected_calls)
        .mount(server)
        .await;
}

/// **VALUE**: Verifies first-match-wins: P1 fails, P2 answers, P3 is never contacted.
///
/// **WHY THIS MATTERS**: The list order encodes which companion version we prefer. Probing
/// past the first success wastes time and can register the extension with two companions.
///
/// **BUG THIS CATCHES**: Would catch probing in parallel, continuing after a success, or
/// stopping at the first failure.
#[tokio::test]
async fn given_failing_then_two_affirmative_when_pairing_then_second_wins_and_third_untouched() {
    // GIVEN: P1 answers 500, P2 and P3 are both affirmative
    let p1 = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pair"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"ok": false})))
        .expect(1)
        .mount(&p1)
        .await;
    let p2 = MockServer::start().await;
    affirmative(&p2, "/p2/com.serp.companion.json", 1).await;
    let p3 = MockServer::start().await;
    affirmative(&p3, "/p3/com.serp.companion.json", 0).await;

    let prober =
        PairProber::new(vec![candidate(&p1), candidate(&p2), candidate(&p3)], PROBE_TIMEOUT)
            .expect("client");

    // WHEN: Pairing
    let pairing = prober.pair(IDENTITY).await.expect("no error");

    // THEN: P2's manifest; mock expectations verify P3 was never called
    let pairing = pairing.expect("paired");
    assert_eq!(pairing.endpoint, candidate(&p2));
    assert_eq!(pairing.manifest, "/p2/com.serp.companion.json");
}

/// **VALUE**: Verifies that no reachable pair server is `Ok(None)`, not an error.
///
/// **WHY THIS MATTERS**: The companion is often simply not running yet. Callers show a
/// hint and retry later; an error would be reported as a failure.
///
/// **BUG THIS CATCHES**: Would catch a refused connection, a non-affirmative body or a
/// malformed body aborting the scan with an error.
#[tokio::test]
async fn given_all_candidates_failing_when_pairing_then_no_endpoint_without_error() {
    // GIVEN: A closed port, a refusal, and a malformed body
    let refusing = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pair"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"ok": false, "error": "bad_ext"})),
        )
        .mount(&refusing)
        .await;
    let garbled = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pair"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>nope</html>"))
        .mount(&garbled)
        .await;

    let prober = PairProber::new(
        vec![
            CandidateEndpoint::new("127.0.0.1", closed_port()),
            candidate(&refusing),
            candidate(&garbled),
        ],
        PROBE_TIMEOUT,
    )
    .expect("client");

    // WHEN / THEN: No endpoint, no error
    assert_eq!(prober.pair(IDENTITY).await.expect("no error"), None);
}

/// **VALUE**: Verifies that a slow candidate is abandoned after the probe timeout and the
/// next one is tried.
///
/// **WHY THIS MATTERS**: A hung process on a preferred port must not block pairing forever.
///
/// **BUG THIS CATCHES**: Would catch a missing per-request timeout.
#[tokio::test]
async fn given_slow_candidate_when_pairing_then_times_out_and_moves_on() {
    let slow = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pair"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"ok": true, "manifest": "/slow.json"}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&slow)
        .await;
    let fast = MockServer::start().await;
    affirmative(&fast, "/fast.json", 1).await;

    let prober = PairProber::new(vec![candidate(&slow), candidate(&fast)], PROBE_TIMEOUT)
        .expect("client");

    let pairing = prober.pair(IDENTITY).await.expect("no error").expect("paired");

    assert_eq!(pairing.manifest, "/fast.json");
}

#[tokio::test]
async fn given_affirmative_without_manifest_when_pairing_then_candidate_skipped() {
    let incomplete = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pair"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&incomplete)
        .await;

    let prober = PairProber::new(vec![candidate(&incomplete)], PROBE_TIMEOUT).expect("client");

    assert_eq!(prober.pair(IDENTITY).await.expect("no error"), None);
}

/// **VALUE**: Verifies that the health report is parsed from a paired endpoint.
///
/// **BUG THIS CATCHES**: Would catch a wrong path or field names in `HealthResponse`.
#[tokio::test]
async fn given_healthy_companion_when_checking_health_then_report_returned() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true, "root": "/opt/serp", "bin": "/opt/serp/bin", "manifest": "/m.json"
        })))
        .mount(&server)
        .await;
    let prober = PairProber::new(Vec::new(), PROBE_TIMEOUT).expect("client");

    let health = prober
        .check_health(&candidate(&server))
        .await
        .expect("health");

    assert!(health.ok);
    assert_eq!(health.root.as_deref(), Some("/opt/serp"));
    assert_eq!(health.manifest.as_deref(), Some("/m.json"));
}

#[tokio::test]
async fn given_unreachable_companion_when_checking_health_then_none() {
    let prober = PairProber::new(Vec::new(), PROBE_TIMEOUT).expect("client");

    let endpoint = CandidateEndpoint::new("127.0.0.1", closed_port());

    assert!(prober.check_health(&endpoint).await.is_none());
}
