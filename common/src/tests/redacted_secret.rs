// Unit tests for RedactedSecret
// Tests that bearer credentials never leak through formatting or serde

use crate::redacted_secret::serialize_exposed;
use crate::{HttpStatusCode, RedactedSecret};

use serde::Serialize;

#[derive(Serialize)]
struct Carrier {
    #[serde(serialize_with = "serialize_exposed")]
    bearer: Option<RedactedSecret>,
}

/// **VALUE**: Verifies that Debug and Display never print the secret.
///
/// **WHY THIS MATTERS**: Start payloads are logged at debug level. A bearer token in a
/// log file is a credential leak.
///
/// **BUG THIS CATCHES**: Would catch a derived Debug replacing the manual impl.
#[test]
fn given_secret_when_formatted_then_value_is_redacted() {
    // GIVEN: A secret
    let secret = RedactedSecret::new("tok-123456");

    // WHEN: Formatting with Debug and Display
    let debug = format!("{secret:?}");
    let display = format!("{secret}");

    // THEN: Neither contains the value
    assert!(!debug.contains("tok-123456"));
    assert!(!display.contains("tok-123456"));
    assert_eq!(secret.len(), 10);
}

/// **VALUE**: Verifies that plain serialization of the secret fails.
///
/// **WHY THIS MATTERS**: Serializing a struct holding a secret must be an explicit decision.
///
/// **BUG THIS CATCHES**: Would catch a derived Serialize sneaking in.
#[test]
fn given_secret_when_serialized_directly_then_returns_error() {
    // GIVEN: A secret
    let secret = RedactedSecret::new("tok");

    // WHEN: Serializing it directly
    let result = serde_json::to_string(&secret);

    // THEN: Serialization is refused without echoing the value
    let error = result.expect_err("Direct serialization must be refused").to_string();
    assert!(error.contains("3 bytes"), "Unexpected message: {error}");
    assert!(!error.contains("tok"), "Secret leaked into error: {error}");
}

/// **VALUE**: Verifies that the opt-in helper writes the real value.
///
/// **WHY THIS MATTERS**: The companion needs the actual bearer to retry with it.
///
/// **BUG THIS CATCHES**: Would catch the helper writing the redacted Display form.
#[test]
fn given_carrier_with_secret_when_serialized_then_exposes_value() {
    // GIVEN: A carrier with and without a secret
    let with = Carrier {
        bearer: Some(RedactedSecret::new("tok")),
    };
    let without = Carrier { bearer: None };

    // WHEN: Serializing
    let with_json = serde_json::to_string(&with).unwrap();
    let without_json = serde_json::to_string(&without).unwrap();

    // THEN: Real value and null respectively
    assert_eq!(with_json, r#"{"bearer":"tok"}"#);
    assert_eq!(without_json, r#"{"bearer":null}"#);
}

#[test]
fn given_status_codes_when_classified_then_ranges_match() {
    assert!(HttpStatusCode(204).is_success());
    assert!(HttpStatusCode::from(400).is_client_error());
    assert!(HttpStatusCode(500).is_server_error());
    assert!(!HttpStatusCode(302).is_success());
    assert_eq!(HttpStatusCode(404).to_string(), "404");
}
