use crate::ErrorLocation;

use std::panic::Location;

#[track_caller]
fn capture() -> ErrorLocation {
    ErrorLocation::from(Location::caller())
}

/// **VALUE**: Verifies that `ErrorLocation::from()` records the caller of a `#[track_caller]` fn.
///
/// **WHY THIS MATTERS**: Every bridge error embeds a location. If propagation breaks, all of
/// them point at the helper instead of the failing call site.
///
/// **BUG THIS CATCHES**: Would catch `#[track_caller]` being dropped from error constructors.
#[test]
fn given_track_caller_helper_when_called_then_captures_call_site() {
    // GIVEN / WHEN: Capturing through a tracked helper
    let expected_line = line!() + 1;
    let location = capture();

    // THEN: The call site in this file is recorded
    assert!(location.file.ends_with("error_location.rs"));
    assert_eq!(location.line, expected_line);
    assert!(location.column > 0);
}

/// **VALUE**: Verifies the `[file:line:column]` display format.
///
/// **WHY THIS MATTERS**: Log lines are grepped by this format.
///
/// **BUG THIS CATCHES**: Would catch the brackets or separators changing.
#[test]
fn given_error_location_when_formatted_then_produces_bracketed_format() {
    // GIVEN: A fixed location
    let location = ErrorLocation {
        file: "src/transport/channel.rs",
        line: 42,
        column: 7,
    };

    // WHEN / THEN
    assert_eq!(location.to_string(), "[src/transport/channel.rs:42:7]");
}

#[track_caller]
fn capture_with_shorthand() -> ErrorLocation {
    ErrorLocation::caller()
}

/// **VALUE**: Verifies that `ErrorLocation::caller()` matches the long form.
///
/// **WHY THIS MATTERS**: Both constructors are used across the workspace.
///
/// **BUG THIS CATCHES**: Would catch `caller()` losing `#[track_caller]` and reporting its own line.
#[test]
fn given_shorthand_constructor_when_called_then_captures_call_site() {
    // GIVEN / WHEN
    let expected_line = line!() + 1;
    let location = capture_with_shorthand();

    // THEN
    assert!(location.file.ends_with("error_location.rs"));
    assert_eq!(location.line, expected_line);
}
