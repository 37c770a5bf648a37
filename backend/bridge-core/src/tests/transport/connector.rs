use crate::COMPANION_BINARY;
use crate::transport::ProcessConnector;

use std::ffi::OsStr;

/// **VALUE**: Verifies that the companion command is built with the configured program
/// and arguments.
///
/// **WHY THIS MATTERS**: Browsers launch native hosts with the extension origin as an
/// argument and companions rely on it.
///
/// **BUG THIS CATCHES**: Would catch arguments being dropped or the program replaced.
#[test]
fn given_program_and_args_when_building_command_then_both_are_set() {
    // GIVEN: A connector with one argument
    let connector = ProcessConnector::new(
        COMPANION_BINARY,
        vec![String::from("chrome-extension://abc/")],
        "com.serp.companion",
    );

    // WHEN: Building the command
    let cmd = connector.build_command(connector.program());

    // THEN: Program and args are as configured
    let std_cmd = cmd.as_std();
    assert_eq!(std_cmd.get_program(), COMPANION_BINARY);
    let args: Vec<&OsStr> = std_cmd.get_args().collect();
    assert_eq!(args, vec![OsStr::new("chrome-extension://abc/")]);
}
