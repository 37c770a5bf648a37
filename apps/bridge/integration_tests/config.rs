use serp_bridge::config::AppConfig;
use serp_bridge::error::ConfigError;

use bridge_core::DEFAULT_PAIR_PORTS;

use std::fs::write;
use std::time::Duration;

use log::LevelFilter;

/// **VALUE**: Verifies that a missing config file yields the documented defaults.
///
/// **WHY THIS MATTERS**: First start has no file. Defaults decide which companion is
/// spawned and which ports are probed.
///
/// **BUG THIS CATCHES**: Would catch a missing file being treated as an error, or the
/// default port list drifting from the one the companion uses.
#[test]
fn given_no_config_file_when_loading_then_defaults() {
    // GIVEN: An empty directory
    let dir = tempfile::tempdir().expect("temp dir");

    // WHEN: Loading
    let config = AppConfig::load(dir.path()).expect("defaults");

    // THEN: Defaults
    assert_eq!(config, AppConfig::default());
    assert_eq!(config.pairing.ports, DEFAULT_PAIR_PORTS.to_vec());
    assert_eq!(config.companion.program, "serp-companion");
    assert_eq!(config.jobs.fallback_browser, "chrome");
    assert_eq!(config.probe_timeout(), Duration::from_secs(2));
}

/// **VALUE**: Verifies the save/load cycle including the generated pairing identity.
///
/// **WHY THIS MATTERS**: The pair server registers the manifest under this identity; if
/// it changed on every start the companion would accumulate stale registrations.
///
/// **BUG THIS CATCHES**: Would catch the identity not being persisted, or being
/// regenerated when one already exists.
#[test]
fn given_generated_identity_when_saved_and_reloaded_then_identity_is_stable() {
    // GIVEN: Defaults with a generated identity, saved
    let dir = tempfile::tempdir().expect("temp dir");
    let mut config = AppConfig::default();
    assert!(config.ensure_self_identity());
    config.jobs.caption_lang = String::from("de");
    config.save(dir.path()).expect("save");

    // WHEN: Reloading
    let mut reloaded = AppConfig::load(dir.path()).expect("load");

    // THEN: Same values, and no new identity is generated
    assert_eq!(reloaded, config);
    assert!(!reloaded.ensure_self_identity());
    assert_eq!(reloaded.pairing.self_identity, config.pairing.self_identity);
    assert!(!dir.path().join("config.json.tmp").exists(), "Temp file must be renamed");
}

#[test]
fn given_partial_file_when_loading_then_missing_sections_default() {
    let dir = tempfile::tempdir().expect("temp dir");
    write(
        dir.path().join("config.json"),
        r#"{"version": 1, "pairing": {"ports": [60123]}}"#,
    )
    .expect("write");

    let config = AppConfig::load(dir.path()).expect("load");

    assert_eq!(config.pairing.ports, vec![60123]);
    assert_eq!(config.pairing.host, "127.0.0.1");
    assert_eq!(config.jobs.max_diagnostic_lines, 500);
}

/// **VALUE**: Verifies that invalid values are rejected on load.
///
/// **BUG THIS CATCHES**: Would catch validation being skipped, which would make pairing
/// silently probe nothing or time out instantly.
#[test]
fn given_invalid_values_when_loading_then_validation_error() {
    let cases = [
        r#"{"version": 0}"#,
        r#"{"version": 99}"#,
        r#"{"companion": {"program": "  "}}"#,
        r#"{"pairing": {"ports": []}}"#,
        r#"{"pairing": {"ports": [0, 60123]}}"#,
        r#"{"pairing": {"probe_timeout_ms": 0}}"#,
        r#"{"pairing": {"probe_timeout_ms": 60001}}"#,
        r#"{"jobs": {"fallback_browser": ""}}"#,
        r#"{"jobs": {"max_diagnostic_lines": 0}}"#,
        r#"{"logging": {"level": "loud"}}"#,
        r#"{"logging": {"companion_stderr": "verbose"}}"#,
    ];

    for case in cases {
        let dir = tempfile::tempdir().expect("temp dir");
        write(dir.path().join("config.json"), case).expect("write");

        let result = AppConfig::load(dir.path());

        assert!(
            matches!(result, Err(ConfigError::ValidationError { .. })),
            "Expected validation error for {case}, got {result:?}"
        );
    }
}

#[test]
fn given_corrupted_file_when_loading_then_parse_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    write(dir.path().join("config.json"), "{not json").expect("write");

    assert!(matches!(
        AppConfig::load(dir.path()),
        Err(ConfigError::ParseError { .. })
    ));
}

/// **VALUE**: Verifies that config values flow into the bridge components.
///
/// **BUG THIS CATCHES**: Would catch host or port order being lost on the way to the prober.
#[test]
fn given_custom_pairing_when_building_candidates_then_order_and_host_kept() {
    let mut config = AppConfig::default();
    config.pairing.host = String::from("localhost");
    config.pairing.ports = vec![3, 1, 2];
    config.jobs.fallback_browser = String::from("firefox");

    let ports: Vec<u16> = config.candidates().iter().map(|c| c.port).collect();

    assert_eq!(ports, vec![3, 1, 2]);
    assert!(config.candidates().iter().all(|c| c.host == "localhost"));
    assert_eq!(config.bridge_settings().fallback_browser, "firefox");
    assert_eq!(
        config.connector().program(),
        std::path::Path::new("serp-companion")
    );
}

/// **VALUE**: Verifies that the `logging` section resolves to logger settings.
///
/// **WHY THIS MATTERS**: Users turn on companion stderr when a download misbehaves.
/// Level names are accepted case-insensitively, as the `log` crate parses them.
///
/// **BUG THIS CATCHES**: Would catch the stderr level being ignored or unset values
/// failing instead of falling back.
#[test]
fn given_logging_section_when_resolving_then_levels_applied() {
    let dir = tempfile::tempdir().expect("temp dir");
    write(
        dir.path().join("config.json"),
        r#"{"logging": {"level": "WARN", "companion_stderr": "trace"}}"#,
    )
    .expect("write");

    let config = AppConfig::load(dir.path()).expect("load");
    let settings = config.log_settings().expect("settings");

    assert_eq!(settings.level, LevelFilter::Warn);
    assert_eq!(settings.companion_stderr, LevelFilter::Trace);

    let defaults = AppConfig::default().log_settings().expect("defaults");
    assert_eq!(defaults.companion_stderr, LevelFilter::Off);
}
