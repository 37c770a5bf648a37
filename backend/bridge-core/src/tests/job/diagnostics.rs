use crate::job::DiagnosticLog;

/// **VALUE**: Verifies that the log keeps only the newest lines once full.
///
/// **WHY THIS MATTERS**: `job.log` events arrive for every line of downloader output. An
/// unbounded log would grow for the whole length of a course download.
///
/// **BUG THIS CATCHES**: Would catch evicting the newest line instead of the oldest.
#[test]
fn given_full_log_when_pushing_then_oldest_line_is_evicted() {
    // GIVEN: A log with room for two lines
    let mut log = DiagnosticLog::new(2);
    log.push("first");
    log.push("second");

    // WHEN: Pushing a third line
    log.push("third");

    // THEN: The oldest is gone
    assert_eq!(log.to_vec(), vec!["second", "third"]);
    assert_eq!(log.last(), Some("third"));
}

#[test]
fn given_zero_capacity_when_created_then_keeps_one_line() {
    let mut log = DiagnosticLog::new(0);
    log.push("a");
    log.push("b");
    assert_eq!(log.capacity(), 1);
    assert_eq!(log.lines().collect::<Vec<_>>(), vec!["b"]);
}
