//! Integration tests for heartbeat drift diagnostics.

use chrono::{Duration, TimeZone, Utc};
use pomocoach_core::{check_logic, Phase, PomodoroConfig, Session, TimerAccuracy};

fn session() -> Session {
    let start = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
    Session::new("u1", "c1", PomodoroConfig::default(), start)
}

#[test]
fn test_drift_boundaries() {
    let s = session();
    let now = s.start_time + Duration::minutes(10);
    let expected = s.remaining_ms(now);

    let cases = [
        (0_i64, TimerAccuracy::Accurate),
        (60_000, TimerAccuracy::Accurate),
        (-60_000, TimerAccuracy::Accurate),
        (60_001, TimerAccuracy::Drift),
        (300_000, TimerAccuracy::Drift),
        (-300_000, TimerAccuracy::Drift),
        (300_001, TimerAccuracy::Error),
        (-600_000, TimerAccuracy::Error),
    ];
    for (offset_ms, accuracy) in cases {
        let mut status = s.status(now);
        status.remaining_ms = (expected as i64 + offset_ms) as u64;
        let check = check_logic(&s, &status, now);
        assert_eq!(check.timer_accuracy, accuracy, "offset {offset_ms} ms");
        assert!(check.session_consistency);
    }
}

#[test]
fn test_phase_change_between_reads_is_flagged() {
    let mut s = session();
    let before = s.start_time + Duration::minutes(25);
    let status = s.status(before);

    pomocoach_core::timer::complete_phase(&mut s, before);
    let check = check_logic(&s, &status, before);

    assert!(!check.session_consistency);
    assert!(!check.is_healthy());
    assert_eq!(s.phase, Phase::ShortBreak);
    assert!(check.highlights().len() <= 3);
    assert!(check.highlights()[0].contains("drift") || check.highlights()[0].contains("mismatch"));
}

#[test]
fn test_paused_session_reported_active_is_inconsistent() {
    let mut s = session();
    let now = s.start_time + Duration::minutes(5);
    let status = s.status(now);
    s.pause(now);

    let check = check_logic(&s, &status, now);
    assert_eq!(check.timer_accuracy, TimerAccuracy::Accurate);
    assert!(!check.session_consistency);
    assert!(check
        .diagnostics
        .iter()
        .any(|d| d.contains("paused but status reports it active")));
}

#[test]
fn test_healthy_check_lists_age_and_phase() {
    let s = session();
    let now = s.start_time + Duration::minutes(3);
    let check = check_logic(&s, &s.status(now), now);
    assert!(check.is_healthy());
    assert_eq!(check.discrepancy_minutes, 0.0);
    assert_eq!(check.diagnostics.len(), 2);
    assert!(check.diagnostics[0].starts_with("Session age: 3.0"));
    assert!(check.diagnostics[1].starts_with("Current phase: work"));
}
