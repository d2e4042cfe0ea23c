//! Phase state machine.
//!
//! ```text
//! Work --(n % interval != 0)--> ShortBreak --> Work
//! Work --(n % interval == 0)--> LongBreak  --> Work
//! ```
//!
//! `n` is the completed-pomodoro count after the finished work phase has
//! been counted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::{Phase, PomodoroConfig, Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub previous_phase: Phase,
    pub next_phase: Phase,
    /// Minutes allotted to `next_phase`.
    pub next_duration: u32,
}

/// Decide which phase follows `current`.
pub fn next_phase(current: Phase, completed_pomodoros: u32, config: &PomodoroConfig) -> PhaseTransition {
    let next = match current {
        Phase::Work => {
            let interval = config.long_break_interval.max(1);
            if completed_pomodoros % interval == 0 {
                Phase::LongBreak
            } else {
                Phase::ShortBreak
            }
        }
        Phase::ShortBreak | Phase::LongBreak => Phase::Work,
    };
    PhaseTransition {
        previous_phase: current,
        next_phase: next,
        next_duration: config.duration_for(next),
    }
}

/// Finish the session's current phase at `now` and enter the next one.
///
/// Counts the pomodoro for a finished work phase, then resets `start_time`
/// so the remaining-time formula only ever sees the new phase.
pub fn complete_phase(session: &mut Session, now: DateTime<Utc>) -> PhaseTransition {
    if session.phase == Phase::Work {
        session.completed_pomodoros += 1;
        session.focused_minutes += u64::from(session.duration);
    }
    let transition = next_phase(session.phase, session.completed_pomodoros, &session.config);
    session.phase = transition.next_phase;
    session.duration = transition.next_duration;
    session.start_time = now;
    transition
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;

    fn config(interval: u32) -> PomodoroConfig {
        PomodoroConfig {
            long_break_interval: interval,
            ..PomodoroConfig::default()
        }
    }

    #[test]
    fn work_goes_to_short_break() {
        let t = next_phase(Phase::Work, 1, &config(4));
        assert_eq!(t.next_phase, Phase::ShortBreak);
        assert_eq!(t.next_duration, 5);
    }

    #[test]
    fn fourth_pomodoro_earns_long_break() {
        let t = next_phase(Phase::Work, 4, &config(4));
        assert_eq!(t.next_phase, Phase::LongBreak);
        assert_eq!(t.next_duration, 15);
    }

    #[test]
    fn breaks_return_to_work() {
        for phase in [Phase::ShortBreak, Phase::LongBreak] {
            let t = next_phase(phase, 3, &config(4));
            assert_eq!(t.previous_phase, phase);
            assert_eq!(t.next_phase, Phase::Work);
            assert_eq!(t.next_duration, 25);
        }
    }

    #[test]
    fn zero_interval_does_not_divide_by_zero() {
        let t = next_phase(Phase::Work, 3, &config(0));
        assert_eq!(t.next_phase, Phase::LongBreak);
    }

    #[test]
    fn complete_phase_resets_start_time() {
        let start = Utc::now();
        let mut session = Session::new("u1", "c1", config(2), start);
        let later = start + Duration::minutes(25);

        let t = complete_phase(&mut session, later);
        assert_eq!(t.next_phase, Phase::ShortBreak);
        assert_eq!(session.completed_pomodoros, 1);
        assert_eq!(session.focused_minutes, 25);
        assert_eq!(session.start_time, later);
        assert_eq!(session.duration, 5);
        assert_eq!(session.remaining_ms(later), 5 * 60_000);

        complete_phase(&mut session, later + Duration::minutes(5));
        assert_eq!(session.phase, Phase::Work);
        assert_eq!(session.completed_pomodoros, 1);
    }

    proptest! {
        #[test]
        fn n_work_completions_count_n_and_long_break_iff_divisible(
            n in 1u32..40,
            interval in 1u32..8,
        ) {
            let start = Utc::now();
            let mut session = Session::new("u", "c", config(interval), start);
            let mut now = start;
            for i in 1..=n {
                now += Duration::minutes(i64::from(session.duration));
                let t = complete_phase(&mut session, now);
                prop_assert_eq!(session.completed_pomodoros, i);
                let expect_long = i % interval == 0;
                prop_assert_eq!(t.next_phase == Phase::LongBreak, expect_long);
                prop_assert!(t.next_phase.is_break());

                now += Duration::minutes(i64::from(session.duration));
                let back = complete_phase(&mut session, now);
                prop_assert_eq!(back.next_phase, Phase::Work);
                prop_assert_eq!(session.completed_pomodoros, i);
            }
        }
    }
}
