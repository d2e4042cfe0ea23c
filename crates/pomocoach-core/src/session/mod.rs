//! Per-user session state.
//!
//! A [`Session`] is the single source of truth for one user's current phase,
//! its timing and its configuration. Remaining time is never stored; it is
//! derived from `start_time`, `duration` and `paused_at` so that pausing,
//! resuming and phase transitions cannot let it drift.

mod config;
mod store;

pub use config::{ConfigPatch, PomodoroConfig};
pub use store::{ArmedTimer, SessionSlot, SessionStore, TimerHandles};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Work,
    ShortBreak,
    LongBreak,
}

impl Phase {
    pub fn is_break(self) -> bool {
        !matches!(self, Phase::Work)
    }

    pub fn label(self) -> &'static str {
        match self {
            Phase::Work => "work",
            Phase::ShortBreak => "short-break",
            Phase::LongBreak => "long-break",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Mutable state of one user's Pomodoro run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub channel_id: String,
    #[serde(default)]
    pub thread_id: Option<String>,
    pub phase: Phase,
    /// Beginning of the current phase. Reset on every transition and
    /// shifted forward by the paused span on resume.
    pub start_time: DateTime<Utc>,
    /// Minutes allotted to the current phase, fixed at phase start.
    pub duration: u32,
    pub completed_pomodoros: u32,
    pub is_paused: bool,
    /// Set if and only if `is_paused`.
    #[serde(default)]
    pub paused_at: Option<DateTime<Utc>>,
    pub config: PomodoroConfig,
    pub created_at: DateTime<Utc>,
    /// Sum of the durations of completed work phases.
    #[serde(default)]
    pub focused_minutes: u64,
}

impl Session {
    /// A fresh session in the work phase.
    pub fn new(
        user_id: impl Into<String>,
        channel_id: impl Into<String>,
        config: PomodoroConfig,
        now: DateTime<Utc>,
    ) -> Self {
        let config = config.normalized();
        Self {
            user_id: user_id.into(),
            channel_id: channel_id.into(),
            thread_id: None,
            phase: Phase::Work,
            start_time: now,
            duration: config.work_duration,
            completed_pomodoros: 0,
            is_paused: false,
            paused_at: None,
            config,
            created_at: now,
            focused_minutes: 0,
        }
    }

    /// Total length of the current phase in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        u64::from(self.duration).saturating_mul(60_000)
    }

    /// Milliseconds left in the current phase, never negative.
    ///
    /// While paused, elapsed time is measured up to `paused_at`, which is
    /// what freezes the countdown.
    pub fn remaining_ms(&self, now: DateTime<Utc>) -> u64 {
        let reference = match (self.is_paused, self.paused_at) {
            (true, Some(paused_at)) => paused_at,
            _ => now,
        };
        let elapsed = (reference - self.start_time).num_milliseconds().max(0) as u64;
        self.duration_ms().saturating_sub(elapsed)
    }

    pub fn pause(&mut self, now: DateTime<Utc>) {
        self.is_paused = true;
        self.paused_at = Some(now);
    }

    /// Clear the pause and move `start_time` forward by the paused span, so
    /// the countdown continues from the value it was frozen at.
    pub fn resume(&mut self, now: DateTime<Utc>) {
        if let Some(paused_at) = self.paused_at.take() {
            let paused_for = now - paused_at;
            if paused_for > chrono::Duration::zero() {
                self.start_time += paused_for;
            }
        }
        self.is_paused = false;
    }

    /// Minutes since the session was created.
    pub fn age_minutes(&self, now: DateTime<Utc>) -> f64 {
        (now - self.created_at).num_milliseconds().max(0) as f64 / 60_000.0
    }

    pub fn status(&self, now: DateTime<Utc>) -> SessionStatus {
        SessionStatus {
            is_active: !self.is_paused,
            remaining_ms: self.remaining_ms(now),
            phase: self.phase,
            completed_pomodoros: self.completed_pomodoros,
            is_paused: self.is_paused,
        }
    }

    pub fn stats(&self, now: DateTime<Utc>) -> SessionStats {
        SessionStats {
            completed_pomodoros: self.completed_pomodoros,
            focused_minutes: self.focused_minutes,
            session_minutes: self.age_minutes(now).floor() as u64,
            final_phase: self.phase,
            was_paused: self.is_paused,
        }
    }
}

/// Read-only view of a session at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub is_active: bool,
    pub remaining_ms: u64,
    pub phase: Phase,
    pub completed_pomodoros: u32,
    pub is_paused: bool,
}

impl SessionStatus {
    pub fn remaining_minutes(&self) -> f64 {
        self.remaining_ms as f64 / 60_000.0
    }
}

/// Summary returned when a session is stopped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub completed_pomodoros: u32,
    pub focused_minutes: u64,
    /// Whole minutes between session creation and stop.
    pub session_minutes: u64,
    pub final_phase: Phase,
    pub was_paused: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    #[test]
    fn new_session_starts_in_work() {
        let s = Session::new("u1", "c1", PomodoroConfig::default(), t0());
        assert_eq!(s.phase, Phase::Work);
        assert_eq!(s.duration, 25);
        assert_eq!(s.completed_pomodoros, 0);
        assert!(!s.is_paused);
        assert!(s.paused_at.is_none());
        assert_eq!(s.remaining_ms(t0()), 25 * 60_000);
    }

    #[test]
    fn remaining_never_negative() {
        let s = Session::new("u1", "c1", PomodoroConfig::default(), t0());
        assert_eq!(s.remaining_ms(t0() + Duration::hours(3)), 0);
    }

    #[test]
    fn pause_freezes_and_resume_continues() {
        let mut s = Session::new("u1", "c1", PomodoroConfig::default(), t0());
        s.pause(t0() + Duration::minutes(10));
        let frozen = s.remaining_ms(t0() + Duration::minutes(10));
        assert_eq!(frozen, 15 * 60_000);
        assert_eq!(s.remaining_ms(t0() + Duration::minutes(90)), frozen);

        s.resume(t0() + Duration::minutes(90));
        assert!(s.paused_at.is_none());
        assert!(!s.is_paused);
        assert_eq!(s.remaining_ms(t0() + Duration::minutes(90)), frozen);
        assert_eq!(
            s.remaining_ms(t0() + Duration::minutes(95)),
            10 * 60_000
        );
    }

    #[test]
    fn status_reflects_pause() {
        let mut s = Session::new("u1", "c1", PomodoroConfig::default(), t0());
        assert!(s.status(t0()).is_active);
        s.pause(t0());
        let status = s.status(t0());
        assert!(!status.is_active);
        assert!(status.is_paused);
        assert_eq!(status.remaining_minutes(), 25.0);
    }

    #[test]
    fn phase_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_string(&Phase::ShortBreak).unwrap(),
            "\"short-break\""
        );
        assert_eq!(Phase::LongBreak.to_string(), "long-break");
        assert!(Phase::LongBreak.is_break());
        assert!(!Phase::Work.is_break());
    }

    #[test]
    fn stats_report_age_and_focus() {
        let mut s = Session::new("u1", "c1", PomodoroConfig::default(), t0());
        s.completed_pomodoros = 2;
        s.focused_minutes = 50;
        let stats = s.stats(t0() + Duration::seconds(61 * 60 + 30));
        assert_eq!(stats.completed_pomodoros, 2);
        assert_eq!(stats.focused_minutes, 50);
        assert_eq!(stats.session_minutes, 61);
        assert_eq!(stats.final_phase, Phase::Work);
    }
}
