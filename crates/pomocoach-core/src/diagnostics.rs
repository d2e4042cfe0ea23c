//! Drift and consistency diagnostics for auto-status heartbeats.
//!
//! A heartbeat reads the session twice: once to build the status it reports
//! and once more to re-derive what the remaining time should be. If a phase
//! transition or pause slips in between, the two disagree and the
//! disagreement is reported here rather than raised as an error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::{Session, SessionStatus};

/// Discrepancies up to this many minutes are accurate.
pub const ACCURATE_THRESHOLD_MINUTES: f64 = 1.0;

/// Discrepancies up to this many minutes are drift; beyond is an error.
pub const DRIFT_THRESHOLD_MINUTES: f64 = 5.0;

/// Number of diagnostic lines surfaced when consistency is in question.
pub const HIGHLIGHT_LIMIT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerAccuracy {
    Accurate,
    Drift,
    Error,
}

impl TimerAccuracy {
    /// Classify a remaining-time discrepancy in minutes. Sign is ignored and
    /// both thresholds are inclusive.
    pub fn classify(discrepancy_minutes: f64) -> Self {
        let d = discrepancy_minutes.abs();
        if d <= ACCURATE_THRESHOLD_MINUTES {
            TimerAccuracy::Accurate
        } else if d <= DRIFT_THRESHOLD_MINUTES {
            TimerAccuracy::Drift
        } else {
            TimerAccuracy::Error
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicCheck {
    pub timer_accuracy: TimerAccuracy,
    pub session_consistency: bool,
    pub expected_remaining_ms: u64,
    pub reported_remaining_ms: u64,
    /// Reported minus expected, in minutes.
    pub discrepancy_minutes: f64,
    /// Anomalies first, then session age and current phase.
    pub diagnostics: Vec<String>,
}

impl LogicCheck {
    pub fn is_healthy(&self) -> bool {
        self.session_consistency && self.timer_accuracy == TimerAccuracy::Accurate
    }

    /// The diagnostic lines worth showing: the first few when consistency
    /// is a concern, all of them otherwise.
    pub fn highlights(&self) -> &[String] {
        if self.session_consistency {
            &self.diagnostics
        } else {
            let n = self.diagnostics.len().min(HIGHLIGHT_LIMIT);
            &self.diagnostics[..n]
        }
    }
}

/// Compare a reported status against the session it was derived from.
pub fn check_logic(session: &Session, status: &SessionStatus, now: DateTime<Utc>) -> LogicCheck {
    let expected_remaining_ms = session.remaining_ms(now);
    let discrepancy_minutes =
        (status.remaining_ms as f64 - expected_remaining_ms as f64) / 60_000.0;
    let timer_accuracy = TimerAccuracy::classify(discrepancy_minutes);

    let mut diagnostics = Vec::new();
    let mut session_consistency = true;

    if timer_accuracy != TimerAccuracy::Accurate {
        diagnostics.push(format!(
            "Timer {}: reported {:.1} min remaining, expected {:.1} min ({:+.1} min)",
            match timer_accuracy {
                TimerAccuracy::Drift => "drift",
                _ => "error",
            },
            status.remaining_minutes(),
            expected_remaining_ms as f64 / 60_000.0,
            discrepancy_minutes,
        ));
    }
    if status.phase != session.phase {
        session_consistency = false;
        diagnostics.push(format!(
            "Phase mismatch: status reports {}, session is in {}",
            status.phase, session.phase
        ));
    }
    if status.completed_pomodoros != session.completed_pomodoros {
        session_consistency = false;
        diagnostics.push(format!(
            "Pomodoro count mismatch: status reports {}, session has {}",
            status.completed_pomodoros, session.completed_pomodoros
        ));
    }
    if session.is_paused && status.is_active {
        session_consistency = false;
        diagnostics.push("Session is paused but status reports it active".to_string());
    }

    diagnostics.push(format!("Session age: {:.1} min", session.age_minutes(now)));
    diagnostics.push(format!(
        "Current phase: {} ({:.1} min remaining)",
        session.phase,
        expected_remaining_ms as f64 / 60_000.0
    ));

    LogicCheck {
        timer_accuracy,
        session_consistency,
        expected_remaining_ms,
        reported_remaining_ms: status.remaining_ms,
        discrepancy_minutes,
        diagnostics,
    }
}
