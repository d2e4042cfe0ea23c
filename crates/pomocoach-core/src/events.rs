use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::diagnostics::LogicCheck;
use crate::session::{Phase, SessionStatus};

/// Sent once per finished phase, after the session has moved on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseCompletionNotification {
    pub user_id: String,
    pub channel_id: String,
    #[serde(default)]
    pub thread_id: Option<String>,
    pub previous_phase: Phase,
    pub next_phase: Phase,
    /// Minutes allotted to `next_phase`.
    pub next_duration: u32,
    pub completed_pomodoros: u32,
    /// Coaching text for the phase being entered, when a hook produced one.
    #[serde(default)]
    pub coaching: Option<String>,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub start_time: DateTime<Utc>,
    pub current_phase: Phase,
    /// Minutes until the current phase ends.
    pub next_phase_in: f64,
}

/// Periodic heartbeat emitted while auto-status is enabled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoStatusUpdate {
    pub user_id: String,
    pub channel_id: String,
    #[serde(default)]
    pub thread_id: Option<String>,
    pub status: SessionStatus,
    pub session_info: SessionInfo,
    #[serde(default)]
    pub logic_check: Option<LogicCheck>,
    pub timestamp: DateTime<Utc>,
}

/// Everything the scheduler hands to a notification sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    PhaseCompletion(PhaseCompletionNotification),
    AutoStatus(AutoStatusUpdate),
}

impl Notification {
    pub fn user_id(&self) -> &str {
        match self {
            Notification::PhaseCompletion(n) => &n.user_id,
            Notification::AutoStatus(n) => &n.user_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Notification::PhaseCompletion(_) => "phase_completion",
            Notification::AutoStatus(_) => "auto_status",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_is_tagged() {
        let n = Notification::PhaseCompletion(PhaseCompletionNotification {
            user_id: "u1".into(),
            channel_id: "c1".into(),
            thread_id: None,
            previous_phase: Phase::Work,
            next_phase: Phase::ShortBreak,
            next_duration: 5,
            completed_pomodoros: 1,
            coaching: None,
            at: Utc::now(),
        });
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["type"], "phase_completion");
        assert_eq!(json["previous_phase"], "work");
        assert_eq!(json["next_phase"], "short-break");
        assert_eq!(n.user_id(), "u1");
        assert_eq!(n.kind(), "phase_completion");
    }
}
