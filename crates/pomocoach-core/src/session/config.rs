//! Per-session timer configuration.

use serde::{Deserialize, Serialize};

use crate::coaching::CoachingStyle;
use crate::session::Phase;

/// Timer settings for one session. Durations and intervals are whole minutes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PomodoroConfig {
    #[serde(default = "default_work_duration")]
    pub work_duration: u32,
    #[serde(default = "default_short_break")]
    pub short_break_duration: u32,
    #[serde(default = "default_long_break")]
    pub long_break_duration: u32,
    /// Every n-th completed work phase is followed by a long break.
    #[serde(default = "default_long_break_interval")]
    pub long_break_interval: u32,
    /// Heartbeat period.
    #[serde(default = "default_auto_status_interval")]
    pub auto_status_interval: u32,
    #[serde(default)]
    pub enable_auto_status: bool,
    /// Attach drift diagnostics to every heartbeat.
    #[serde(default)]
    pub include_logic_checking: bool,
    #[serde(default)]
    pub coaching_style: CoachingStyle,
}

fn default_work_duration() -> u32 {
    25
}
fn default_short_break() -> u32 {
    5
}
fn default_long_break() -> u32 {
    15
}
fn default_long_break_interval() -> u32 {
    4
}
fn default_auto_status_interval() -> u32 {
    5
}

impl Default for PomodoroConfig {
    fn default() -> Self {
        Self {
            work_duration: default_work_duration(),
            short_break_duration: default_short_break(),
            long_break_duration: default_long_break(),
            long_break_interval: default_long_break_interval(),
            auto_status_interval: default_auto_status_interval(),
            enable_auto_status: false,
            include_logic_checking: false,
            coaching_style: CoachingStyle::default(),
        }
    }
}

impl PomodoroConfig {
    /// Configured length in minutes of `phase`.
    pub fn duration_for(&self, phase: Phase) -> u32 {
        match phase {
            Phase::Work => self.work_duration,
            Phase::ShortBreak => self.short_break_duration,
            Phase::LongBreak => self.long_break_duration,
        }
    }

    /// Clamp every duration and interval to at least one minute.
    ///
    /// A zero long-break interval would make the phase decision divide by
    /// zero and a zero duration would re-fire the phase timer immediately.
    pub fn normalized(mut self) -> Self {
        self.work_duration = self.work_duration.max(1);
        self.short_break_duration = self.short_break_duration.max(1);
        self.long_break_duration = self.long_break_duration.max(1);
        self.long_break_interval = self.long_break_interval.max(1);
        self.auto_status_interval = self.auto_status_interval.max(1);
        self
    }

    /// Merge the fields set in `patch`, returning the normalized result.
    pub fn merged(&self, patch: &ConfigPatch) -> Self {
        Self {
            work_duration: patch.work_duration.unwrap_or(self.work_duration),
            short_break_duration: patch
                .short_break_duration
                .unwrap_or(self.short_break_duration),
            long_break_duration: patch
                .long_break_duration
                .unwrap_or(self.long_break_duration),
            long_break_interval: patch
                .long_break_interval
                .unwrap_or(self.long_break_interval),
            auto_status_interval: patch
                .auto_status_interval
                .unwrap_or(self.auto_status_interval),
            enable_auto_status: patch.enable_auto_status.unwrap_or(self.enable_auto_status),
            include_logic_checking: patch
                .include_logic_checking
                .unwrap_or(self.include_logic_checking),
            coaching_style: patch.coaching_style.unwrap_or(self.coaching_style),
        }
        .normalized()
    }
}

/// Partial update for [`PomodoroConfig`]; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigPatch {
    #[serde(default)]
    pub work_duration: Option<u32>,
    #[serde(default)]
    pub short_break_duration: Option<u32>,
    #[serde(default)]
    pub long_break_duration: Option<u32>,
    #[serde(default)]
    pub long_break_interval: Option<u32>,
    #[serde(default)]
    pub auto_status_interval: Option<u32>,
    #[serde(default)]
    pub enable_auto_status: Option<bool>,
    #[serde(default)]
    pub include_logic_checking: Option<bool>,
    #[serde(default)]
    pub coaching_style: Option<CoachingStyle>,
}

impl ConfigPatch {
    /// Whether applying this patch changes how the heartbeat is armed.
    pub fn touches_heartbeat(&self) -> bool {
        self.enable_auto_status.is_some() || self.auto_status_interval.is_some()
    }
}
