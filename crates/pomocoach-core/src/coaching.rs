//! Coaching hook -- optional text generator consulted at lifecycle points.
//!
//! The hook is an external collaborator (typically an LLM call). Nothing it
//! does may affect timer correctness: [`request_coaching`] turns every error
//! or panic into `None`.

use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use chrono::{DateTime, Local, Timelike, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};

use crate::error::CoachingError;
use crate::session::{Phase, Session, SessionStats};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoachingKind {
    Start,
    Break,
    Completion,
    Motivation,
    Reflection,
}

/// User preference for the tone of coaching messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoachingStyle {
    Gentle,
    #[default]
    Balanced,
    Strict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl TimeOfDay {
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            5..=11 => TimeOfDay::Morning,
            12..=16 => TimeOfDay::Afternoon,
            17..=20 => TimeOfDay::Evening,
            _ => TimeOfDay::Night,
        }
    }

    /// Bucket `at` by the local wall-clock hour.
    pub fn at(at: DateTime<Utc>) -> Self {
        Self::from_hour(at.with_timezone(&Local).hour())
    }
}

/// What the hook gets to look at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoachingContext {
    pub session: Session,
    pub stats: SessionStats,
    pub time_of_day: TimeOfDay,
    pub style: CoachingStyle,
}

impl CoachingContext {
    pub fn from_session(session: &Session, now: DateTime<Utc>) -> Self {
        Self {
            session: session.clone(),
            stats: session.stats(now),
            time_of_day: TimeOfDay::at(now),
            style: session.config.coaching_style,
        }
    }
}

#[async_trait]
pub trait CoachingHook: Send + Sync {
    /// Produce a coaching message, or `Ok(None)` when there is nothing to say.
    async fn generate(
        &self,
        kind: CoachingKind,
        context: &CoachingContext,
    ) -> Result<Option<String>, CoachingError>;
}

/// The coaching kind that introduces `phase`.
pub fn kind_for_entering(phase: Phase) -> CoachingKind {
    if phase.is_break() {
        CoachingKind::Break
    } else {
        CoachingKind::Start
    }
}

/// Ask `hook` for a message, containing any failure. Blank messages count
/// as no message.
pub async fn request_coaching(
    hook: &dyn CoachingHook,
    kind: CoachingKind,
    context: &CoachingContext,
) -> Option<String> {
    let user_id = context.session.user_id.as_str();
    // the call itself sits inside the caught future: a hook may panic
    // before it hands back a future
    match AssertUnwindSafe(async { hook.generate(kind, context).await })
        .catch_unwind()
        .await
    {
        Ok(Ok(message)) => message
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty()),
        Ok(Err(e)) => {
            tracing::warn!(user_id, ?kind, error = %e, "coaching hook failed");
            None
        }
        Err(_) => {
            tracing::warn!(user_id, ?kind, "coaching hook panicked");
            None
        }
    }
}

/// Canned messages, for running without a generator backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateCoach;

#[async_trait]
impl CoachingHook for TemplateCoach {
    async fn generate(
        &self,
        kind: CoachingKind,
        context: &CoachingContext,
    ) -> Result<Option<String>, CoachingError> {
        let done = context.stats.completed_pomodoros;
        let minutes = context.session.duration;
        let text = match (kind, context.style) {
            (CoachingKind::Start, CoachingStyle::Strict) => {
                format!("{minutes} minutes. One task. Go.")
            }
            (CoachingKind::Start, CoachingStyle::Gentle) => {
                format!("Settle in for {minutes} minutes, one small step at a time.")
            }
            (CoachingKind::Start, CoachingStyle::Balanced) => {
                format!("Focus block of {minutes} minutes starts now.")
            }
            (CoachingKind::Break, CoachingStyle::Strict) => {
                format!("Break: {minutes} minutes. Step away from the screen.")
            }
            (CoachingKind::Break, _) => {
                format!("Nice work. Take {minutes} minutes to stretch and breathe.")
            }
            (CoachingKind::Completion, _) => {
                format!("Session finished with {done} pomodoro(s) completed.")
            }
            (CoachingKind::Motivation, _) => match context.time_of_day {
                TimeOfDay::Morning => "Morning focus compounds. Keep going.".to_string(),
                TimeOfDay::Night => "Late session: keep it short and wrap up cleanly.".to_string(),
                _ => format!("{done} down. The next one counts too."),
            },
            (CoachingKind::Reflection, _) => {
                "What moved forward this session, and what is the next step?".to_string()
            }
        };
        Ok(Some(text))
    }
}
