//! # Pomocoach Core Library
//!
//! This library provides a multi-tenant Pomodoro session scheduler intended
//! to sit behind a chat bot or similar front end. Any number of users may
//! run one session each; the library advances their phases on real timers
//! and pushes notifications back to the caller.
//!
//! ## Architecture
//!
//! - **Session store**: Per-user session state plus the timer handles armed
//!   for it
//! - **Phase machine**: Work → short/long break → work, long break on every
//!   n-th completed pomodoro
//! - **Scheduler**: One-shot phase timers and repeating heartbeats, driven by
//!   an injectable [`Clock`]
//! - **Diagnostics**: Drift check between the reported and the recomputed
//!   remaining time
//! - **Notifications**: Per-user sinks whose failures never reach the timers
//! - **Coaching**: Optional hook producing a short text for phase changes
//! - **Storage**: TOML-based defaults for new sessions
//!
//! ## Key Components
//!
//! - [`PomodoroScheduler`]: Session lifecycle and timer management
//! - [`TokioClock`] / [`ManualClock`]: Production and virtual-time clocks
//! - [`NotificationSink`]: Trait for notification receivers
//! - [`CoachingHook`]: Trait for coaching text generators
//! - [`EngineConfig`]: Application configuration management

pub mod coaching;
pub mod diagnostics;
pub mod error;
pub mod events;
pub mod notifications;
pub mod session;
pub mod storage;
pub mod timer;

pub use coaching::{CoachingContext, CoachingHook, CoachingKind, CoachingStyle, TemplateCoach};
pub use diagnostics::{check_logic, LogicCheck, TimerAccuracy};
pub use error::{CoachingError, ConfigError, CoreError, NotifyError};
pub use events::{AutoStatusUpdate, Notification, PhaseCompletionNotification, SessionInfo};
pub use notifications::{ChannelSink, DispatchOutcome, NotificationDispatcher, NotificationSink};
pub use session::{ConfigPatch, Phase, PomodoroConfig, Session, SessionStats, SessionStatus};
pub use storage::{CliConfig, EngineConfig};
pub use timer::{Clock, ManualClock, PomodoroScheduler, SchedulerBuilder, TokioClock};
