//! Per-user Pomodoro session scheduler.
//!
//! Owns the session store, the notification dispatcher and every timer armed
//! through the injected [`Clock`]. Each session has at most one phase timer
//! and at most one heartbeat; both are torn down on pause, stop and phase
//! transition.
//!
//! ## Phase completion
//!
//! ```text
//! phase timer fires
//!   -> complete_phase()            (store lock held, heartbeat cancelled)
//!   -> coaching hook (optional)    (awaited, no lock)
//!   -> dispatch notification       (awaited, no lock)
//!   -> rearm phase + heartbeat     (store lock held, only if still current)
//! ```
//!
//! Timer callbacks carry the session generation and the ticket of the timer
//! they belong to. A callback whose session was stopped, replaced, paused or
//! re-armed since finds a mismatch and does nothing.
//!
//! Caller misuse (double start, pausing a missing session, ...) is reported
//! through `bool`/`Option` returns, never panics or errors.

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::clock::{Clock, OnceTask, RepeatTask};
use super::phase::complete_phase;
use crate::coaching::{
    kind_for_entering, request_coaching, CoachingContext, CoachingHook, CoachingKind,
};
use crate::diagnostics::check_logic;
use crate::events::{AutoStatusUpdate, Notification, PhaseCompletionNotification, SessionInfo};
use crate::notifications::{NotificationDispatcher, NotificationSink};
use crate::session::{
    ArmedTimer, ConfigPatch, PomodoroConfig, Session, SessionSlot, SessionStats, SessionStatus,
    SessionStore,
};

struct Inner {
    clock: Arc<dyn Clock>,
    store: Mutex<SessionStore>,
    dispatcher: NotificationDispatcher,
    coach: Option<Arc<dyn CoachingHook>>,
    defaults: PomodoroConfig,
}

/// Cheap to clone; clones share the same sessions.
#[derive(Clone)]
pub struct PomodoroScheduler {
    inner: Arc<Inner>,
}

pub struct SchedulerBuilder {
    clock: Arc<dyn Clock>,
    coach: Option<Arc<dyn CoachingHook>>,
    defaults: PomodoroConfig,
}

impl SchedulerBuilder {
    /// Config used when `start_session` is called without one.
    pub fn defaults(mut self, defaults: PomodoroConfig) -> Self {
        self.defaults = defaults.normalized();
        self
    }

    pub fn coach(mut self, coach: Arc<dyn CoachingHook>) -> Self {
        self.coach = Some(coach);
        self
    }

    pub fn build(self) -> PomodoroScheduler {
        PomodoroScheduler {
            inner: Arc::new(Inner {
                clock: self.clock,
                store: Mutex::new(SessionStore::new()),
                dispatcher: NotificationDispatcher::new(),
                coach: self.coach,
                defaults: self.defaults,
            }),
        }
    }
}

impl PomodoroScheduler {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::builder(clock).build()
    }

    pub fn builder(clock: Arc<dyn Clock>) -> SchedulerBuilder {
        SchedulerBuilder {
            clock,
            coach: None,
            defaults: PomodoroConfig::default(),
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Create a work-phase session for `user_id` and arm its timers.
    ///
    /// Returns `false` without touching anything if the user already has a
    /// session.
    pub fn start_session(
        &self,
        user_id: &str,
        channel_id: &str,
        config: Option<PomodoroConfig>,
    ) -> bool {
        let inner = &self.inner;
        let now = inner.clock.now();
        let config = config.unwrap_or_else(|| inner.defaults.clone());
        let session = Session::new(user_id, channel_id, config, now);

        let mut store = inner.lock_store();
        let Some(generation) = store.insert(session) else {
            tracing::debug!(user_id, "start rejected: session already exists");
            return false;
        };
        if let Some(slot) = store.current_mut(user_id, generation) {
            Inner::arm_phase(inner, slot, now);
            Inner::arm_heartbeat(inner, slot);
            tracing::info!(
                user_id,
                channel_id,
                work_minutes = slot.session.duration,
                auto_status = slot.session.config.enable_auto_status,
                "pomodoro session started"
            );
        }
        true
    }

    /// Freeze the countdown and disarm both timers.
    pub fn pause_session(&self, user_id: &str) -> bool {
        let now = self.inner.clock.now();
        let mut store = self.inner.lock_store();
        let Some(slot) = store.get_mut(user_id) else {
            return false;
        };
        if slot.session.is_paused {
            return false;
        }
        slot.timers.cancel_all();
        slot.session.pause(now);
        tracing::info!(
            user_id,
            phase = %slot.session.phase,
            remaining_ms = slot.session.remaining_ms(now),
            "pomodoro session paused"
        );
        true
    }

    /// Continue from the frozen remaining time and rearm the timers.
    pub fn resume_session(&self, user_id: &str) -> bool {
        let inner = &self.inner;
        let now = inner.clock.now();
        let mut store = inner.lock_store();
        let Some(slot) = store.get_mut(user_id) else {
            return false;
        };
        if !slot.session.is_paused {
            return false;
        }
        slot.session.resume(now);
        Inner::arm_phase(inner, slot, now);
        Inner::arm_heartbeat(inner, slot);
        tracing::info!(
            user_id,
            phase = %slot.session.phase,
            remaining_ms = slot.session.remaining_ms(now),
            "pomodoro session resumed"
        );
        true
    }

    /// Tear down the session, its timers and its notification callback.
    pub fn stop_session(&self, user_id: &str) -> Option<SessionStats> {
        let now = self.inner.clock.now();
        let slot = self.inner.lock_store().remove(user_id)?;
        self.inner.dispatcher.remove_callback(user_id);
        let stats = slot.session.stats(now);
        tracing::info!(
            user_id,
            completed_pomodoros = stats.completed_pomodoros,
            session_minutes = stats.session_minutes,
            "pomodoro session stopped"
        );
        Some(stats)
    }

    /// Stop every session. The scheduler stays usable afterwards.
    pub fn shutdown(&self) {
        let users = self.inner.lock_store().clear();
        self.inner.dispatcher.clear();
        tracing::info!(sessions = users.len(), "scheduler shut down");
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn get_status(&self, user_id: &str) -> Option<SessionStatus> {
        let now = self.inner.clock.now();
        self.inner
            .lock_store()
            .get(user_id)
            .map(|slot| slot.session.status(now))
    }

    pub fn has_active_session(&self, user_id: &str) -> bool {
        self.inner.lock_store().contains(user_id)
    }

    pub fn active_sessions(&self) -> usize {
        self.inner.lock_store().len()
    }

    /// Copy of the stored session.
    pub fn session_snapshot(&self, user_id: &str) -> Option<Session> {
        self.inner
            .lock_store()
            .get(user_id)
            .map(|slot| slot.session.clone())
    }

    pub fn get_default_config(&self) -> PomodoroConfig {
        self.inner.defaults.clone()
    }

    pub fn get_thread_id(&self, user_id: &str) -> Option<String> {
        self.inner
            .lock_store()
            .get(user_id)
            .and_then(|slot| slot.session.thread_id.clone())
    }

    // ── Mutation ─────────────────────────────────────────────────────

    pub fn set_thread_id(&self, user_id: &str, thread_id: impl Into<String>) -> bool {
        match self.inner.lock_store().get_mut(user_id) {
            Some(slot) => {
                slot.session.thread_id = Some(thread_id.into());
                true
            }
            None => false,
        }
    }

    /// Merge `patch` into the session's config.
    ///
    /// Durations apply from the next phase on; the armed phase timer keeps
    /// the length it was started with. Heartbeat changes take effect
    /// immediately unless the session is paused.
    pub fn update_config(&self, user_id: &str, patch: &ConfigPatch) -> bool {
        let inner = &self.inner;
        let mut store = inner.lock_store();
        let Some(slot) = store.get_mut(user_id) else {
            return false;
        };
        slot.session.config = slot.session.config.merged(patch);
        if patch.touches_heartbeat() && !slot.session.is_paused {
            Inner::arm_heartbeat(inner, slot);
        }
        tracing::debug!(user_id, ?patch, "session config updated");
        true
    }

    // ── Presentation layer ───────────────────────────────────────────

    /// Register where `user_id`'s notifications go. Last registration wins.
    pub fn set_notification_callback(&self, user_id: &str, sink: Arc<dyn NotificationSink>) {
        self.inner.dispatcher.set_callback(user_id, sink);
    }

    pub fn remove_notification_callback(&self, user_id: &str) -> bool {
        self.inner.dispatcher.remove_callback(user_id)
    }

    /// Name used by the chat front end; same as
    /// [`set_notification_callback`](Self::set_notification_callback).
    pub fn set_discord_notification_callback(&self, user_id: &str, sink: Arc<dyn NotificationSink>) {
        self.set_notification_callback(user_id, sink);
    }

    pub fn remove_discord_notification_callback(&self, user_id: &str) -> bool {
        self.remove_notification_callback(user_id)
    }

    /// Ask the coaching hook for a message about `user_id`'s session.
    ///
    /// `None` when there is no hook, no session, or the hook failed.
    pub async fn coaching_message(&self, user_id: &str, kind: CoachingKind) -> Option<String> {
        let coach = self.inner.coach.clone()?;
        let now = self.inner.clock.now();
        let context = {
            let store = self.inner.lock_store();
            let slot = store.get(user_id)?;
            CoachingContext::from_session(&slot.session, now)
        };
        request_coaching(coach.as_ref(), kind, &context).await
    }
}

impl Inner {
    fn lock_store(&self) -> MutexGuard<'_, SessionStore> {
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// `None` if the session `generation` was issued for is gone; otherwise
    /// the sink registered right now. Both are read under the store lock so
    /// a stop/start/re-register in between cannot redirect the notification.
    fn current_sink(
        &self,
        user_id: &str,
        generation: u64,
    ) -> Option<Option<Arc<dyn NotificationSink>>> {
        let store = self.lock_store();
        store
            .is_current(user_id, generation)
            .then(|| self.dispatcher.sink_for(user_id))
    }

    /// Arm the single-shot timer for the rest of the current phase,
    /// replacing any phase timer already armed.
    fn arm_phase(this: &Arc<Self>, slot: &mut SessionSlot, now: DateTime<Utc>) {
        slot.timers.cancel_phase();
        let remaining_ms = slot.session.remaining_ms(now);
        let ticket = slot.timers.issue_ticket();
        let generation = slot.generation;
        let user_id = slot.session.user_id.clone();
        let weak: Weak<Self> = Arc::downgrade(this);

        let task: OnceTask = Box::new(move || {
            Box::pin(async move {
                if let Some(inner) = weak.upgrade() {
                    Inner::handle_phase_complete(&inner, &user_id, generation, ticket).await;
                }
            })
        });
        let token = this.clock.after(Duration::from_millis(remaining_ms), task);
        slot.timers.phase = Some(ArmedTimer { ticket, token });
        tracing::debug!(
            user_id = %slot.session.user_id,
            phase = %slot.session.phase,
            remaining_ms,
            "phase timer armed"
        );
    }

    /// (Re)arm the heartbeat if auto-status is enabled; otherwise just make
    /// sure none is armed.
    fn arm_heartbeat(this: &Arc<Self>, slot: &mut SessionSlot) {
        slot.timers.cancel_heartbeat();
        let config = &slot.session.config;
        if !config.enable_auto_status || slot.session.is_paused {
            return;
        }
        let period = Duration::from_secs(u64::from(config.auto_status_interval) * 60);
        let ticket = slot.timers.issue_ticket();
        let generation = slot.generation;
        let user_id = slot.session.user_id.clone();
        let weak: Weak<Self> = Arc::downgrade(this);

        let task: RepeatTask = Box::new(move || {
            let weak = weak.clone();
            let user_id = user_id.clone();
            Box::pin(async move {
                if let Some(inner) = weak.upgrade() {
                    Inner::send_auto_status_update(&inner, &user_id, generation, ticket).await;
                }
            })
        });
        let token = this.clock.every(period, task);
        slot.timers.heartbeat = Some(ArmedTimer { ticket, token });
        tracing::debug!(
            user_id = %slot.session.user_id,
            interval_minutes = config.auto_status_interval,
            "heartbeat armed"
        );
    }

    async fn handle_phase_complete(this: &Arc<Self>, user_id: &str, generation: u64, ticket: u64) {
        let (mut notification, context) = {
            let mut store = this.lock_store();
            let Some(slot) = store.current_mut(user_id, generation) else {
                tracing::debug!(user_id, "stale phase timer ignored");
                return;
            };
            if slot.session.is_paused || !slot.timers.is_phase(ticket) {
                tracing::debug!(user_id, "superseded phase timer ignored");
                return;
            }
            // this timer has fired; the heartbeat restarts with the new phase
            slot.timers.phase = None;
            slot.timers.cancel_heartbeat();

            let now = this.clock.now();
            let transition = complete_phase(&mut slot.session, now);
            let session = &slot.session;
            tracing::info!(
                user_id,
                from = %transition.previous_phase,
                to = %transition.next_phase,
                completed_pomodoros = session.completed_pomodoros,
                "phase completed"
            );
            let notification = PhaseCompletionNotification {
                user_id: session.user_id.clone(),
                channel_id: session.channel_id.clone(),
                thread_id: session.thread_id.clone(),
                previous_phase: transition.previous_phase,
                next_phase: transition.next_phase,
                next_duration: transition.next_duration,
                completed_pomodoros: session.completed_pomodoros,
                coaching: None,
                at: now,
            };
            let context = this
                .coach
                .is_some()
                .then(|| CoachingContext::from_session(session, now));
            (notification, context)
        };

        if let (Some(coach), Some(context)) = (this.coach.as_ref(), context.as_ref()) {
            let kind = kind_for_entering(notification.next_phase);
            notification.coaching = request_coaching(coach.as_ref(), kind, context).await;
        }

        let Some(sink) = this.current_sink(user_id, generation) else {
            tracing::debug!(user_id, "session gone before completion dispatch");
            return;
        };
        this.dispatcher
            .dispatch_to(user_id, sink, Notification::PhaseCompletion(notification))
            .await;

        let mut store = this.lock_store();
        let Some(slot) = store.current_mut(user_id, generation) else {
            return;
        };
        // paused meanwhile: resume will arm; resumed meanwhile: already armed
        if slot.session.is_paused || slot.timers.phase.is_some() {
            return;
        }
        let now = this.clock.now();
        Inner::arm_phase(this, slot, now);
        Inner::arm_heartbeat(this, slot);
    }

    async fn send_auto_status_update(this: &Arc<Self>, user_id: &str, generation: u64, ticket: u64) {
        let (status, mut update, logic_checking) = {
            let store = this.lock_store();
            let Some(slot) = store.get(user_id).filter(|s| s.generation == generation) else {
                return;
            };
            if slot.session.is_paused || !slot.timers.is_heartbeat(ticket) {
                return;
            }
            let now = this.clock.now();
            let session = &slot.session;
            let status = session.status(now);
            let update = AutoStatusUpdate {
                user_id: session.user_id.clone(),
                channel_id: session.channel_id.clone(),
                thread_id: session.thread_id.clone(),
                status,
                session_info: SessionInfo {
                    start_time: session.start_time,
                    current_phase: session.phase,
                    next_phase_in: status.remaining_minutes(),
                },
                logic_check: None,
                timestamp: now,
            };
            (status, update, session.config.include_logic_checking)
        };

        if logic_checking {
            // second, independent read of the session
            let snapshot = {
                let store = this.lock_store();
                store
                    .get(user_id)
                    .filter(|s| s.generation == generation)
                    .map(|s| s.session.clone())
            };
            if let Some(session) = snapshot {
                let check = check_logic(&session, &status, this.clock.now());
                if !check.is_healthy() {
                    tracing::warn!(
                        user_id,
                        accuracy = ?check.timer_accuracy,
                        consistent = check.session_consistency,
                        diagnostics = ?check.highlights(),
                        "session logic check flagged an anomaly"
                    );
                }
                update.logic_check = Some(check);
            }
        }

        let Some(sink) = this.current_sink(user_id, generation) else {
            return;
        };
        tracing::debug!(
            user_id,
            phase = %update.session_info.current_phase,
            remaining_ms = status.remaining_ms,
            "auto-status heartbeat"
        );
        this.dispatcher
            .dispatch_to(user_id, sink, Notification::AutoStatus(update))
            .await;
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.store
            .get_mut()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

impl std::fmt::Debug for PomodoroScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PomodoroScheduler")
            .field("active_sessions", &self.active_sessions())
            .field("dispatcher", &self.inner.dispatcher)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::ManualClock;

    fn scheduler() -> (Arc<ManualClock>, PomodoroScheduler) {
        let clock = Arc::new(ManualClock::new());
        let scheduler = PomodoroScheduler::new(clock.clone());
        (clock, scheduler)
    }

    #[test]
    fn start_twice_fails() {
        let (_clock, s) = scheduler();
        assert!(s.start_session("u1", "c1", None));
        assert!(!s.start_session("u1", "c2", None));
        assert_eq!(s.active_sessions(), 1);
        assert_eq!(s.session_snapshot("u1").unwrap().channel_id, "c1");
    }

    #[test]
    fn misuse_returns_false_or_none() {
        let (_clock, s) = scheduler();
        assert!(!s.pause_session("nobody"));
        assert!(!s.resume_session("nobody"));
        assert!(s.stop_session("nobody").is_none());
        assert!(s.get_status("nobody").is_none());
        assert!(!s.set_thread_id("nobody", "t1"));
        assert!(!s.update_config("nobody", &ConfigPatch::default()));

        assert!(s.start_session("u1", "c1", None));
        assert!(!s.resume_session("u1"));
        assert!(s.pause_session("u1"));
        assert!(!s.pause_session("u1"));
    }

    #[test]
    fn timers_are_armed_per_config() {
        let (clock, s) = scheduler();
        s.start_session("quiet", "c1", None);
        assert_eq!(clock.pending_timers(), 1);

        let chatty = PomodoroConfig {
            enable_auto_status: true,
            ..PomodoroConfig::default()
        };
        s.start_session("chatty", "c1", Some(chatty));
        assert_eq!(clock.pending_timers(), 3);

        s.pause_session("chatty");
        assert_eq!(clock.pending_timers(), 1);
        s.stop_session("quiet");
        assert_eq!(clock.pending_timers(), 0);
    }

    #[test]
    fn thread_id_round_trip() {
        let (_clock, s) = scheduler();
        s.start_session("u1", "c1", None);
        assert!(s.get_thread_id("u1").is_none());
        assert!(s.set_thread_id("u1", "thread-9"));
        assert_eq!(s.get_thread_id("u1").as_deref(), Some("thread-9"));
    }

    #[test]
    fn builder_defaults_are_used() {
        let clock = Arc::new(ManualClock::new());
        let s = PomodoroScheduler::builder(clock)
            .defaults(PomodoroConfig {
                work_duration: 50,
                ..PomodoroConfig::default()
            })
            .build();
        assert_eq!(s.get_default_config().work_duration, 50);
        s.start_session("u1", "c1", None);
        assert_eq!(s.get_status("u1").unwrap().remaining_ms, 50 * 60_000);
    }

    #[test]
    fn shutdown_clears_everything() {
        let (clock, s) = scheduler();
        s.start_session("a", "c1", None);
        s.start_session("b", "c1", None);
        s.shutdown();
        assert_eq!(s.active_sessions(), 0);
        assert_eq!(clock.pending_timers(), 0);
        assert!(s.start_session("a", "c1", None));
    }

    #[test]
    fn dropping_scheduler_cancels_timers() {
        let (clock, s) = scheduler();
        s.start_session("a", "c1", None);
        assert_eq!(clock.pending_timers(), 1);
        drop(s);
        assert_eq!(clock.pending_timers(), 0);
    }
}
