//! userId -> session map with the timer handles armed for each session.

use std::collections::HashMap;

use super::Session;
use crate::timer::CancelToken;

/// One armed timer: the token that cancels it and the ticket its callback
/// carries, so a callback can tell whether it is still the armed one.
#[derive(Debug)]
pub struct ArmedTimer {
    pub ticket: u64,
    pub token: CancelToken,
}

/// Timer handles owned by one session. Never shared between sessions.
#[derive(Debug, Default)]
pub struct TimerHandles {
    pub phase: Option<ArmedTimer>,
    pub heartbeat: Option<ArmedTimer>,
    next_ticket: u64,
}

impl TimerHandles {
    /// A ticket no earlier timer of this session has used.
    pub fn issue_ticket(&mut self) -> u64 {
        self.next_ticket += 1;
        self.next_ticket
    }

    pub fn is_phase(&self, ticket: u64) -> bool {
        self.phase.as_ref().is_some_and(|armed| armed.ticket == ticket)
    }

    pub fn is_heartbeat(&self, ticket: u64) -> bool {
        self.heartbeat
            .as_ref()
            .is_some_and(|armed| armed.ticket == ticket)
    }

    pub fn cancel_phase(&mut self) {
        if let Some(armed) = self.phase.take() {
            armed.token.cancel();
        }
    }

    pub fn cancel_heartbeat(&mut self) {
        if let Some(armed) = self.heartbeat.take() {
            armed.token.cancel();
        }
    }

    pub fn cancel_all(&mut self) {
        self.cancel_phase();
        self.cancel_heartbeat();
    }
}

/// A stored session plus everything the scheduler tracks for it.
#[derive(Debug)]
pub struct SessionSlot {
    pub session: Session,
    pub timers: TimerHandles,
    /// Unique per created session; timer callbacks compare against it so a
    /// stale timer never touches a newer session for the same user.
    pub generation: u64,
}

#[derive(Debug, Default)]
pub struct SessionStore {
    slots: HashMap<String, SessionSlot>,
    next_generation: u64,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new session. Returns its generation, or `None` (leaving the
    /// store untouched) when the user already has one.
    pub fn insert(&mut self, session: Session) -> Option<u64> {
        if self.slots.contains_key(&session.user_id) {
            return None;
        }
        self.next_generation += 1;
        let generation = self.next_generation;
        self.slots.insert(
            session.user_id.clone(),
            SessionSlot {
                session,
                timers: TimerHandles::default(),
                generation,
            },
        );
        Some(generation)
    }

    pub fn get(&self, user_id: &str) -> Option<&SessionSlot> {
        self.slots.get(user_id)
    }

    pub fn get_mut(&mut self, user_id: &str) -> Option<&mut SessionSlot> {
        self.slots.get_mut(user_id)
    }

    /// The slot for `user_id`, only if it is still the session `generation`
    /// was issued for.
    pub fn current_mut(&mut self, user_id: &str, generation: u64) -> Option<&mut SessionSlot> {
        self.slots
            .get_mut(user_id)
            .filter(|slot| slot.generation == generation)
    }

    pub fn is_current(&self, user_id: &str, generation: u64) -> bool {
        self.slots
            .get(user_id)
            .is_some_and(|slot| slot.generation == generation)
    }

    /// Remove a session, cancelling its timers first.
    pub fn remove(&mut self, user_id: &str) -> Option<SessionSlot> {
        let mut slot = self.slots.remove(user_id)?;
        slot.timers.cancel_all();
        Some(slot)
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.slots.contains_key(user_id)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Remove every session, cancelling all timers. Returns the user ids.
    pub fn clear(&mut self) -> Vec<String> {
        let users: Vec<String> = self.slots.keys().cloned().collect();
        for slot in self.slots.values_mut() {
            slot.timers.cancel_all();
        }
        self.slots.clear();
        users
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::PomodoroConfig;
    use chrono::Utc;

    fn session(user: &str) -> Session {
        Session::new(user, "c1", PomodoroConfig::default(), Utc::now())
    }

    #[test]
    fn insert_rejects_duplicate_user() {
        let mut store = SessionStore::new();
        assert_eq!(store.insert(session("u1")), Some(1));
        assert_eq!(store.insert(session("u1")), None);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn generations_are_never_reused() {
        let mut store = SessionStore::new();
        let first = store.insert(session("u1")).unwrap();
        store.remove("u1");
        let second = store.insert(session("u1")).unwrap();
        assert_ne!(first, second);
        assert!(!store.is_current("u1", first));
        assert!(store.is_current("u1", second));
        assert!(store.current_mut("u1", first).is_none());
    }

    #[test]
    fn remove_cancels_timers() {
        let mut store = SessionStore::new();
        store.insert(session("u1"));
        let phase = CancelToken::new();
        let heartbeat = CancelToken::new();
        {
            let slot = store.get_mut("u1").unwrap();
            let ticket = slot.timers.issue_ticket();
            slot.timers.phase = Some(ArmedTimer {
                ticket,
                token: phase.clone(),
            });
            let ticket = slot.timers.issue_ticket();
            slot.timers.heartbeat = Some(ArmedTimer {
                ticket,
                token: heartbeat.clone(),
            });
            assert!(slot.timers.is_phase(1));
            assert!(slot.timers.is_heartbeat(2));
            assert!(!slot.timers.is_phase(2));
        }
        assert!(store.remove("u1").is_some());
        assert!(phase.is_cancelled());
        assert!(heartbeat.is_cancelled());
        assert!(store.is_empty());
    }

    #[test]
    fn clear_returns_users() {
        let mut store = SessionStore::new();
        store.insert(session("a"));
        store.insert(session("b"));
        let mut users = store.clear();
        users.sort();
        assert_eq!(users, vec!["a".to_string(), "b".to_string()]);
        assert!(store.is_empty());
    }
}
