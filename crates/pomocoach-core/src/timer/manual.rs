//! Virtual clock for deterministic tests.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::clock::{CancelToken, Clock, OnceTask, RepeatTask};

/// Longest delay accepted; anything beyond is treated as this.
const MAX_DELAY: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

enum PendingTask {
    Once(OnceTask),
    Repeat(RepeatTask, chrono::Duration),
}

struct Pending {
    due: DateTime<Utc>,
    seq: u64,
    token: CancelToken,
    task: PendingTask,
}

struct ManualState {
    now: DateTime<Utc>,
    next_seq: u64,
    pending: Vec<Pending>,
}

/// A [`Clock`] whose time only moves when [`ManualClock::advance`] is called.
///
/// Due tasks run inline, in due-time order (ties in arming order), each
/// awaited to completion before the next one starts. While a task runs,
/// `now()` reports its due time.
pub struct ManualClock {
    state: Mutex<ManualState>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    pub fn starting_at(now: DateTime<Utc>) -> Self {
        Self {
            state: Mutex::new(ManualState {
                now,
                next_seq: 0,
                pending: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Move virtual time forward by `by`, running everything that falls due,
    /// including tasks armed by tasks that ran during this call.
    pub async fn advance(&self, by: Duration) {
        let target = {
            let state = self.lock();
            offset(state.now, by)
        };

        loop {
            let next = {
                let mut state = self.lock();
                state.pending.retain(|p| !p.token.is_cancelled());
                let idx = state
                    .pending
                    .iter()
                    .enumerate()
                    .filter(|(_, p)| p.due <= target)
                    .min_by_key(|(_, p)| (p.due, p.seq))
                    .map(|(i, _)| i);
                match idx {
                    Some(i) => {
                        let pending = state.pending.swap_remove(i);
                        if pending.due > state.now {
                            state.now = pending.due;
                        }
                        Some(pending)
                    }
                    None => {
                        if target > state.now {
                            state.now = target;
                        }
                        None
                    }
                }
            };

            let Some(pending) = next else { break };
            match pending.task {
                PendingTask::Once(task) => task().await,
                PendingTask::Repeat(mut task, period) => {
                    task().await;
                    if !pending.token.is_cancelled() {
                        let mut state = self.lock();
                        let seq = state.next_seq;
                        state.next_seq += 1;
                        state.pending.push(Pending {
                            due: pending.due + period,
                            seq,
                            token: pending.token,
                            task: PendingTask::Repeat(task, period),
                        });
                    }
                }
            }
        }
    }

    /// Shorthand for [`advance`](Self::advance) in whole minutes.
    pub async fn advance_minutes(&self, minutes: u64) {
        self.advance(Duration::from_secs(minutes * 60)).await
    }

    /// Number of armed, uncancelled timers.
    pub fn pending_timers(&self) -> usize {
        self.lock()
            .pending
            .iter()
            .filter(|p| !p.token.is_cancelled())
            .count()
    }

    fn push(&self, delay: Duration, task: PendingTask) -> CancelToken {
        let token = CancelToken::new();
        let mut state = self.lock();
        let seq = state.next_seq;
        state.next_seq += 1;
        let due = offset(state.now, delay);
        state.pending.push(Pending {
            due,
            seq,
            token: token.clone(),
            task,
        });
        token
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.lock().now
    }

    fn after(&self, delay: Duration, task: OnceTask) -> CancelToken {
        self.push(delay, PendingTask::Once(task))
    }

    fn every(&self, period: Duration, task: RepeatTask) -> CancelToken {
        let period = period.max(Duration::from_millis(1));
        let step = to_chrono(period);
        self.push(period, PendingTask::Repeat(task, step))
    }
}

fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d.min(MAX_DELAY)).unwrap_or_else(|_| chrono::Duration::zero())
}

fn offset(now: DateTime<Utc>, by: Duration) -> DateTime<Utc> {
    now + to_chrono(by)
}
