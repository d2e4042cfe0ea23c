//! Injectable clock and timer primitive.
//!
//! The scheduler never calls `tokio::time` directly. It arms one-shot and
//! repeating tasks through a [`Clock`], so tests can swap in
//! [`ManualClock`](super::ManualClock) and step virtual time.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::runtime::{Handle, TryCurrentError};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

pub type TaskFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Work run once when a timer fires.
pub type OnceTask = Box<dyn FnOnce() -> TaskFuture + Send + 'static>;

/// Work run on every tick of a repeating timer.
pub type RepeatTask = Box<dyn FnMut() -> TaskFuture + Send + 'static>;

/// Handle to an armed timer. Cancelling is idempotent; a cancelled task is
/// never started again, though a run already in progress is left to finish.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(CancellationToken);

impl CancelToken {
    pub fn new() -> Self {
        Self(CancellationToken::new())
    }

    pub fn cancel(&self) {
        self.0.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.is_cancelled()
    }

    /// Resolves once the token is cancelled.
    pub async fn cancelled(&self) {
        self.0.cancelled().await
    }
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Run `task` once after `delay`.
    fn after(&self, delay: Duration, task: OnceTask) -> CancelToken;

    /// Run `task` every `period`, first one period after arming.
    fn every(&self, period: Duration, task: RepeatTask) -> CancelToken;
}

/// Wall-clock timers backed by the tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioClock {
    handle: Handle,
}

impl TokioClock {
    pub fn from_handle(handle: Handle) -> Self {
        Self { handle }
    }

    /// Bind to the runtime the caller is running on.
    pub fn try_current() -> Result<Self, TryCurrentError> {
        Handle::try_current().map(Self::from_handle)
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn after(&self, delay: Duration, task: OnceTask) -> CancelToken {
        let token = CancelToken::new();
        let guard = token.clone();
        self.handle.spawn(async move {
            let fired = tokio::select! {
                biased;
                _ = guard.cancelled() => false,
                _ = tokio::time::sleep(delay) => true,
            };
            if fired && !guard.is_cancelled() {
                task().await;
            }
        });
        token
    }

    fn every(&self, period: Duration, mut task: RepeatTask) -> CancelToken {
        let token = CancelToken::new();
        let guard = token.clone();
        // interval() panics on a zero period
        let period = period.max(Duration::from_millis(1));
        self.handle.spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                let fired = tokio::select! {
                    biased;
                    _ = guard.cancelled() => false,
                    _ = ticker.tick() => true,
                };
                if !fired || guard.is_cancelled() {
                    break;
                }
                task().await;
            }
        });
        token
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_once(counter: &Arc<AtomicUsize>) -> OnceTask {
        let counter = counter.clone();
        Box::new(move || {
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        })
    }

    fn counting_repeat(counter: &Arc<AtomicUsize>) -> RepeatTask {
        let counter = counter.clone();
        Box::new(move || {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        })
    }

    #[tokio::test(start_paused = true)]
    async fn after_fires_once() {
        let clock = TokioClock::try_current().unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        clock.after(Duration::from_secs(60), counting_once(&counter));

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_after_never_fires() {
        let clock = TokioClock::try_current().unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        let token = clock.after(Duration::from_secs(5), counting_once(&counter));
        token.cancel();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn every_repeats_until_cancelled() {
        let clock = TokioClock::try_current().unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        let token = clock.every(Duration::from_secs(10), counting_repeat(&counter));

        tokio::time::sleep(Duration::from_secs(35)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);

        token.cancel();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }
}
