mod clock;
mod manual;
mod phase;
mod scheduler;

pub use clock::{CancelToken, Clock, OnceTask, RepeatTask, TaskFuture, TokioClock};
pub use manual::ManualClock;
pub use phase::{complete_phase, next_phase, PhaseTransition};
pub use scheduler::{PomodoroScheduler, SchedulerBuilder};
