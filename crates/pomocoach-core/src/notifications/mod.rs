//! Per-user notification dispatch with failure isolation.
//!
//! Each user has at most one registered [`NotificationSink`]; registering
//! again replaces it. [`NotificationDispatcher::dispatch`] awaits the sink so
//! that its errors and panics can be caught here, logged, and dropped. None
//! of them reach the timer scheduler or touch session state.

mod sink;

pub use sink::{ChannelSink, NotificationSink};

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};

use futures::FutureExt;
use serde::{Deserialize, Serialize};

use crate::events::Notification;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchOutcome {
    Delivered,
    NoCallback,
    /// The sink returned an error or panicked.
    Failed,
}

#[derive(Default)]
pub struct NotificationDispatcher {
    sinks: Mutex<HashMap<String, Arc<dyn NotificationSink>>>,
}

impl NotificationDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<dyn NotificationSink>>> {
        self.sinks.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register `sink` for `user_id`, replacing any earlier one.
    pub fn set_callback(&self, user_id: &str, sink: Arc<dyn NotificationSink>) {
        let replaced = self.lock().insert(user_id.to_string(), sink).is_some();
        tracing::debug!(user_id, replaced, "notification callback registered");
    }

    /// Returns whether a callback was registered.
    pub fn remove_callback(&self, user_id: &str) -> bool {
        self.lock().remove(user_id).is_some()
    }

    pub fn has_callback(&self, user_id: &str) -> bool {
        self.lock().contains_key(user_id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// The sink currently registered for `user_id`.
    pub fn sink_for(&self, user_id: &str) -> Option<Arc<dyn NotificationSink>> {
        self.lock().get(user_id).cloned()
    }

    /// Deliver `notification` to the user's sink and wait for it.
    pub async fn dispatch(&self, user_id: &str, notification: Notification) -> DispatchOutcome {
        let sink = self.sink_for(user_id);
        self.dispatch_to(user_id, sink, notification).await
    }

    /// Deliver to a sink resolved earlier with [`sink_for`](Self::sink_for),
    /// even if the registration has been replaced since.
    pub async fn dispatch_to(
        &self,
        user_id: &str,
        sink: Option<Arc<dyn NotificationSink>>,
        notification: Notification,
    ) -> DispatchOutcome {
        let Some(sink) = sink else {
            tracing::debug!(user_id, kind = notification.kind(), "no notification callback");
            return DispatchOutcome::NoCallback;
        };

        let kind = notification.kind();
        // a sink may panic before returning its future, so the call goes
        // inside the caught block
        match AssertUnwindSafe(async { sink.deliver(notification).await })
            .catch_unwind()
            .await
        {
            Ok(Ok(())) => DispatchOutcome::Delivered,
            Ok(Err(e)) => {
                tracing::warn!(user_id, kind, error = %e, "notification delivery failed");
                DispatchOutcome::Failed
            }
            Err(panic) => {
                tracing::warn!(
                    user_id,
                    kind,
                    panic = panic_message(panic.as_ref()),
                    "notification callback panicked"
                );
                DispatchOutcome::Failed
            }
        }
    }
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut users: Vec<String> = self.lock().keys().cloned().collect();
        users.sort();
        f.debug_struct("NotificationDispatcher")
            .field("users", &users)
            .finish()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
