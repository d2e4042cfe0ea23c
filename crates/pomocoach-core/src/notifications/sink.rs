use std::future::Future;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::NotifyError;
use crate::events::Notification;

/// Receives notifications for one user. Implementations usually do network
/// I/O (posting to a chat platform) and are expected to fail sometimes.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, notification: Notification) -> Result<(), NotifyError>;
}

/// Any `Fn(Notification) -> impl Future<Output = Result<(), NotifyError>>`
/// is a sink.
#[async_trait]
impl<F, Fut> NotificationSink for F
where
    F: Fn(Notification) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), NotifyError>> + Send,
{
    async fn deliver(&self, notification: Notification) -> Result<(), NotifyError> {
        (self)(notification).await
    }
}

/// Forwards notifications into an unbounded channel, so the consumer can
/// process them as a typed event stream.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<Notification>) -> Self {
        Self { tx }
    }

    /// A sink plus the receiver it feeds.
    pub fn pair() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl NotificationSink for ChannelSink {
    async fn deliver(&self, notification: Notification) -> Result<(), NotifyError> {
        self.tx
            .send(notification)
            .map_err(|_| NotifyError::ChannelClosed)
    }
}
