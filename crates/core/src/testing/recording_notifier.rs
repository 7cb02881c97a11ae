//! Notifier that keeps every notification in memory.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::notify::{Notification, NotificationEvent, Notifier, NotifyError};

/// Records notifications for test assertions.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<RwLock<Vec<Notification>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every notification sent so far.
    pub async fn notifications(&self) -> Vec<Notification> {
        self.sent.read().await.clone()
    }

    /// Notifications of one event kind sent to `channel`.
    pub async fn sent_to(&self, channel: &str, event: NotificationEvent) -> Vec<Notification> {
        self.sent
            .read()
            .await
            .iter()
            .filter(|n| n.channel == channel && n.event == event)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        self.sent.write().await.push(notification);
        Ok(())
    }
}
