use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Failed to encode notification: {0}")]
    Encode(String),

    #[error("Notification transport error: {0}")]
    Transport(String),
}

/// Event names pushed to channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationEvent {
    /// Result of a single-photo request.
    ServiceResponse,
    /// Queue position and wait estimate after enqueueing.
    QueueStatus,
    /// The request's token was rejected.
    InvalidToken,
}

impl NotificationEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationEvent::ServiceResponse => "service-response",
            NotificationEvent::QueueStatus => "queue-status",
            NotificationEvent::InvalidToken => "invalid-token",
        }
    }
}

/// A message for one destination channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub channel: String,
    pub event: NotificationEvent,
    /// Usually a serialized [`super::Envelope`].
    pub data: Value,
}

impl Notification {
    pub fn new<T: Serialize>(
        channel: impl Into<String>,
        event: NotificationEvent,
        data: &T,
    ) -> Result<Self, NotifyError> {
        Ok(Self {
            channel: channel.into(),
            event,
            data: serde_json::to_value(data).map_err(|e| NotifyError::Encode(e.to_string()))?,
        })
    }
}

/// Delivers notifications to channel subscribers.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sends a notification. Having no subscribers is not an error.
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError>;
}
