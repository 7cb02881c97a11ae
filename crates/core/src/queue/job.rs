use serde::{Deserialize, Serialize};

use crate::service::ServiceKind;

/// A single-photo request as it travels through a queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoRequest {
    pub service: ServiceKind,
    /// Image URL or inline `data:image/...;base64,` payload.
    pub source: String,
    /// Raw background color as sent by the client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bg_color: Option<String>,
    /// Notification channel that receives the result.
    pub channel: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canvas_index: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_index: Option<i64>,
}

/// Payload of a queue record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueuedJob {
    /// Process a ticket directory.
    Ticket { ticket: String, service: ServiceKind },
    /// Process one photo and notify its channel.
    Photo(PhotoRequest),
}

impl QueuedJob {
    pub fn service(&self) -> ServiceKind {
        match self {
            QueuedJob::Ticket { service, .. } => *service,
            QueuedJob::Photo(request) => request.service,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            QueuedJob::Ticket { .. } => "ticket",
            QueuedJob::Photo(_) => "photo",
        }
    }
}
