//! Per-channel WebSocket subscriptions.
//!
//! Every notification is broadcast once and each connection forwards only
//! those addressed to the channel it subscribed to. Clients may also submit
//! photos over the socket with a `client-request` frame.

use async_trait::async_trait;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use naiade_core::{
    AuthRequest, Envelope, Notification, NotificationEvent, Notifier, NotifyError,
};

use super::photos::{submit_photo, PhotoSubmission};
use crate::metrics::{
    AUTH_FAILURES_TOTAL, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_LAG_EVENTS,
    WS_MESSAGES_SENT,
};
use crate::state::AppState;

/// Frame pushed to subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundFrame {
    pub event: NotificationEvent,
    pub data: Value,
}

/// Frame received from a client.
#[derive(Debug, Deserialize)]
struct InboundFrame {
    event: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct ClientRequest {
    #[serde(default)]
    token: Option<String>,
    #[serde(flatten)]
    submission: PhotoSubmission,
}

/// Fans notifications out to WebSocket connections.
#[derive(Debug, Clone)]
pub struct WsBroadcaster {
    sender: broadcast::Sender<Notification>,
}

impl WsBroadcaster {
    /// Create a new broadcaster with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    /// Pushes `envelope` as `event` to `channel`. Failures are logged.
    pub async fn push<T: Serialize>(&self, channel: &str, event: NotificationEvent, envelope: &T) {
        let result = match Notification::new(channel, event, envelope) {
            Ok(notification) => self.notify(notification).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!(channel = %channel, event = event.as_str(), "Failed to push notification: {}", e);
        }
    }
}

impl Default for WsBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl Notifier for WsBroadcaster {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        // No receivers just means nobody is listening
        let _ = self.sender.send(notification);
        Ok(())
    }
}

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(channel): Path<String>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, channel, state))
}

async fn handle_socket(socket: WebSocket, channel: String, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.broadcaster().subscribe();

    WS_CONNECTIONS_TOTAL.inc();
    WS_CONNECTIONS_ACTIVE.inc();
    info!(channel = %channel, "WebSocket client connected");

    let subscribed = channel.clone();
    let send_task = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(notification) if notification.channel == subscribed => {
                    WS_MESSAGES_SENT
                        .with_label_values(&[notification.event.as_str()])
                        .inc();
                    let frame = OutboundFrame {
                        event: notification.event,
                        data: notification.data,
                    };
                    let json = match serde_json::to_string(&frame) {
                        Ok(json) => json,
                        Err(e) => {
                            warn!("Failed to serialize frame: {}", e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        debug!("WebSocket send failed, client disconnected");
                        break;
                    }
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(channel = %subscribed, "WebSocket client lagged, skipped {} messages", n);
                    WS_LAG_EVENTS.inc();
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Broadcast channel closed");
                    break;
                }
            }
        }
    });

    while let Some(result) = receiver.next().await {
        match result {
            Ok(Message::Close(_)) => {
                debug!("WebSocket client requested close");
                break;
            }
            Ok(Message::Text(text)) => {
                handle_client_frame(&state, &channel, text.as_str()).await;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("WebSocket receive error: {}", e);
                break;
            }
        }
    }

    send_task.abort();
    WS_CONNECTIONS_ACTIVE.dec();
    info!(channel = %channel, "WebSocket client disconnected");
}

/// Handles one inbound text frame for `channel`.
///
/// A `client-request` with a rejected token gets an `invalid-token` push;
/// an accepted one is queued and answered with `queue-status`. Anything
/// else is ignored.
pub async fn handle_client_frame(state: &AppState, channel: &str, text: &str) {
    let frame: InboundFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            debug!(channel = %channel, "Ignoring malformed frame: {}", e);
            return;
        }
    };
    if frame.event != "client-request" {
        debug!(channel = %channel, event = %frame.event, "Ignoring client event");
        return;
    }

    let request: ClientRequest = match serde_json::from_value(frame.data) {
        Ok(request) => request,
        Err(e) => {
            let envelope = Envelope::error(format!("Invalid request: {e}"));
            state
                .broadcaster()
                .push(channel, NotificationEvent::QueueStatus, &envelope)
                .await;
            return;
        }
    };

    let auth_request = AuthRequest::from_token(request.token.as_deref().unwrap_or_default());
    if let Err(e) = state.photo_auth().authenticate(&auth_request).await {
        AUTH_FAILURES_TOTAL.with_label_values(&["ws", e.reason()]).inc();
        debug!(channel = %channel, "Rejected client request: {}", e);
        state
            .broadcaster()
            .push(channel, NotificationEvent::InvalidToken, &Envelope::error(e.to_string()))
            .await;
        return;
    }

    let envelope = match submit_photo(state, request.submission, channel) {
        Ok(envelope) => envelope,
        Err(e) => Envelope::failure(e.message, None),
    };
    state
        .broadcaster()
        .push(channel, NotificationEvent::QueueStatus, &envelope)
        .await;
}
