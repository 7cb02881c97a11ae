//! Single-photo submission.

use axum::{extract::State, Json};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info};

use naiade_core::{DispatchReceipt, Envelope, PhotoRequest, ServiceKind};

use super::error::ApiError;
use crate::state::AppState;

/// Photo parameters shared by the HTTP body and the WebSocket
/// `client-request` frame.
#[derive(Debug, Clone, Deserialize)]
pub struct PhotoSubmission {
    pub service: String,
    /// Image URL or inline `data:image/...;base64,` payload.
    #[serde(default)]
    pub photo_url: String,
    #[serde(default, rename = "bgColor")]
    pub bg_color: Option<String>,
    #[serde(default, rename = "canvasIndex")]
    pub canvas_index: Option<i64>,
    #[serde(default, rename = "elementIndex")]
    pub element_index: Option<i64>,
}

impl PhotoSubmission {
    pub fn into_request(self, channel: &str) -> Result<PhotoRequest, ApiError> {
        let service: ServiceKind = self
            .service
            .parse()
            .map_err(|e| ApiError::bad_request(format!("Invalid service: {e}")))?;
        if self.photo_url.trim().is_empty() {
            return Err(ApiError::bad_request("photo_url is required"));
        }
        if channel.trim().is_empty() {
            return Err(ApiError::bad_request("channel is required"));
        }

        Ok(PhotoRequest {
            service,
            source: self.photo_url,
            bg_color: self.bg_color,
            channel: channel.to_string(),
            canvas_index: self.canvas_index,
            element_index: self.element_index,
        })
    }
}

/// Body of `POST /api/handle-message`.
#[derive(Debug, Deserialize)]
pub struct HandleMessageBody {
    #[serde(flatten)]
    pub submission: PhotoSubmission,
    pub channel: String,
}

/// Queues a photo on the least-loaded photo queue.
pub fn submit_photo(
    state: &AppState,
    submission: PhotoSubmission,
    channel: &str,
) -> Result<Envelope<DispatchReceipt>, ApiError> {
    let request = submission.into_request(channel)?;
    let service = request.service;

    let receipt = state.dispatcher().dispatch(request).map_err(|e| {
        error!(channel = %channel, "Failed to queue photo: {}", e);
        ApiError::internal(e.to_string())
    })?;

    info!(channel = %channel, service = %service, queue = %receipt.queue, job_id = receipt.job_id, "Photo queued");
    Ok(Envelope::ok(receipt.estimate.status_message(), receipt))
}

/// `POST /api/handle-message`
pub async fn handle_message(
    State(state): State<Arc<AppState>>,
    Json(body): Json<HandleMessageBody>,
) -> Result<Json<Envelope<DispatchReceipt>>, ApiError> {
    submit_photo(&state, body.submission, &body.channel).map(Json)
}
