//! Ticket API handlers.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

use naiade_core::{
    CreateTaskRequest, Envelope, ServiceKind, Task, TaskError, TaskStatus,
};

use super::error::ApiError;
use crate::metrics::TASKS_CREATED_TOTAL;
use crate::state::AppState;

/// Optional body of a ticket creation.
#[derive(Debug, Default, Deserialize)]
pub struct CreateTicketBody {
    /// Defaults to face restoration.
    pub service: Option<String>,
}

/// Public view of a task.
#[derive(Debug, Serialize)]
pub struct TicketResponse {
    pub ticket: String,
    pub service: ServiceKind,
    pub status: TaskStatus,
    pub message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Task> for TicketResponse {
    fn from(task: Task) -> Self {
        Self {
            ticket: task.ticket,
            service: task.service,
            status: task.status,
            message: task.message,
            created_at: task.created_at.to_rfc3339(),
            updated_at: task.updated_at.to_rfc3339(),
        }
    }
}

fn parse_body(body: &Bytes) -> Result<ServiceKind, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ServiceKind::Gfpgan);
    }
    let body: CreateTicketBody = serde_json::from_slice(body)
        .map_err(|e| ApiError::bad_request(format!("Invalid body: {e}")))?;
    match body.service {
        Some(service) => service
            .parse()
            .map_err(|e| ApiError::bad_request(format!("Invalid service: {e}"))),
        None => Ok(ServiceKind::Gfpgan),
    }
}

/// `POST /api/naiade/tickets/{ticket}`
///
/// Records the ticket as `PENDING` and schedules it. A known ticket is a
/// conflict.
pub async fn create_ticket(
    State(state): State<Arc<AppState>>,
    Path(ticket): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, Json<Envelope<TicketResponse>>), ApiError> {
    let ticket = ticket.trim().to_string();
    if ticket.is_empty() {
        return Err(ApiError::bad_request("Ticket is required"));
    }
    let service = parse_body(&body)?;

    let task = match state
        .tasks()
        .create(CreateTaskRequest::new(ticket.clone(), service))
    {
        Ok(task) => task,
        Err(TaskError::AlreadyExists(_)) => {
            return Err(ApiError::new(
                StatusCode::CONFLICT,
                format!("Ticket already exists: {ticket}"),
            ))
        }
        Err(e) => return Err(ApiError::internal(e.to_string())),
    };
    TASKS_CREATED_TOTAL.inc();

    if let Err(e) = state.scheduler().schedule(&task) {
        error!(ticket = %ticket, "Failed to schedule ticket: {}", e);
        let message = format!("Failed to schedule processing: {e}");
        if let Err(e) = state
            .tasks()
            .transition(&ticket, TaskStatus::Failed, Some(&message))
        {
            error!(ticket = %ticket, "Failed to record scheduling failure: {}", e);
        }
        return Err(ApiError::internal(message));
    }

    info!(ticket = %ticket, service = %service, "Ticket accepted");
    Ok((
        StatusCode::CREATED,
        Json(Envelope::ok("Ticket created", TicketResponse::from(task))),
    ))
}

/// `GET /api/naiade/tickets/{ticket}`
pub async fn get_ticket(
    State(state): State<Arc<AppState>>,
    Path(ticket): Path<String>,
) -> Result<Json<Envelope<TicketResponse>>, ApiError> {
    match state.tasks().get(&ticket) {
        Ok(Some(task)) => Ok(Json(Envelope::ok(
            task.status.as_str(),
            TicketResponse::from(task),
        ))),
        Ok(None) => Err(ApiError::not_found(format!("Ticket not found: {ticket}"))),
        Err(e) => Err(ApiError::internal(e.to_string())),
    }
}
