use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{services::ServeDir, trace::TraceLayer};

use super::{handlers, middleware as mw, photos, tickets, ws};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let public_dir = state.config().storage.public_dir.clone();

    // Batch tickets
    let ticket_routes = Router::new()
        .route(
            "/naiade/tickets/{ticket}",
            post(tickets::create_ticket).get(tickets::get_ticket),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            mw::ticket_auth_middleware,
        ));

    // Single photos
    let photo_routes = Router::new()
        .route("/handle-message", post(photos::handle_message))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            mw::photo_auth_middleware,
        ));

    let api_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        .merge(ticket_routes)
        .merge(photo_routes);

    Router::new()
        .nest("/api", api_routes)
        .route("/ws/{channel}", get(ws::ws_handler))
        .route("/metrics", get(handlers::metrics))
        .nest_service("/processed", ServeDir::new(public_dir))
        .layer(middleware::from_fn(mw::metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
