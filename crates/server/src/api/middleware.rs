//! Authentication and metrics middleware for API routes.

use axum::{
    body::Body,
    extract::{ConnectInfo, MatchedPath, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;
use naiade_core::{AuthError, AuthRequest, Authenticator, Identity};

use super::error::ApiError;
use crate::metrics::{
    normalize_path, AUTH_FAILURES_TOTAL, HTTP_REQUESTS_IN_FLIGHT, HTTP_REQUESTS_TOTAL,
    HTTP_REQUEST_DURATION,
};
use crate::state::AppState;

/// Metrics middleware that tracks HTTP request duration and counts.
///
/// Requests are labelled with their route template when one matched.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = match request.extensions().get::<MatchedPath>() {
        Some(matched) => matched.as_str().to_string(),
        None => normalize_path(request.uri().path()),
    };

    HTTP_REQUESTS_IN_FLIGHT.inc();

    let response = next.run(request).await;

    HTTP_REQUESTS_IN_FLIGHT.dec();

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    HTTP_REQUEST_DURATION
        .with_label_values(&[&method, &path, &status])
        .observe(duration);
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();

    response
}

/// Guards the ticket endpoints with the ticket authenticator.
pub async fn ticket_auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    authorize(state.ticket_auth(), "ticket", request, next).await
}

/// Guards single-photo submission with the photo authenticator.
pub async fn photo_auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    authorize(state.photo_auth(), "photo", request, next).await
}

async fn authorize(
    authenticator: &dyn Authenticator,
    surface: &str,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if !authenticator.requires_token() {
        request.extensions_mut().insert(Identity::anonymous());
        return next.run(request).await;
    }

    let headers: HashMap<String, String> = request
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_lowercase(), v.to_string()))
        })
        .collect();

    let source_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));

    let auth_request = AuthRequest { headers, source_ip };

    match authenticator.authenticate(&auth_request).await {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(e) => {
            let status = match &e {
                AuthError::NotAuthenticated | AuthError::InvalidCredentials(_) => {
                    StatusCode::UNAUTHORIZED
                }
                AuthError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                AuthError::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            AUTH_FAILURES_TOTAL
                .with_label_values(&[surface, e.reason()])
                .inc();
            ApiError::new(status, e.to_string()).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        http::{header, Request},
        middleware,
        routing::get,
        Router,
    };
    use http_body_util::BodyExt;
    use naiade_core::auth::{ApiKeyAuthenticator, NoneAuthenticator};
    use tower::ServiceExt;

    async fn dummy_handler() -> &'static str {
        "OK"
    }

    async fn guarded(authenticator: Arc<dyn Authenticator>) -> Router {
        let app = Router::new().route("/test", get(dummy_handler));
        app.layer(middleware::from_fn(move |request: Request<Body>, next: Next| {
            let authenticator = authenticator.clone();
            async move { authorize(authenticator.as_ref(), "test", request, next).await }
        }))
    }

    async fn call(app: Router, token: Option<&str>) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder().uri("/test");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let response = app
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_none_auth_allows_all() {
        let app = guarded(Arc::new(NoneAuthenticator::new())).await;
        let (status, _) = call(app, None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_valid_token() {
        let app = guarded(Arc::new(ApiKeyAuthenticator::new("secret-key".to_string()))).await;
        let (status, _) = call(app, Some("secret-key")).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_token() {
        let app = guarded(Arc::new(ApiKeyAuthenticator::new("secret-key".to_string()))).await;
        let (status, body) = call(app, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Token not provided");
    }

    #[tokio::test]
    async fn test_invalid_token() {
        let app = guarded(Arc::new(ApiKeyAuthenticator::new("secret-key".to_string()))).await;
        let (status, body) = call(app, Some("wrong-key")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Token invalid or expired");
    }
}
