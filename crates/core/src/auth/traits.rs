use async_trait::async_trait;
use thiserror::Error;

use super::types::{AuthRequest, Identity};

#[derive(Debug, Error)]
pub enum AuthError {
    /// No credential was presented.
    #[error("Token not provided")]
    NotAuthenticated,

    /// Shown to clients as is.
    #[error("{0}")]
    InvalidCredentials(String),

    #[error("Authentication service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl AuthError {
    /// Metric label for this failure.
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::NotAuthenticated => "not_authenticated",
            AuthError::InvalidCredentials(_) => "invalid_credentials",
            AuthError::ServiceUnavailable(_) => "service_unavailable",
            AuthError::ConfigurationError(_) => "internal_error",
        }
    }
}

/// Checks the bearer credential of an HTTP request or WebSocket frame.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, request: &AuthRequest) -> Result<Identity, AuthError>;

    fn method_name(&self) -> &'static str;

    /// False when every request is accepted without looking at it.
    fn requires_token(&self) -> bool {
        true
    }
}
