//! Bearer credential checks for the HTTP and WebSocket surfaces.

mod api_key;
mod none;
mod remote;
mod traits;
mod types;

pub use api_key::ApiKeyAuthenticator;
pub use none::NoneAuthenticator;
pub use remote::RemoteTokenAuthenticator;
pub use traits::{AuthError, Authenticator};
pub use types::{AuthRequest, Identity};

use std::time::Duration;

use crate::config::{AuthConfig, AuthMethod};

/// Builds the authenticator an auth section describes.
pub fn create_authenticator(config: &AuthConfig) -> Result<Box<dyn Authenticator>, AuthError> {
    match config.method {
        AuthMethod::None => Ok(Box::new(NoneAuthenticator::new())),
        AuthMethod::ApiKey => {
            let api_key = config.api_key.clone().ok_or_else(|| {
                AuthError::ConfigurationError(
                    "api_key must be set when using ApiKey auth method".to_string(),
                )
            })?;
            Ok(Box::new(ApiKeyAuthenticator::new(api_key)))
        }
        AuthMethod::Remote => {
            let url = config.validate_url.clone().ok_or_else(|| {
                AuthError::ConfigurationError(
                    "validate_url must be set when using Remote auth method".to_string(),
                )
            })?;
            Ok(Box::new(RemoteTokenAuthenticator::new(
                url,
                config.bypass_token.clone(),
                Duration::from_secs(config.timeout_secs),
            )?))
        }
    }
}
