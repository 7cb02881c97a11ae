use super::{
    types::{AuthConfig, AuthMethod, Config},
    ConfigError,
};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Auth sections carry the secrets their method needs
/// - Retry, TTL and size limits are positive
/// - At least one photo queue is configured
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    validate_auth("auth", &config.auth)?;
    validate_auth("ticket_auth", &config.ticket_auth)?;

    if config.transfer.io_retries == 0 {
        return Err(ConfigError::ValidationError(
            "transfer.io_retries must be at least 1".to_string(),
        ));
    }

    if config.photo.lock_ttl_secs == 0 {
        return Err(ConfigError::ValidationError(
            "photo.lock_ttl_secs must be at least 1".to_string(),
        ));
    }

    if config.photo.max_image_size_mb == 0 {
        return Err(ConfigError::ValidationError(
            "photo.max_image_size_mb must be at least 1".to_string(),
        ));
    }

    if config.queues.photo_queues.is_empty() {
        return Err(ConfigError::ValidationError(
            "queues.photo_queues must name at least one queue".to_string(),
        ));
    }

    if config.queues.all().iter().any(|q| q.trim().is_empty()) {
        return Err(ConfigError::ValidationError(
            "queue names cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_auth(section: &str, auth: &AuthConfig) -> Result<(), ConfigError> {
    match auth.method {
        AuthMethod::None => Ok(()),
        AuthMethod::ApiKey => match auth.api_key.as_deref() {
            Some(key) if !key.is_empty() => Ok(()),
            _ => Err(ConfigError::ValidationError(format!(
                "{section}.api_key must be set when method = \"api_key\""
            ))),
        },
        AuthMethod::Remote => match auth.validate_url.as_deref() {
            Some(url) if !url.is_empty() => Ok(()),
            _ => Err(ConfigError::ValidationError(format!(
                "{section}.validate_url must be set when method = \"remote\""
            ))),
        },
    }
}
