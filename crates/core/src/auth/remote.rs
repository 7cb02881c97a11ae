//! Bearer tokens checked against a remote validation endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use super::{AuthError, AuthRequest, Authenticator, Identity};

/// Forwards the bearer token to `validate_url`; any 2xx answer accepts it.
///
/// A configured bypass token is accepted without a network call.
pub struct RemoteTokenAuthenticator {
    client: Client,
    validate_url: String,
    bypass_token: Option<String>,
}

impl RemoteTokenAuthenticator {
    pub fn new(
        validate_url: String,
        bypass_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, AuthError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::ConfigurationError(e.to_string()))?;
        Ok(Self::with_client(client, validate_url, bypass_token))
    }

    pub fn with_client(client: Client, validate_url: String, bypass_token: Option<String>) -> Self {
        Self {
            client,
            validate_url,
            bypass_token: bypass_token.filter(|t| !t.is_empty()),
        }
    }
}

#[async_trait]
impl Authenticator for RemoteTokenAuthenticator {
    async fn authenticate(&self, request: &AuthRequest) -> Result<Identity, AuthError> {
        let token = request.bearer_token().ok_or(AuthError::NotAuthenticated)?;

        if self.bypass_token.as_deref() == Some(token) {
            debug!("Bypass token accepted");
            return Ok(Identity::new("bypass", "remote"));
        }

        let response = self
            .client
            .get(&self.validate_url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| {
                warn!(url = %self.validate_url, "Token validation request failed: {}", e);
                AuthError::ServiceUnavailable(e.to_string())
            })?;

        let status = response.status();
        if status.is_success() {
            Ok(Identity::new("remote_user", "remote"))
        } else {
            debug!(status = status.as_u16(), "Token rejected by validation endpoint");
            Err(AuthError::InvalidCredentials(
                "Token invalid or expired".to_string(),
            ))
        }
    }

    fn method_name(&self) -> &'static str {
        "remote"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answers 200 when the request carries `Bearer good`, 401 otherwise.
    async fn validation_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = Vec::new();
                    let mut chunk = [0u8; 1024];
                    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut chunk).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => buf.extend_from_slice(&chunk[..n]),
                        }
                    }
                    let head = String::from_utf8_lossy(&buf).to_lowercase();
                    let status = if head.contains("authorization: bearer good") {
                        "200 OK"
                    } else {
                        "401 Unauthorized"
                    };
                    let response = format!(
                        "HTTP/1.1 {status}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        format!("http://{addr}/validate-token")
    }

    fn authenticator(url: String) -> RemoteTokenAuthenticator {
        let client = Client::builder().no_proxy().build().unwrap();
        RemoteTokenAuthenticator::with_client(client, url, Some("admin".to_string()))
    }

    #[tokio::test]
    async fn test_valid_token_accepted() {
        let auth = authenticator(validation_server().await);
        let identity = auth
            .authenticate(&AuthRequest::from_token("good"))
            .await
            .unwrap();
        assert_eq!(identity.method, "remote");
    }

    #[tokio::test]
    async fn test_rejected_token() {
        let auth = authenticator(validation_server().await);
        let result = auth.authenticate(&AuthRequest::from_token("bad")).await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials(_))));
    }

    #[tokio::test]
    async fn test_bypass_token_skips_endpoint() {
        // Nothing listens here
        let auth = authenticator("http://127.0.0.1:1/validate-token".to_string());
        let identity = auth
            .authenticate(&AuthRequest::from_token("admin"))
            .await
            .unwrap();
        assert_eq!(identity.user_id, "bypass");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint() {
        let auth = authenticator("http://127.0.0.1:1/validate-token".to_string());
        let result = auth.authenticate(&AuthRequest::from_token("good")).await;
        assert!(matches!(result, Err(AuthError::ServiceUnavailable(_))));
    }

    #[tokio::test]
    async fn test_missing_token() {
        let auth = authenticator("http://127.0.0.1:1/validate-token".to_string());
        let result = auth.authenticate(&AuthRequest::from_token(" ")).await;
        assert!(matches!(result, Err(AuthError::NotAuthenticated)));
    }
}
