use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};

/// Credential-bearing parts of an inbound request.
#[derive(Debug, Clone)]
pub struct AuthRequest {
    /// Header names are lowercase.
    pub headers: HashMap<String, String>,
    pub source_ip: IpAddr,
}

impl AuthRequest {
    /// A request carrying only `token`, as received over a WebSocket frame.
    pub fn from_token(token: &str) -> Self {
        let mut headers = HashMap::new();
        headers.insert("authorization".to_string(), format!("Bearer {token}"));
        Self {
            headers,
            source_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
        }
    }

    /// The bearer credential, from `Authorization: Bearer <token>` or
    /// `X-API-Key`. Empty tokens count as missing.
    pub fn bearer_token(&self) -> Option<&str> {
        let from_header = self.headers.get("authorization").and_then(|value| {
            value
                .strip_prefix("Bearer ")
                .or_else(|| value.strip_prefix("bearer "))
        });
        from_header
            .or_else(|| self.headers.get("x-api-key").map(String::as_str))
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }
}

/// Who a request was authenticated as.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub method: String,
    pub claims: HashMap<String, serde_json::Value>,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self::new("anonymous", "none")
    }

    pub fn new(user_id: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            method: method.into(),
            claims: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(headers: &[(&str, &str)]) -> AuthRequest {
        AuthRequest {
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_lowercase(), v.to_string()))
                .collect(),
            source_ip: "127.0.0.1".parse().unwrap(),
        }
    }

    #[test]
    fn test_anonymous_identity() {
        let identity = Identity::anonymous();
        assert_eq!(identity.user_id, "anonymous");
        assert_eq!(identity.method, "none");
        assert!(identity.claims.is_empty());
    }

    #[test]
    fn test_bearer_token_sources() {
        assert_eq!(
            request(&[("Authorization", "Bearer abc")]).bearer_token(),
            Some("abc")
        );
        assert_eq!(
            request(&[("Authorization", "bearer abc")]).bearer_token(),
            Some("abc")
        );
        assert_eq!(request(&[("X-API-Key", "k")]).bearer_token(), Some("k"));
        assert_eq!(request(&[("Authorization", "Basic xyz")]).bearer_token(), None);
        assert_eq!(request(&[("Authorization", "Bearer  ")]).bearer_token(), None);
        assert_eq!(request(&[]).bearer_token(), None);
    }

    #[test]
    fn test_from_token() {
        assert_eq!(AuthRequest::from_token("t0k").bearer_token(), Some("t0k"));
        assert_eq!(AuthRequest::from_token("").bearer_token(), None);
    }
}
