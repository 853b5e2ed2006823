//! HTTP implementation of the auth gateway.

use crate::error::{GatewayError, GatewayResult};
use crate::types::{AuthPayload, LoginRequest, RefreshPayload, RegisterRequest, User};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use tracing::{debug, warn};

/// Summarize a response body for logs without echoing its contents.
fn summarize_response_body(body: &str) -> String {
    let mut hasher = DefaultHasher::new();
    body.hash(&mut hasher);
    format!("len={},digest={:016x}", body.len(), hasher.finish())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
struct UserEnvelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    user: Option<User>,
}

/// The REST operations the session controller depends on.
///
/// The controller takes this as a trait object so tests can script the
/// gateway without a server.
#[async_trait]
pub trait AuthGateway: Send + Sync {
    /// Exchange credentials for a token pair and user record.
    async fn login(&self, request: &LoginRequest) -> GatewayResult<AuthPayload>;

    /// Create an account; responds with the same shape as login.
    async fn register(&self, request: &RegisterRequest) -> GatewayResult<AuthPayload>;

    /// Fetch the user the access token belongs to.
    async fn current_user(&self, access_token: &str) -> GatewayResult<User>;

    /// Exchange a refresh token for a new token pair.
    async fn refresh(&self, refresh_token: &str) -> GatewayResult<RefreshPayload>;

    /// Invalidate the session server-side. Callers treat failures as
    /// advisory.
    async fn logout(&self, access_token: &str) -> GatewayResult<()>;
}

/// `reqwest`-backed gateway client.
#[derive(Clone)]
pub struct HttpAuthGateway {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpAuthGateway {
    /// Create a new gateway client.
    ///
    /// # Arguments
    /// * `base_url` - The REST API base URL (e.g. `https://api.lettings.app/api`)
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Build the URL for an auth endpoint.
    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/{}", self.base_url, path)
    }

    /// Parse a login/register response body.
    ///
    /// The backend answers rejected credentials with a JSON body carrying
    /// `success: false` and a message; that body is returned verbatim so
    /// the caller can render it. Only an unparseable body becomes an
    /// error.
    fn parse_auth_body(status: reqwest::StatusCode, body: &str) -> GatewayResult<AuthPayload> {
        match serde_json::from_str::<AuthPayload>(body) {
            Ok(payload) => Ok(payload),
            Err(_) => {
                let body_summary = summarize_response_body(body);
                warn!(status = %status, body_summary = %body_summary, "Unparseable auth response");
                Err(GatewayError::Rejected {
                    status: status.as_u16(),
                    message: format!("Unexpected response from server ({})", status),
                })
            }
        }
    }
}

#[async_trait]
impl AuthGateway for HttpAuthGateway {
    async fn login(&self, request: &LoginRequest) -> GatewayResult<AuthPayload> {
        let url = self.auth_url("login");
        debug!(url = %url, email = %request.email, "Attempting login");

        let response = self.http_client.post(&url).json(request).send().await?;

        let status = response.status();
        let body = response.text().await?;
        Self::parse_auth_body(status, &body)
    }

    async fn register(&self, request: &RegisterRequest) -> GatewayResult<AuthPayload> {
        let url = self.auth_url("register");
        debug!(url = %url, email = %request.email, role = %request.role, "Attempting registration");

        let response = self.http_client.post(&url).json(request).send().await?;

        let status = response.status();
        let body = response.text().await?;
        Self::parse_auth_body(status, &body)
    }

    async fn current_user(&self, access_token: &str) -> GatewayResult<User> {
        let url = self.auth_url("me");
        debug!(url = %url, "Fetching current user");

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(access_token)
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let body_summary = summarize_response_body(&body);
            warn!(status = %status, body_summary = %body_summary, "Current-user check rejected");
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                message: "Access token rejected".to_string(),
            });
        }

        let envelope: UserEnvelope = response.json().await?;
        match envelope.user {
            Some(user) if envelope.success => Ok(user),
            _ => Err(GatewayError::Rejected {
                status: 200,
                message: "User missing from response".to_string(),
            }),
        }
    }

    async fn refresh(&self, refresh_token: &str) -> GatewayResult<RefreshPayload> {
        let url = self.auth_url("refresh-token");
        debug!(url = %url, "Refreshing token pair");

        let response = self
            .http_client
            .post(&url)
            .json(&RefreshRequest { refresh_token })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let body_summary = summarize_response_body(&body);
            warn!(status = %status, body_summary = %body_summary, "Token refresh rejected");
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                message: "Refresh token rejected".to_string(),
            });
        }

        let payload: RefreshPayload = response.json().await?;
        Ok(payload)
    }

    async fn logout(&self, access_token: &str) -> GatewayResult<()> {
        let url = self.auth_url("logout");
        debug!(url = %url, "Notifying gateway of logout");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            // Remote logout is best-effort; the caller clears local state
            // regardless.
            warn!(status = %response.status(), "Remote logout rejected");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation_trims_trailing_slash() {
        let gateway = HttpAuthGateway::new("https://api.test.app/api/");
        assert_eq!(gateway.base_url, "https://api.test.app/api");
    }

    #[test]
    fn test_auth_url() {
        let gateway = HttpAuthGateway::new("https://api.test.app/api");
        assert_eq!(gateway.auth_url("login"), "https://api.test.app/api/auth/login");
        assert_eq!(
            gateway.auth_url("refresh-token"),
            "https://api.test.app/api/auth/refresh-token"
        );
    }

    #[test]
    fn test_parse_auth_body_failure_payload_is_verbatim() {
        let status = reqwest::StatusCode::UNAUTHORIZED;
        let body = r#"{"success": false, "message": "Invalid credentials"}"#;

        let payload = HttpAuthGateway::parse_auth_body(status, body).unwrap();
        assert!(!payload.success);
        assert_eq!(payload.message.as_deref(), Some("Invalid credentials"));
    }

    #[test]
    fn test_parse_auth_body_unparseable_is_rejected() {
        let status = reqwest::StatusCode::BAD_GATEWAY;
        let result = HttpAuthGateway::parse_auth_body(status, "<html>oops</html>");

        match result {
            Err(GatewayError::Rejected { status, .. }) => assert_eq!(status, 502),
            other => panic!("Expected Rejected, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_summarize_response_body_hides_content() {
        let summary = summarize_response_body("secret-token-material");
        assert!(summary.starts_with("len=21,digest="));
        assert!(!summary.contains("secret"));
    }
}
