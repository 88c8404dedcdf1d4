//! Auth endpoints of the storefront backend
//!
//! `/auth/login`, `/auth/register`, `/auth/refresh`, `/auth/logout` and
//! `/auth/profile`.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::client::{ApiClient, ApiError, ParsedBody, RequestOptions};
use crate::auth::Tokens;
use crate::security::Sanitizer;

/// Response envelope used by every backend endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiResponse<T> {
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

/// Login credentials
#[derive(Clone, Serialize)]
pub struct LoginPayload {
    pub email: String,
    pub password: String,
}

impl LoginPayload {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for LoginPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginPayload")
            .field("email", &Sanitizer::sanitize_email(&self.email))
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Registration takes the same fields as login
pub type RegisterPayload = LoginPayload;

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    User,
    #[serde(other)]
    Unknown,
}

/// The signed-in user, as returned by `/auth/profile`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub user_id: i64,
    pub email: String,
    /// Wallet balance
    #[serde(default)]
    pub money: f64,
    pub role: Role,
}

impl Profile {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Tokens issued by login/register
#[derive(Debug, Deserialize)]
struct IssuedTokens {
    #[serde(rename = "accessToken")]
    access_token: String,
    #[serde(rename = "refreshToken")]
    refresh_token: Option<String>,
}

/// Typed access to the auth endpoints
#[derive(Clone)]
pub struct AuthApi {
    client: Arc<ApiClient>,
}

impl AuthApi {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Arc<ApiClient> {
        &self.client
    }

    /// Logs in and keeps any issued tokens for bearer fallback
    ///
    /// A 401 here means bad credentials, so it is returned without a
    /// refresh attempt.
    pub async fn login(&self, payload: &LoginPayload) -> Result<ApiResponse<Value>, ApiError> {
        tracing::info!("Logging in as {}", Sanitizer::sanitize_email(&payload.email));
        self.issue_tokens("/auth/login", payload).await
    }

    /// Registers an account; the backend may sign the user in directly
    pub async fn register(
        &self,
        payload: &RegisterPayload,
    ) -> Result<ApiResponse<Value>, ApiError> {
        tracing::info!("Registering {}", Sanitizer::sanitize_email(&payload.email));
        self.issue_tokens("/auth/register", payload).await
    }

    async fn issue_tokens(
        &self,
        path: &str,
        payload: &LoginPayload,
    ) -> Result<ApiResponse<Value>, ApiError> {
        let options = RequestOptions::post().json(payload)?.skip_auth_retry();
        let body = self.client.request(path, options).await?;
        self.persist_issued_tokens(&body)?;
        body.into_json()
    }

    fn persist_issued_tokens(&self, body: &ParsedBody) -> Result<(), ApiError> {
        let issued = body
            .as_json()
            .and_then(|value| value.pointer("/data/tokens"))
            .and_then(|tokens| serde_json::from_value::<IssuedTokens>(tokens.clone()).ok());

        if let Some(issued) = issued {
            tracing::debug!(
                "Storing issued tokens (access {})",
                Sanitizer::sanitize_token(&issued.access_token)
            );
            let tokens = Tokens {
                access_token: issued.access_token.into(),
                refresh_token: issued.refresh_token.map(Into::into),
            };
            self.client.token_store().set(&tokens)?;
        }
        Ok(())
    }

    /// Current user profile
    pub async fn profile(&self) -> Result<ApiResponse<Profile>, ApiError> {
        self.client
            .request_json("/auth/profile", RequestOptions::get())
            .await
    }

    /// Mints a new access token
    pub async fn refresh(&self) -> Result<(), ApiError> {
        self.client.refresh().await
    }

    /// Ends the session
    ///
    /// The server call is best-effort; stored tokens are always cleared and
    /// the user is sent to the login page.
    pub async fn logout(&self) {
        let options = RequestOptions::post().skip_auth_retry();
        if let Err(e) = self.client.request("/auth/logout", options).await {
            tracing::warn!("Logout failed: {}", e);
        }
        self.client.clear_tokens();
        self.client.redirect_to_login();
    }
}
