//! Signed-in session state
//!
//! Tracks the current user profile on top of [`AuthApi`] and decides where
//! the user lands after login and which pages they may see.

use tokio::sync::RwLock;

use crate::api::{ApiError, AuthApi, LoginPayload, Profile};
use crate::security::Sanitizer;

/// Landing page for admins
pub const ADMIN_HOME: &str = "/admin";

/// Landing page for everyone else
pub const HOME: &str = "/";

/// Where a user goes right after signing in
pub fn landing_path(profile: &Profile) -> &'static str {
    if profile.is_admin() {
        ADMIN_HOME
    } else {
        HOME
    }
}

/// The current user's session
pub struct AuthSession {
    api: AuthApi,
    user: RwLock<Option<Profile>>,
}

impl AuthSession {
    pub fn new(api: AuthApi) -> Self {
        Self {
            api,
            user: RwLock::new(None),
        }
    }

    pub fn api(&self) -> &AuthApi {
        &self.api
    }

    /// Cached profile of the signed-in user
    pub async fn current_user(&self) -> Option<Profile> {
        self.user.read().await.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.user.read().await.is_some()
    }

    /// Loads the profile from the backend and caches it
    ///
    /// Any failure counts as signed out.
    pub async fn fetch_profile(&self) -> Option<Profile> {
        let profile = match self.api.profile().await {
            Ok(response) => response.data,
            Err(e) => {
                tracing::debug!("No active session: {}", e);
                None
            }
        };
        *self.user.write().await = profile.clone();
        profile
    }

    /// Signs in, loads the profile and redirects to the landing page
    ///
    /// Returns the landing path, or `None` if the backend accepted the
    /// credentials but no profile could be loaded.
    pub async fn login(&self, email: &str, password: &str) -> Result<Option<&'static str>, ApiError> {
        Sanitizer::validate_credentials(email, password)?;

        self.api
            .login(&LoginPayload::new(email.trim(), password))
            .await?;

        match self.fetch_profile().await {
            Some(profile) => {
                let landing = landing_path(&profile);
                tracing::info!(
                    "Signed in as {} ({:?})",
                    Sanitizer::sanitize_email(&profile.email),
                    profile.role
                );
                self.api.client().navigator().redirect(landing);
                Ok(Some(landing))
            }
            None => {
                tracing::warn!("Login accepted but profile unavailable");
                Ok(None)
            }
        }
    }

    /// Creates an account, then signs in with the same credentials
    pub async fn register(&self, email: &str, password: &str) -> Result<Option<&'static str>, ApiError> {
        Sanitizer::validate_credentials(email, password)?;

        self.api
            .register(&LoginPayload::new(email.trim(), password))
            .await?;
        self.login(email, password).await
    }

    /// Signs out and forgets the cached profile
    pub async fn logout(&self) {
        self.api.logout().await;
        *self.user.write().await = None;
    }

    /// Login page path when nobody is signed in
    pub async fn require_auth(&self) -> Option<String> {
        if self.is_authenticated().await {
            None
        } else {
            Some(self.api.client().config().login_path.clone())
        }
    }

    /// Redirect needed before showing an admin page, if any
    pub async fn admin_redirect(&self) -> Option<String> {
        match self.user.read().await.as_ref() {
            None => Some(self.api.client().config().login_path.clone()),
            Some(profile) if !profile.is_admin() => Some(HOME.to_string()),
            Some(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{paths, Harness};
    use crate::api::Role;
    use crate::auth::{TokenKind, TokenStore};
    use crate::security::CredentialError;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, ResponseTemplate};

    async fn mount_login(h: &Harness) {
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": 200,
                "message": "ok",
                "data": { "tokens": { "accessToken": "acc", "refreshToken": "ref" } }
            })))
            .mount(&h.server)
            .await;
    }

    async fn mount_profile(h: &Harness, role: &str) {
        Mock::given(method("GET"))
            .and(path("/auth/profile"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": 200,
                "message": "ok",
                "data": { "userId": 1, "email": "buyer@example.com", "money": 0, "role": role }
            })))
            .mount(&h.server)
            .await;
    }

    #[tokio::test]
    async fn test_admin_lands_on_admin() {
        let h = Harness::start(true).await;
        mount_login(&h).await;
        mount_profile(&h, "ADMIN").await;
        let session = AuthSession::new(h.auth());

        let landing = session.login("buyer@example.com", "hunter22").await.unwrap();

        assert_eq!(landing, Some(ADMIN_HOME));
        assert_eq!(h.nav.last_path().as_deref(), Some("/admin"));
        assert!(session.is_authenticated().await);
        assert_eq!(session.current_user().await.unwrap().role, Role::Admin);
        assert!(session.admin_redirect().await.is_none());
        assert!(session.require_auth().await.is_none());
    }

    #[tokio::test]
    async fn test_user_lands_on_home_and_is_kept_out_of_admin() {
        let h = Harness::start(true).await;
        mount_login(&h).await;
        mount_profile(&h, "USER").await;
        let session = AuthSession::new(h.auth());

        let landing = session.login("buyer@example.com", "hunter22").await.unwrap();

        assert_eq!(landing, Some(HOME));
        assert_eq!(session.admin_redirect().await.as_deref(), Some("/"));
    }

    #[tokio::test]
    async fn test_invalid_input_sends_nothing() {
        let h = Harness::start(true).await;
        let session = AuthSession::new(h.auth());

        let err = session.login("not-an-email", "hunter22").await.unwrap_err();
        assert!(matches!(
            err,
            ApiError::Validation(CredentialError::InvalidEmail)
        ));

        let err = session.register("buyer@example.com", "123").await.unwrap_err();
        assert!(matches!(
            err,
            ApiError::Validation(CredentialError::PasswordTooShort(6))
        ));

        assert!(paths(&h.server).await.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_profile_failure_means_signed_out() {
        let h = Harness::start(true).await;
        Mock::given(method("GET"))
            .and(path("/auth/profile"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&h.server)
            .await;
        let session = AuthSession::new(h.auth());

        assert!(session.fetch_profile().await.is_none());
        assert!(!session.is_authenticated().await);
        assert_eq!(session.require_auth().await.as_deref(), Some("/login"));
        assert_eq!(session.admin_redirect().await.as_deref(), Some("/login"));
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let h = Harness::start(true).await;
        Mock::given(method("POST"))
            .and(path("/auth/register"))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(json!({ "status": 201, "message": "created", "data": null })),
            )
            .mount(&h.server)
            .await;
        mount_login(&h).await;
        mount_profile(&h, "USER").await;
        let session = AuthSession::new(h.auth());

        let landing = session.register("new@example.com", "secret99").await.unwrap();

        assert_eq!(landing, Some(HOME));
        assert_eq!(
            paths(&h.server).await,
            vec!["/auth/register", "/auth/login", "/auth/profile"]
        );
    }

    #[tokio::test]
    async fn test_logout_forgets_user() {
        let h = Harness::start(true).await;
        mount_login(&h).await;
        mount_profile(&h, "USER").await;
        Mock::given(method("POST"))
            .and(path("/auth/logout"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": 200 })))
            .mount(&h.server)
            .await;
        let session = AuthSession::new(h.auth());
        session.login("buyer@example.com", "hunter22").await.unwrap();

        session.logout().await;

        assert!(!session.is_authenticated().await);
        assert!(h.store.get(TokenKind::Access).unwrap().is_none());
        assert_eq!(h.nav.last_path().as_deref(), Some("/login"));
    }
}
