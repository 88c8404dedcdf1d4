//! Authenticated request wrapper
//!
//! Every call goes through [`ApiClient::request`], which picks cookie or
//! bearer credentials, recovers from a single 401 by refreshing the access
//! token, and parses the response body.

use std::sync::Arc;

use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::auth::{
    header_has_cookie, CookieProbe, FixedCookieProbe, JarCookieProbe, Navigator, TokenKind,
    TokenStore, TokenStoreError, Tokens,
};
use crate::config::ClientConfig;
use crate::security::{CredentialError, Sanitizer, SecureString};

/// Errors returned by the API client
#[derive(Debug, Error)]
pub enum ApiError {
    /// Backend answered with a non-2xx status
    #[error("{message} (HTTP {status})")]
    RequestFailed {
        status: StatusCode,
        message: String,
        body: ParsedBody,
    },

    /// Refresh attempted with no refresh token stored or in the cookie jar
    #[error("No refresh token available")]
    NoRefreshToken,

    /// Backend rejected the refresh call
    #[error("Refresh token failed (HTTP {status})")]
    RefreshFailed { status: StatusCode },

    /// Transport-level failure
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Base URL or path did not form a valid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Header value could not be built (e.g. token with control characters)
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// Response body could not be decoded
    #[error("Parse error: {0}")]
    Parse(String),

    /// Token storage failed
    #[error("Storage error: {0}")]
    Storage(#[from] TokenStoreError),

    /// Login input rejected before sending
    #[error("Validation error: {0}")]
    Validation(#[from] CredentialError),
}

impl ApiError {
    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::RequestFailed { status, .. } | Self::RefreshFailed { status } => Some(*status),
            Self::Network(e) => e.status(),
            _ => None,
        }
    }

    /// Returns true for a 401 from the backend
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }

    /// Parsed error body of a failed request
    pub fn body(&self) -> Option<&ParsedBody> {
        match self {
            Self::RequestFailed { body, .. } => Some(body),
            _ => None,
        }
    }
}

/// Response body, decoded according to its content type
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedBody {
    Json(Value),
    Text(String),
}

impl ParsedBody {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Text(_) => None,
        }
    }

    /// The backend's `message` field, when the body is a JSON object
    pub fn message(&self) -> Option<&str> {
        self.as_json()?.get("message")?.as_str()
    }

    /// Deserializes the body into `T`
    ///
    /// Text bodies are treated as a JSON string.
    pub fn into_json<T: DeserializeOwned>(self) -> Result<T, ApiError> {
        let value = match self {
            Self::Json(value) => value,
            Self::Text(text) => Value::String(text),
        };
        serde_json::from_value(value).map_err(|e| ApiError::Parse(e.to_string()))
    }
}

/// Per-request options
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// HTTP method, GET by default
    pub method: Method,
    /// Query pairs appended to the URL; a key may repeat
    pub query: Vec<(String, String)>,
    /// Headers merged over `Content-Type: application/json`
    pub headers: HeaderMap,
    /// JSON body
    pub body: Option<Value>,
    /// Return a 401 as-is instead of refreshing (login/register/logout)
    pub skip_auth_retry: bool,
}

impl RequestOptions {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            ..Default::default()
        }
    }

    pub fn get() -> Self {
        Self::new(Method::GET)
    }

    pub fn post() -> Self {
        Self::new(Method::POST)
    }

    pub fn put() -> Self {
        Self::new(Method::PUT)
    }

    pub fn patch() -> Self {
        Self::new(Method::PATCH)
    }

    pub fn delete() -> Self {
        Self::new(Method::DELETE)
    }

    /// Adds one query pair
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Adds a query pair only when `value` is present
    pub fn query_opt<V: ToString>(self, key: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(value) => self.query(key, value),
            None => self,
        }
    }

    /// Adds one pair per item, repeating the key
    pub fn query_all<I>(mut self, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: ToString,
    {
        let key = key.into();
        self.query
            .extend(values.into_iter().map(|v| (key.clone(), v.to_string())));
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Serializes `body` as the JSON request body
    pub fn json<T: Serialize + ?Sized>(self, body: &T) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body).map_err(|e| ApiError::Parse(e.to_string()))?;
        Ok(self.body(value))
    }

    pub fn skip_auth_retry(mut self) -> Self {
        self.skip_auth_retry = true;
        self
    }
}

/// Credentials attached to one attempt
struct Credentials {
    cookies: bool,
    bearer: Option<SecureString>,
}

/// Client for the storefront backend
///
/// Holds two reqwest clients sharing nothing but configuration: one sends
/// the cookie jar (`credentials: include`), the other never does
/// (`credentials: omit`).
pub struct ApiClient {
    config: ClientConfig,
    base_url: Url,
    jar: Option<Arc<Jar>>,
    cookie_client: Client,
    plain_client: Client,
    probe: Arc<dyn CookieProbe>,
    store: Arc<dyn TokenStore>,
    navigator: Arc<dyn Navigator>,
}

impl ApiClient {
    /// Creates a client for `config.api_base_url`
    pub fn new(
        config: ClientConfig,
        store: Arc<dyn TokenStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, ApiError> {
        let base_url = Url::parse(&config.api_base_url)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", config.api_base_url, e)))?;

        let plain_client = Client::builder().build()?;

        let (jar, cookie_client, probe): (Option<Arc<Jar>>, Client, Arc<dyn CookieProbe>) =
            if config.cookies_enabled {
                let jar = Arc::new(Jar::default());
                let client = Client::builder().cookie_provider(jar.clone()).build()?;
                let probe = Arc::new(JarCookieProbe::new(jar.clone(), base_url.clone()));
                (Some(jar), client, probe)
            } else {
                (None, plain_client.clone(), Arc::new(FixedCookieProbe(false)))
            };

        tracing::debug!(
            "API client for {} (cookie jar: {})",
            base_url,
            jar.is_some()
        );

        Ok(Self {
            config,
            base_url,
            jar,
            cookie_client,
            plain_client,
            probe,
            store,
            navigator,
        })
    }

    /// Replaces the cookie capability probe
    pub fn with_cookie_probe(mut self, probe: Arc<dyn CookieProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Shared cookie jar, `None` when cookies are disabled
    pub fn cookie_jar(&self) -> Option<&Arc<Jar>> {
        self.jar.as_ref()
    }

    pub fn token_store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    pub fn navigator(&self) -> &Arc<dyn Navigator> {
        &self.navigator
    }

    /// Joins `path` onto the base URL and appends `query`
    pub fn url_for(&self, path: &str, query: &[(String, String)]) -> Result<Url, ApiError> {
        let joined = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        let mut url = Url::parse(&joined).map_err(|e| ApiError::InvalidUrl(format!("{}: {}", joined, e)))?;
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
        Ok(url)
    }

    fn is_refresh_path(&self, path: &str) -> bool {
        let path = path.split(['?', '#']).next().unwrap_or(path);
        path.trim_end_matches('/') == self.config.refresh_path.trim_end_matches('/')
    }

    /// Issues a request, recovering from one 401 by refreshing
    ///
    /// See the crate docs for the credential and retry rules.
    pub async fn request(&self, path: &str, options: RequestOptions) -> Result<ParsedBody, ApiError> {
        let url = self.url_for(path, &options.query)?;
        let cookies = self.probe.cookies_usable();
        let local_access = self.store.get(TokenKind::Access)?;

        let mut creds = Credentials {
            cookies,
            bearer: if cookies { None } else { local_access.clone() },
        };
        let mut response = self.send(&url, &options, &creds).await?;

        if response.status() == StatusCode::UNAUTHORIZED
            && !options.skip_auth_retry
            && !self.is_refresh_path(path)
        {
            let had_local_access = local_access.is_some();

            // bearer fallback only when there is nothing to refresh with
            if creds.bearer.is_none() && !self.refresh_token_available()? {
                if let Some(token) = local_access {
                    tracing::debug!(
                        "Cookie auth rejected for {}, retrying with bearer {}",
                        path,
                        Sanitizer::sanitize_token(&token)
                    );
                    creds.bearer = Some(token);
                    response = self.send(&url, &options, &creds).await?;
                }
            }

            if response.status() == StatusCode::UNAUTHORIZED {
                let bearer_mode = had_local_access || !cookies;

                if let Err(e) = self.refresh().await {
                    tracing::warn!("Refresh failed: {}", e);
                    self.clear_tokens();
                    self.redirect_to_login();
                    return Err(e);
                }

                creds.bearer = if bearer_mode {
                    self.store.get(TokenKind::Access)?
                } else {
                    None
                };
                response = self.send(&url, &options, &creds).await?;
            }
        }

        handle_response(response).await
    }

    /// Issues a request and deserializes the body into `T`
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        self.request(path, options).await?.into_json()
    }

    /// Mints a new access token
    ///
    /// Uses the refresh cookie when the jar holds one. A locally stored
    /// refresh token is also sent, both as bearer header and JSON body, for
    /// clients whose refresh cookie was dropped.
    pub async fn refresh(&self) -> Result<(), ApiError> {
        let url = self.url_for(&self.config.refresh_path, &[])?;
        let stored_refresh = self.store.get(TokenKind::Refresh)?;

        if stored_refresh.is_none() && !self.refresh_cookie_present(&url) {
            return Err(ApiError::NoRefreshToken);
        }

        let mut options = RequestOptions::post();
        if let Some(token) = &stored_refresh {
            options = options.body(json!({ "refreshToken": token.as_str() }));
        }
        let creds = Credentials {
            cookies: true,
            bearer: stored_refresh,
        };

        let response = self.send(&url, &options, &creds).await?;
        let status = response.status();
        if !status.is_success() {
            tracing::warn!("Refresh rejected with HTTP {}", status);
            self.clear_tokens();
            return Err(ApiError::RefreshFailed { status });
        }

        let body = handle_response(response).await?;
        match extract_access_token(&body) {
            Some(token) => {
                tracing::info!("Access token refreshed ({})", Sanitizer::sanitize_token(&token));
                self.store.set(&Tokens::access_only(token))?;
            }
            None => tracing::debug!("Refresh response carried no access token, relying on cookies"),
        }
        Ok(())
    }

    /// Returns true if a refresh could be attempted right now
    ///
    /// A refresh token counts when it is stored locally or the jar holds the
    /// refresh cookie for the refresh endpoint.
    pub fn refresh_token_available(&self) -> Result<bool, ApiError> {
        if self.store.get(TokenKind::Refresh)?.is_some() {
            return Ok(true);
        }
        let url = self.url_for(&self.config.refresh_path, &[])?;
        Ok(self.refresh_cookie_present(&url))
    }

    fn refresh_cookie_present(&self, url: &Url) -> bool {
        self.jar
            .as_ref()
            .map_or(false, |jar| header_has_cookie(jar, url, &self.config.refresh_cookie_name))
    }

    /// Removes both stored tokens, logging instead of failing
    pub fn clear_tokens(&self) {
        if let Err(e) = self.store.clear() {
            tracing::error!("Failed to clear stored tokens: {}", e);
        }
    }

    /// Sends the user to the configured login page
    pub fn redirect_to_login(&self) {
        self.navigator.redirect(&self.config.login_path);
    }

    async fn send(
        &self,
        url: &Url,
        options: &RequestOptions,
        creds: &Credentials,
    ) -> Result<Response, ApiError> {
        let client = if creds.cookies {
            &self.cookie_client
        } else {
            &self.plain_client
        };

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.extend(options.headers.clone());

        if let Some(token) = &creds.bearer {
            let value = token
                .bearer_header()
                .map_err(|e| ApiError::InvalidHeader(format!("bearer token: {}", e)))?;
            headers.insert(AUTHORIZATION, value);
        }

        tracing::debug!(
            "{} {} (cookies: {}, bearer: {})",
            options.method,
            Sanitizer::sanitize_url(url.as_str()),
            creds.cookies,
            creds.bearer.is_some()
        );

        let mut builder = client
            .request(options.method.clone(), url.clone())
            .headers(headers);
        if let Some(body) = &options.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        tracing::debug!("Response status: {}", response.status());
        Ok(response)
    }
}

/// Decodes a response, turning non-2xx statuses into [`ApiError::RequestFailed`]
async fn handle_response(response: Response) -> Result<ParsedBody, ApiError> {
    let status = response.status();
    let is_json = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map_or(false, |ct| ct.contains("application/json"));

    let text = response.text().await?;
    let body = if is_json {
        match serde_json::from_str::<Value>(&text) {
            Ok(value) => ParsedBody::Json(value),
            Err(e) if status.is_success() => {
                return Err(ApiError::Parse(format!("Invalid JSON body: {}", e)))
            }
            Err(_) => ParsedBody::Text(text),
        }
    } else {
        ParsedBody::Text(text)
    };

    if !status.is_success() {
        let message = body
            .message()
            .map(str::to_string)
            .or_else(|| status.canonical_reason().map(str::to_string))
            .unwrap_or_else(|| "Request failed".to_string());
        return Err(ApiError::RequestFailed {
            status,
            message,
            body,
        });
    }

    Ok(body)
}

/// Finds the renewed access token in a refresh response
///
/// Accepts `data.accessToken` and `data.tokens.accessToken`.
fn extract_access_token(body: &ParsedBody) -> Option<SecureString> {
    let data = body.as_json()?.get("data")?;
    data.get("accessToken")
        .and_then(Value::as_str)
        .or_else(|| data.get("tokens")?.get("accessToken")?.as_str())
        .filter(|token| !token.is_empty())
        .map(SecureString::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{MemoryTokenStore, RecordingNavigator};

    fn client(base: &str) -> ApiClient {
        ApiClient::new(
            ClientConfig::with_base_url(base),
            Arc::new(MemoryTokenStore::new()),
            Arc::new(RecordingNavigator::new()),
        )
        .unwrap()
    }

    #[test]
    fn test_url_for_joins_and_encodes_query() {
        let client = client("https://api.example.com");
        let options = RequestOptions::get()
            .query("page", 2)
            .query_all("status", ["PAID", "PENDING"])
            .query_opt("search", None::<String>)
            .query("q", "mobile legends");

        let url = client.url_for("/order/my-orders", &options.query).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.example.com/order/my-orders?page=2&status=PAID&status=PENDING&q=mobile+legends"
        );
    }

    #[test]
    fn test_url_for_keeps_base_path() {
        let client = client("https://api.example.com/v1/");
        let url = client.url_for("auth/profile", &[]).unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/v1/auth/profile");
    }

    #[test]
    fn test_invalid_base_url() {
        let result = ApiClient::new(
            ClientConfig::with_base_url("not a url"),
            Arc::new(MemoryTokenStore::new()),
            Arc::new(RecordingNavigator::new()),
        );
        assert!(matches!(result, Err(ApiError::InvalidUrl(_))));
    }

    #[test]
    fn test_is_refresh_path() {
        let client = client("https://api.example.com");
        assert!(client.is_refresh_path("/auth/refresh"));
        assert!(client.is_refresh_path("/auth/refresh/"));
        assert!(client.is_refresh_path("/auth/refresh?x=1"));
        assert!(!client.is_refresh_path("/auth/profile"));
        assert!(!client.is_refresh_path("/auth/refresh-all"));
    }

    #[test]
    fn test_cookies_disabled_has_no_jar() {
        let mut config = ClientConfig::with_base_url("https://api.example.com");
        config.cookies_enabled = false;
        let client = ApiClient::new(
            config,
            Arc::new(MemoryTokenStore::new()),
            Arc::new(RecordingNavigator::new()),
        )
        .unwrap();

        assert!(client.cookie_jar().is_none());
        assert!(!client.probe.cookies_usable());
    }

    #[test]
    fn test_extract_access_token_shapes() {
        let flat = ParsedBody::Json(json!({ "data": { "accessToken": "flat-token" } }));
        assert_eq!(extract_access_token(&flat).unwrap(), "flat-token");

        let nested = ParsedBody::Json(json!({
            "status": 200,
            "data": { "tokens": { "accessToken": "nested-token", "refreshToken": "r" } }
        }));
        assert_eq!(extract_access_token(&nested).unwrap(), "nested-token");

        let empty = ParsedBody::Json(json!({ "data": { "accessToken": "" } }));
        assert!(extract_access_token(&empty).is_none());

        let missing = ParsedBody::Json(json!({ "message": "ok", "data": null }));
        assert!(extract_access_token(&missing).is_none());

        assert!(extract_access_token(&ParsedBody::Text("ok".into())).is_none());
    }

    #[test]
    fn test_parsed_body_message_and_into_json() {
        let body = ParsedBody::Json(json!({ "message": "Unauthorized", "status": 401 }));
        assert_eq!(body.message(), Some("Unauthorized"));
        assert!(ParsedBody::Text("x".into()).message().is_none());

        let text: String = ParsedBody::Text("pong".into()).into_json().unwrap();
        assert_eq!(text, "pong");

        let result: Result<Vec<i32>, _> = ParsedBody::Json(json!({ "a": 1 })).into_json();
        assert!(matches!(result, Err(ApiError::Parse(_))));
    }

    #[test]
    fn test_api_error_status() {
        let err = ApiError::RequestFailed {
            status: StatusCode::UNAUTHORIZED,
            message: "Unauthorized".into(),
            body: ParsedBody::Text(String::new()),
        };
        assert!(err.is_unauthorized());
        assert_eq!(err.to_string(), "Unauthorized (HTTP 401 Unauthorized)");
        assert!(err.body().is_some());

        let refresh = ApiError::RefreshFailed {
            status: StatusCode::FORBIDDEN,
        };
        assert_eq!(refresh.status(), Some(StatusCode::FORBIDDEN));
        assert!(!ApiError::NoRefreshToken.is_unauthorized());
    }

    #[test]
    fn test_request_options_json() {
        #[derive(Serialize)]
        struct Purchase {
            #[serde(rename = "gameAccountId")]
            game_account_id: u64,
        }

        let options = RequestOptions::post()
            .json(&Purchase { game_account_id: 42 })
            .unwrap()
            .skip_auth_retry();
        assert_eq!(options.method, Method::POST);
        assert_eq!(options.body, Some(json!({ "gameAccountId": 42 })));
        assert!(options.skip_auth_retry);
        assert_eq!(RequestOptions::default().method, Method::GET);
    }
}
