//! BestGame Client - Authenticated access to the BestGameAccount storefront
//!
//! A client for the storefront backend that keeps the user signed in:
//! requests carry the session cookie when the environment accepts
//! cross-site cookies, a bearer token otherwise, and an expired session is
//! refreshed transparently.
//!
//! ## Credentials
//!
//! Every request first asks the [`auth::CookieProbe`] whether cookies are
//! usable. If they are, the request goes through the cookie jar and no
//! bearer header is added. If not, cookies are omitted and the locally
//! stored access token (if any) is sent as `Authorization: Bearer`.
//!
//! ## Refresh on 401
//!
//! When a request comes back 401 (and it is neither the refresh endpoint
//! itself nor marked `skip_auth_retry`):
//!
//! 1. If cookies were used, a stored access token was not sent yet and no
//!    refresh token is available, the request is repeated once with that
//!    bearer token.
//! 2. Otherwise (or if it is still 401) the session is refreshed once and
//!    the request is repeated once more. The retry carries the renewed
//!    access token whenever a local access token was in play.
//! 3. If the refresh fails, stored tokens are cleared, the user is sent to
//!    the login page and the refresh error is returned.
//!
//! A single call therefore triggers at most one refresh. Concurrent calls
//! that hit 401 at the same time each refresh on their own.
//!
//! ## Architecture
//!
//! - **Api**: request wrapper ([`ApiClient`]) and typed auth endpoints
//! - **Auth**: token stores, cookie probe, login redirects
//! - **Session**: signed-in user profile and landing/guard decisions
//! - **Security**: token redaction, secure strings, input validation

pub mod api;
pub mod auth;
pub mod config;
pub mod security;
pub mod session;

pub use api::{ApiClient, ApiError, AuthApi, ParsedBody, RequestOptions};
pub use config::ClientConfig;
pub use session::AuthSession;

use tracing_subscriber::EnvFilter;

/// Default log filter when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "bestgame_client=debug,info";

/// Installs the global tracing subscriber, writing to stderr
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
