//! Authentication module - Token storage, cookie capability and redirects
//!
//! Provides the building blocks the request wrapper coordinates:
//! - Token storage (memory, SQLite file, OS credential manager)
//! - Cookie capability probing against the shared cookie jar
//! - Navigation to the login page when auth cannot be recovered

mod cookie_probe;
mod navigator;
mod token_store;

pub(crate) use cookie_probe::header_has_cookie;
pub use cookie_probe::{CookieProbe, FixedCookieProbe, JarCookieProbe};
pub use navigator::{BrowserNavigator, Navigator, RecordingNavigator, Redirect};
pub use token_store::{
    KeyringTokenStore, MemoryTokenStore, SqliteTokenStore, TokenKind, TokenStore,
    TokenStoreError, Tokens,
};

#[cfg(test)]
pub(crate) use cookie_probe::MockCookieProbe;
#[cfg(test)]
pub(crate) use navigator::MockNavigator;
#[cfg(test)]
pub(crate) use token_store::MockTokenStore;
