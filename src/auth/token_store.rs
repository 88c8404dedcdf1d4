//! Persistent token storage
//!
//! Holds the access and refresh tokens under the `accessToken` and
//! `refreshToken` keys. Tokens are opaque: nothing here inspects their
//! shape or expiry.
//!
//! Three backends are provided:
//! - [`MemoryTokenStore`] keeps tokens for the life of the process
//! - [`SqliteTokenStore`] persists a key-value table in a SQLite file
//! - [`KeyringTokenStore`] uses the OS credential manager

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, RwLock};

use keyring::Entry;
use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;

use crate::security::SecureString;

/// Errors that can occur during token storage operations
#[derive(Debug, Error)]
pub enum TokenStoreError {
    /// Keyring operation failed
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    /// SQLite operation failed
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A thread panicked while holding the store lock
    #[error("Token store lock poisoned")]
    Poisoned,
}

/// Which of the two stored tokens to address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Short-lived bearer credential
    Access,
    /// Longer-lived credential used only to mint access tokens
    Refresh,
}

impl TokenKind {
    /// Storage key for this token
    pub fn storage_key(&self) -> &'static str {
        match self {
            Self::Access => "accessToken",
            Self::Refresh => "refreshToken",
        }
    }

    /// Both kinds, in storage order
    pub fn all() -> &'static [TokenKind] {
        &[Self::Access, Self::Refresh]
    }
}

/// A token pair to persist
///
/// The refresh token is optional: a refresh call renews only the access
/// token and leaves the stored refresh token untouched.
#[derive(Debug, Clone)]
pub struct Tokens {
    pub access_token: SecureString,
    pub refresh_token: Option<SecureString>,
}

impl Tokens {
    /// Access and refresh token together, as returned by login
    pub fn new(access_token: impl Into<SecureString>, refresh_token: impl Into<SecureString>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: Some(refresh_token.into()),
        }
    }

    /// Access token only, as returned by refresh
    pub fn access_only(access_token: impl Into<SecureString>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
        }
    }
}

/// Key-value storage for the client's tokens
#[cfg_attr(test, mockall::automock)]
pub trait TokenStore: Send + Sync {
    /// Reads a token, `None` when not stored
    fn get(&self, kind: TokenKind) -> Result<Option<SecureString>, TokenStoreError>;

    /// Writes the access token, and the refresh token when present
    fn set(&self, tokens: &Tokens) -> Result<(), TokenStoreError>;

    /// Removes both tokens
    fn clear(&self) -> Result<(), TokenStoreError>;
}

/// In-process token storage
#[derive(Default)]
pub struct MemoryTokenStore {
    tokens: RwLock<HashMap<TokenKind, SecureString>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self, kind: TokenKind) -> Result<Option<SecureString>, TokenStoreError> {
        let tokens = self.tokens.read().map_err(|_| TokenStoreError::Poisoned)?;
        Ok(tokens.get(&kind).cloned())
    }

    fn set(&self, tokens: &Tokens) -> Result<(), TokenStoreError> {
        let mut stored = self.tokens.write().map_err(|_| TokenStoreError::Poisoned)?;
        stored.insert(TokenKind::Access, tokens.access_token.clone());
        if let Some(refresh) = &tokens.refresh_token {
            stored.insert(TokenKind::Refresh, refresh.clone());
        }
        Ok(())
    }

    fn clear(&self) -> Result<(), TokenStoreError> {
        self.tokens
            .write()
            .map_err(|_| TokenStoreError::Poisoned)?
            .clear();
        Ok(())
    }
}

/// Token storage in a SQLite key-value table
///
/// The table mirrors browser local storage: one `TEXT` key, one `TEXT`
/// value, last write wins.
pub struct SqliteTokenStore {
    conn: Mutex<Connection>,
}

impl SqliteTokenStore {
    /// Opens (creating if needed) the store at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TokenStoreError> {
        let conn = Connection::open(path.as_ref())?;
        tracing::debug!("Opened token database at {:?}", path.as_ref());
        Self::init(conn)
    }

    /// Opens a store that lives only as long as this value
    pub fn open_in_memory() -> Result<Self, TokenStoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, TokenStoreError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS local_storage (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL
            )",
            [],
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> Result<T, rusqlite::Error>,
    ) -> Result<T, TokenStoreError> {
        let mut conn = self.conn.lock().map_err(|_| TokenStoreError::Poisoned)?;
        Ok(f(&mut conn)?)
    }
}

impl TokenStore for SqliteTokenStore {
    fn get(&self, kind: TokenKind) -> Result<Option<SecureString>, TokenStoreError> {
        let value = self.with_conn(|conn| {
            conn.query_row(
                "SELECT value FROM local_storage WHERE key = ?1",
                params![kind.storage_key()],
                |row| row.get::<_, String>(0),
            )
            .optional()
        })?;
        Ok(value.map(SecureString::new))
    }

    fn set(&self, tokens: &Tokens) -> Result<(), TokenStoreError> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT OR REPLACE INTO local_storage (key, value) VALUES (?1, ?2)",
                params![TokenKind::Access.storage_key(), tokens.access_token.as_str()],
            )?;
            if let Some(refresh) = &tokens.refresh_token {
                tx.execute(
                    "INSERT OR REPLACE INTO local_storage (key, value) VALUES (?1, ?2)",
                    params![TokenKind::Refresh.storage_key(), refresh.as_str()],
                )?;
            }
            tx.commit()
        })
    }

    fn clear(&self) -> Result<(), TokenStoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM local_storage WHERE key IN (?1, ?2)",
                params![
                    TokenKind::Access.storage_key(),
                    TokenKind::Refresh.storage_key()
                ],
            )
            .map(|_| ())
        })
    }
}

/// Token storage in the OS credential manager
///
/// Windows Credential Manager, macOS Keychain or the Linux Secret Service,
/// depending on platform. Each token is one entry under `service`.
pub struct KeyringTokenStore {
    service: String,
}

impl KeyringTokenStore {
    /// Creates a store with the default service name
    pub fn new() -> Self {
        Self::with_service("BestGameAccount")
    }

    /// Creates a store with a custom service name
    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    /// Returns the service name used for this store
    pub fn service(&self) -> &str {
        &self.service
    }

    fn entry(&self, kind: TokenKind) -> Result<Entry, TokenStoreError> {
        Ok(Entry::new(&self.service, kind.storage_key())?)
    }
}

impl Default for KeyringTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenStore for KeyringTokenStore {
    fn get(&self, kind: TokenKind) -> Result<Option<SecureString>, TokenStoreError> {
        match self.entry(kind)?.get_password() {
            Ok(password) => Ok(Some(SecureString::new(password))),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(TokenStoreError::Keyring(e)),
        }
    }

    fn set(&self, tokens: &Tokens) -> Result<(), TokenStoreError> {
        self.entry(TokenKind::Access)?
            .set_password(tokens.access_token.as_str())?;
        if let Some(refresh) = &tokens.refresh_token {
            self.entry(TokenKind::Refresh)?.set_password(refresh.as_str())?;
        }
        Ok(())
    }

    fn clear(&self) -> Result<(), TokenStoreError> {
        for kind in TokenKind::all() {
            match self.entry(*kind)?.delete_credential() {
                Ok(()) | Err(keyring::Error::NoEntry) => {}
                Err(e) => return Err(TokenStoreError::Keyring(e)),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise_store(store: &dyn TokenStore) {
        assert!(store.get(TokenKind::Access).unwrap().is_none());
        assert!(store.get(TokenKind::Refresh).unwrap().is_none());

        store.set(&Tokens::new("access-1", "refresh-1")).unwrap();
        assert_eq!(store.get(TokenKind::Access).unwrap().unwrap(), "access-1");
        assert_eq!(store.get(TokenKind::Refresh).unwrap().unwrap(), "refresh-1");

        // access-only write keeps the refresh token
        store.set(&Tokens::access_only("access-2")).unwrap();
        assert_eq!(store.get(TokenKind::Access).unwrap().unwrap(), "access-2");
        assert_eq!(store.get(TokenKind::Refresh).unwrap().unwrap(), "refresh-1");

        store.clear().unwrap();
        assert!(store.get(TokenKind::Access).unwrap().is_none());
        assert!(store.get(TokenKind::Refresh).unwrap().is_none());

        // clearing an empty store is fine
        store.clear().unwrap();
    }

    #[test]
    fn test_storage_keys() {
        assert_eq!(TokenKind::Access.storage_key(), "accessToken");
        assert_eq!(TokenKind::Refresh.storage_key(), "refreshToken");
        assert_eq!(TokenKind::all().len(), 2);
    }

    #[test]
    fn test_memory_store() {
        exercise_store(&MemoryTokenStore::new());
    }

    #[test]
    fn test_sqlite_store_in_memory() {
        exercise_store(&SqliteTokenStore::open_in_memory().unwrap());
    }

    #[test]
    fn test_sqlite_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.db");

        {
            let store = SqliteTokenStore::open(&path).unwrap();
            store.set(&Tokens::new("persisted-access", "persisted-refresh")).unwrap();
        }

        let reopened = SqliteTokenStore::open(&path).unwrap();
        assert_eq!(
            reopened.get(TokenKind::Access).unwrap().unwrap(),
            "persisted-access"
        );
        assert_eq!(
            reopened.get(TokenKind::Refresh).unwrap().unwrap(),
            "persisted-refresh"
        );
    }

    #[test]
    fn test_sqlite_clear_leaves_other_keys() {
        let store = SqliteTokenStore::open_in_memory().unwrap();
        store
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO local_storage (key, value) VALUES ('locale', 'vi')",
                    [],
                )
                .map(|_| ())
            })
            .unwrap();
        store.set(&Tokens::new("a", "r")).unwrap();
        store.clear().unwrap();

        let locale: String = store
            .with_conn(|conn| {
                conn.query_row(
                    "SELECT value FROM local_storage WHERE key = 'locale'",
                    [],
                    |row| row.get(0),
                )
            })
            .unwrap();
        assert_eq!(locale, "vi");
    }

    #[test]
    fn test_keyring_store_default_service() {
        assert_eq!(KeyringTokenStore::new().service(), "BestGameAccount");
    }

    #[test]
    #[ignore = "needs an OS credential manager"]
    fn test_keyring_store_roundtrip() {
        let store = KeyringTokenStore::with_service("BestGameAccount-Test");
        store.clear().unwrap();
        exercise_store(&store);
    }
}
