//! Zeroizing string wrapper for access and refresh tokens
//!
//! Tokens read from the token store or parsed out of auth responses live in
//! a `SecureString` for as long as the client holds them.

use std::fmt;
use std::ops::Deref;

use reqwest::header::{HeaderValue, InvalidHeaderValue};
use zeroize::Zeroize;

/// A token string whose memory is cleared when dropped
///
/// `Debug` is redacted so a token can sit inside logged structs without
/// leaking, and equality is constant-time.
///
/// # Example
///
/// ```
/// use bestgame_client::security::SecureString;
///
/// let token = SecureString::from("eyJhbGciOiJIUzI1NiJ9.payload.sig");
/// assert!(token.starts_with("eyJ"));
/// assert!(!format!("{:?}", token).contains("payload"));
/// ```
#[derive(Clone)]
pub struct SecureString {
    inner: String,
}

impl SecureString {
    /// Wraps an owned string without copying it
    pub fn new(s: String) -> Self {
        Self { inner: s }
    }

    /// Returns the token as a slice
    pub fn as_str(&self) -> &str {
        &self.inner
    }

    /// Returns the length of the token in bytes
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns true if the token is empty
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Builds an `Authorization: Bearer <token>` header value
    ///
    /// The returned value is flagged as sensitive so hyper never prints it.
    pub fn bearer_header(&self) -> Result<HeaderValue, InvalidHeaderValue> {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", self.inner))?;
        value.set_sensitive(true);
        Ok(value)
    }
}

impl Drop for SecureString {
    fn drop(&mut self) {
        self.inner.zeroize();
    }
}

impl Zeroize for SecureString {
    fn zeroize(&mut self) {
        self.inner.zeroize();
    }
}

impl Deref for SecureString {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl AsRef<str> for SecureString {
    fn as_ref(&self) -> &str {
        &self.inner
    }
}

impl From<String> for SecureString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecureString {
    fn from(s: &str) -> Self {
        Self::new(s.to_string())
    }
}

impl fmt::Debug for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureString")
            .field("len", &self.inner.len())
            .field("content", &"[REDACTED]")
            .finish()
    }
}

impl PartialEq for SecureString {
    fn eq(&self, other: &Self) -> bool {
        constant_time_eq(self.inner.as_bytes(), other.inner.as_bytes())
    }
}

impl Eq for SecureString {}

impl PartialEq<str> for SecureString {
    fn eq(&self, other: &str) -> bool {
        constant_time_eq(self.inner.as_bytes(), other.as_bytes())
    }
}

impl PartialEq<&str> for SecureString {
    fn eq(&self, other: &&str) -> bool {
        constant_time_eq(self.inner.as_bytes(), other.as_bytes())
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_is_redacted() {
        let token = SecureString::from("access-abc123");
        let debug_output = format!("{:?}", token);
        assert!(!debug_output.contains("abc123"));
        assert!(debug_output.contains("REDACTED"));
        assert!(debug_output.contains("len"));
    }

    #[test]
    fn test_equality() {
        let a = SecureString::from("same");
        let b = SecureString::from(String::from("same"));
        let c = SecureString::from("other");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a == "same");
        assert!(a != "sam");
    }

    #[test]
    fn test_bearer_header() {
        let token = SecureString::from("tok-1");
        let header = token.bearer_header().unwrap();
        assert_eq!(header.to_str().unwrap(), "Bearer tok-1");
        assert!(header.is_sensitive());
    }

    #[test]
    fn test_bearer_header_rejects_newlines() {
        let token = SecureString::from("bad\ntoken");
        assert!(token.bearer_header().is_err());
    }

    #[test]
    fn test_zeroize() {
        let mut token = SecureString::from("secret");
        token.zeroize();
        assert!(token.is_empty());
        assert_eq!(token.len(), 0);
    }

    #[test]
    fn test_constant_time_eq_lengths() {
        assert!(constant_time_eq(b"hello", b"hello"));
        assert!(!constant_time_eq(b"hello", b"world"));
        assert!(!constant_time_eq(b"short", b"longer string"));
    }
}
