//! Log-safe rendering of credentials and login input checks

use thiserror::Error;

/// Minimum password length accepted by the storefront
pub const MIN_PASSWORD_LEN: usize = 6;

/// Errors raised when login or register input is rejected locally
#[derive(Debug, Error, PartialEq)]
pub enum CredentialError {
    /// Email field is empty
    #[error("Email is required")]
    EmptyEmail,

    /// Email does not look like an address
    #[error("Email is not valid")]
    InvalidEmail,

    /// Password shorter than the minimum
    #[error("Password must be at least {0} characters")]
    PasswordTooShort(usize),
}

/// Sanitizer for sensitive data
pub struct Sanitizer;

impl Sanitizer {
    /// Sanitizes an email address for safe logging
    ///
    /// # Examples
    ///
    /// ```
    /// use bestgame_client::security::Sanitizer;
    ///
    /// assert_eq!(Sanitizer::sanitize_email("player.one@example.com"), "pl...@example.com");
    /// assert_eq!(Sanitizer::sanitize_email("a@b.com"), "***@b.com");
    /// assert_eq!(Sanitizer::sanitize_email("invalid"), "***");
    /// ```
    pub fn sanitize_email(email: &str) -> String {
        match email.split_once('@') {
            Some((local, domain)) if local.chars().count() > 2 => {
                let prefix: String = local.chars().take(2).collect();
                format!("{}...@{}", prefix, domain)
            }
            Some((_, domain)) => format!("***@{}", domain),
            None => "***".to_string(),
        }
    }

    /// Sanitizes a token for safe logging, keeping the last 4 characters
    ///
    /// # Examples
    ///
    /// ```
    /// use bestgame_client::security::Sanitizer;
    ///
    /// assert_eq!(Sanitizer::sanitize_token("eyJhbGciOiJIUzI1NiJ9.e30.abcd"), "***abcd");
    /// assert_eq!(Sanitizer::sanitize_token("abc"), "****");
    /// ```
    pub fn sanitize_token(token: &str) -> String {
        let chars: Vec<char> = token.chars().collect();
        if chars.len() > 4 {
            let tail: String = chars[chars.len() - 4..].iter().collect();
            format!("***{}", tail)
        } else {
            "****".to_string()
        }
    }

    /// Strips query string and fragment from a URL
    ///
    /// Query parameters may carry filters with user data, so request URLs
    /// are logged without them.
    ///
    /// ```
    /// use bestgame_client::security::Sanitizer;
    ///
    /// assert_eq!(
    ///     Sanitizer::sanitize_url("https://api.example.com/order/my-orders?page=2"),
    ///     "https://api.example.com/order/my-orders"
    /// );
    /// ```
    pub fn sanitize_url(url: &str) -> String {
        let end = url.find(['?', '#']).unwrap_or(url.len());
        url[..end].to_string()
    }

    /// Checks login/register input before it is sent
    pub fn validate_credentials(email: &str, password: &str) -> Result<(), CredentialError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(CredentialError::EmptyEmail);
        }

        let valid_email = match email.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty()
                    && !domain.contains('@')
                    && domain.contains('.')
                    && !domain.starts_with('.')
                    && !domain.ends_with('.')
                    && !email.chars().any(char::is_whitespace)
            }
            None => false,
        };
        if !valid_email {
            return Err(CredentialError::InvalidEmail);
        }

        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(CredentialError::PasswordTooShort(MIN_PASSWORD_LEN));
        }

        Ok(())
    }
}
