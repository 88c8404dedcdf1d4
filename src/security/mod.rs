//! Security module - Token memory handling and log sanitization
//!
//! - `SecureString` holds access/refresh tokens and zeroes them on drop
//! - `Sanitizer` renders tokens, URLs and emails safely for logs and
//!   validates login input before it leaves the process

mod sanitizer;
mod secure_string;

pub use sanitizer::{CredentialError, Sanitizer, MIN_PASSWORD_LEN};
pub use secure_string::SecureString;
