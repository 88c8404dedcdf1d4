//! API module - Authenticated access to the storefront backend
//!
//! - [`ApiClient`]: the request wrapper with cookie/bearer credentials and
//!   refresh-on-401
//! - [`AuthApi`]: typed auth endpoints built on it
//!
//! Resource endpoints (accounts, categories, orders, deposits) are plain
//! pass-throughs and are reached with [`ApiClient::request`] directly.

mod auth;
mod client;

pub use auth::{ApiResponse, AuthApi, LoginPayload, Profile, RegisterPayload, Role};
pub use client::{ApiClient, ApiError, ParsedBody, RequestOptions};
