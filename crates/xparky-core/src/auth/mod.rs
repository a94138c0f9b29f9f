//! Authentication against Google APIs.
//!
//! This module provides:
//! - `ServiceAccountKey`: the service account JSON key, loaded from the
//!   `GOOGLE_SHEETS_CREDENTIALS` value (inline JSON or a file path)
//! - `TokenProvider`: mints OAuth2 access tokens with a signed JWT bearer
//!   grant and reuses them until shortly before expiry
//!
//! Google access tokens are valid for one hour.

pub mod credentials;
pub mod token;

pub use credentials::ServiceAccountKey;
pub use token::{AccessToken, TokenProvider, READONLY_SCOPES};
