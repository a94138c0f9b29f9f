//! REST client module for the Google Drive and Sheets APIs.
//!
//! This module provides the `GoogleClient` for listing Drive folders,
//! downloading Drive files and reading Sheets value ranges.
//!
//! Requests carry an OAuth2 bearer token minted from a service account
//! key (see [`crate::auth`]).

pub mod client;
pub mod error;

pub use client::GoogleClient;
pub use error::ApiError;
