//! Android Publisher API client for pstore.
//!
//! Implements [`pstore_publish::CatalogService`] over the
//! [Google Play Developer API](https://developers.google.com/android-publisher)
//! v3 edits resources.

pub mod auth;
pub mod client;
pub mod types;

#[cfg(test)]
pub(crate) mod test_server;

pub use auth::{AccessToken, ServiceAccountKey, TOKEN_ENV_VAR};
pub use client::PlayClient;
