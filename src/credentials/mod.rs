//! Persisted OAuth credential record and storage backends.
//!
//! A single JSON record per machine, written with owner-only file
//! permissions. The record is either fully absent (never authenticated) or
//! structurally complete: a record with an empty `access_token` is treated
//! as absent. Storage is behind the [`TokenStore`] trait so tests can use an
//! in-memory backend without touching the filesystem.

use serde::{Deserialize, Serialize};

mod storage;

pub use storage::{FileTokenStore, MemoryTokenStore, TokenStore};

/// Stored OAuth credentials for the Pinterest API.
///
/// Timestamps are absolute milliseconds since the Unix epoch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TokenRecord {
    /// Bearer token used for API requests
    pub access_token: String,

    /// Refresh token; empty string means the grant is not refreshable
    /// (e.g. a directly supplied static token)
    #[serde(default)]
    pub refresh_token: String,

    /// When the access token must no longer be used
    #[serde(default)]
    pub access_expiry: i64,

    /// When the refresh token expires; `0` means unknown/not applicable
    /// and never blocks a refresh attempt
    #[serde(default)]
    pub refresh_expiry: i64,

    /// Granted scopes as returned by the server (informational)
    #[serde(default)]
    pub scope: String,
}

impl TokenRecord {
    /// Whether this record carries a usable refresh token
    pub fn is_refreshable(&self) -> bool {
        !self.refresh_token.is_empty()
    }
}
