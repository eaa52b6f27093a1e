//! OAuth 2.0 authorization and token lifecycle for the Pinterest API.
//!
//! Implements the authorization code flow:
//! 1. `pinterest-auth login` starts a one-shot listener on the local
//!    callback port, then opens the user's browser at the Pinterest
//!    consent page
//! 2. Pinterest redirects to `http://localhost:8085/callback` with an
//!    authorization code and the CSRF state parameter
//! 3. The code is exchanged for tokens and the record is persisted
//! 4. Thereafter [`TokenManager::get_valid_access_token`] serves the
//!    cached token, refreshing it ahead of expiry without caller
//!    involvement
//!
//! A pre-issued token in `PINTEREST_ACCESS_TOKEN` bypasses all of this.

mod exchange;
mod handshake;
mod manager;

pub use handshake::run_authorization_flow;
pub use manager::{AuthStatus, TokenManager};

use crate::config::AuthConfig;
use chrono::{SecondsFormat, TimeZone, Utc};

/// Authentication and token lifecycle errors
#[derive(Debug, Clone, PartialEq)]
pub enum AuthError {
    /// Required configuration values are missing
    Configuration(String),
    /// The default browser could not be launched
    Browser(String),
    /// Callback state parameter did not match the session state
    CsrfMismatch,
    /// Malformed callback (missing code) or listener failure
    Callback(String),
    /// No callback arrived within the handshake window
    Timeout,
    /// Token endpoint rejected the authorization code
    TokenExchange { status: u16, body: String },
    /// Token endpoint rejected the refresh request
    TokenRefresh { status: u16, body: String },
    /// No stored credential record
    NotAuthenticated,
    /// Refresh token expired or absent when a refresh was needed
    ExpiredCredential(String),
    /// Credential record could not be persisted
    Storage(String),
    /// HTTP transport failure (request or response handling)
    Transport(String),
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            AuthError::Browser(msg) => write!(f, "Failed to launch browser: {}", msg),
            AuthError::CsrfMismatch => write!(
                f,
                "State parameter mismatch on OAuth callback (possible CSRF attack)"
            ),
            AuthError::Callback(msg) => write!(f, "OAuth callback error: {}", msg),
            AuthError::Timeout => write!(f, "Timed out waiting for the OAuth callback"),
            AuthError::TokenExchange { status, body } => {
                write!(f, "Token exchange failed with status {}: {}", status, body)
            }
            AuthError::TokenRefresh { status, body } => {
                write!(f, "Token refresh failed with status {}: {}", status, body)
            }
            AuthError::NotAuthenticated => write!(
                f,
                "Not authenticated: run 'pinterest-auth login' to authorize this app"
            ),
            AuthError::ExpiredCredential(msg) => write!(f, "Credential expired: {}", msg),
            AuthError::Storage(msg) => write!(f, "Failed to store credentials: {}", msg),
            AuthError::Transport(msg) => write!(f, "Transport error: {}", msg),
        }
    }
}

impl std::error::Error for AuthError {}

/// App credentials from configuration, required for OAuth mode
pub(crate) fn app_credentials(config: &AuthConfig) -> Result<(&str, &str), AuthError> {
    match (config.app_id.as_deref(), config.app_secret.as_deref()) {
        (Some(id), Some(secret)) => Ok((id, secret)),
        _ => Err(AuthError::Configuration(
            "PINTEREST_APP_ID and PINTEREST_APP_SECRET must both be set for OAuth".to_string(),
        )),
    }
}

/// Millisecond epoch timestamp as a human-readable RFC 3339 string
pub(crate) fn format_timestamp(millis: i64) -> Option<String> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
}
