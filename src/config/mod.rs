//! Authentication configuration.
//!
//! Built once at process start from environment variables and passed by
//! reference into the token manager and authorization handshake, so tests
//! can substitute values without touching process-wide environment state.

use std::path::PathBuf;

/// Pinterest OAuth authorization endpoint
pub const AUTH_URL: &str = "https://www.pinterest.com/oauth/";

/// Pinterest OAuth token endpoint
pub const TOKEN_URL: &str = "https://api.pinterest.com/v5/oauth/token";

/// Local port for the one-shot authorization callback
pub const CALLBACK_PORT: u16 = 8085;

/// Scopes requested during the browser authorization flow
pub const OAUTH_SCOPES: &str = "boards:read,pins:read,boards:write,pins:write,user_accounts:read";

/// Scopes assumed for a directly supplied static token (read-only)
pub const STATIC_TOKEN_SCOPES: &str = "boards:read,pins:read,user_accounts:read";

/// Complete authentication configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Pre-issued access token; bypasses all OAuth machinery when set
    pub static_access_token: Option<String>,

    /// Pinterest app ID (required together with the secret for OAuth mode)
    pub app_id: Option<String>,

    /// Pinterest app secret
    pub app_secret: Option<String>,

    /// Authorization endpoint URL
    pub auth_url: String,

    /// Token endpoint URL (exchange and refresh)
    pub token_url: String,

    /// Local callback port
    pub callback_port: u16,

    /// Path of the persisted credential record
    pub token_path: PathBuf,
}

impl AuthConfig {
    /// Load configuration from environment variables.
    ///
    /// Recognized variables:
    /// - `PINTEREST_ACCESS_TOKEN` - static token mode
    /// - `PINTEREST_APP_ID` / `PINTEREST_APP_SECRET` - OAuth mode
    ///
    /// Missing app credentials are not an error here; they only become one
    /// when an operation actually needs them.
    pub fn from_env() -> Self {
        Self {
            static_access_token: non_empty_var("PINTEREST_ACCESS_TOKEN"),
            app_id: non_empty_var("PINTEREST_APP_ID"),
            app_secret: non_empty_var("PINTEREST_APP_SECRET"),
            ..Self::default()
        }
    }

    /// Redirect URI registered with the Pinterest app
    pub fn redirect_uri(&self) -> String {
        format!("http://localhost:{}/callback", self.callback_port)
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            static_access_token: None,
            app_id: None,
            app_secret: None,
            auth_url: AUTH_URL.to_string(),
            token_url: TOKEN_URL.to_string(),
            callback_port: CALLBACK_PORT,
            token_path: default_token_path(),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Default credential record location: `~/.pinterest-auth/token.json`
fn default_token_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".pinterest-auth")
        .join("token.json")
}
