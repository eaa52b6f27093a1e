//! Token lifecycle management.
//!
//! The façade every API caller goes through: decides from the stored
//! record and the current time whether the cached access token is usable,
//! needs refreshing, or requires a fresh browser authorization. Refreshes
//! are a single attempt; re-authorization is never triggered
//! automatically.

use super::{app_credentials, exchange, format_timestamp, handshake, AuthError};
use crate::config::{AuthConfig, STATIC_TOKEN_SCOPES};
use crate::credentials::{TokenRecord, TokenStore};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Refresh this long before the access token actually expires
const EXPIRY_BUFFER_MS: i64 = 60_000;

/// Assumed validity window for a directly supplied static token
const STATIC_TOKEN_TTL_MS: i64 = 24 * 60 * 60 * 1000;

/// Point-in-time summary of the stored credentials. Never raises and
/// never mutates the record.
#[derive(Debug, Serialize)]
pub struct AuthStatus {
    pub authenticated: bool,
    pub access_token_valid: bool,
    pub refresh_token_valid: bool,
    pub access_token_expires_at: Option<String>,
    pub refresh_token_expires_at: Option<String>,
    pub scope: String,
}

impl AuthStatus {
    fn unauthenticated() -> Self {
        Self {
            authenticated: false,
            access_token_valid: false,
            refresh_token_valid: false,
            access_token_expires_at: None,
            refresh_token_expires_at: None,
            scope: String::new(),
        }
    }
}

/// Keeps an access token valid across the lifetime of the process.
pub struct TokenManager {
    config: AuthConfig,
    store: Arc<dyn TokenStore>,
}

impl TokenManager {
    pub fn new(config: AuthConfig, store: Arc<dyn TokenStore>) -> Self {
        Self { config, store }
    }

    /// Run the browser authorization handshake and persist the result.
    ///
    /// Only invoked on explicit user request, never from the
    /// token-serving path.
    pub async fn authenticate(&self) -> Result<String, AuthError> {
        handshake::run_authorization_flow(&self.config, self.store.as_ref()).await
    }

    /// Return a currently valid access token, refreshing it first if it
    /// is within the expiry buffer.
    ///
    /// Evaluated fresh on every call; the only cache is the store itself.
    pub async fn get_valid_access_token(&self) -> Result<String, AuthError> {
        // A static token is assumed valid forever and never refreshed
        if let Some(token) = &self.config.static_access_token {
            return Ok(token.clone());
        }

        let record = self.store.load().ok_or(AuthError::NotAuthenticated)?;
        let now = Utc::now().timestamp_millis();

        if record.access_expiry > now + EXPIRY_BUFFER_MS {
            debug!("Cached access token still valid");
            return Ok(record.access_token);
        }

        if !record.is_refreshable() {
            return Err(AuthError::ExpiredCredential(
                "Access token expired and no refresh token is available".to_string(),
            ));
        }

        // refresh_expiry of 0 means unknown; only a known past expiry is
        // terminal
        if record.refresh_expiry != 0 && record.refresh_expiry <= now {
            return Err(AuthError::ExpiredCredential(
                "Refresh token expired; re-authentication required".to_string(),
            ));
        }

        self.refresh(record).await
    }

    /// Single-attempt refresh; persists and returns the new token.
    async fn refresh(&self, record: TokenRecord) -> Result<String, AuthError> {
        let (app_id, app_secret) = app_credentials(&self.config)?;

        let response = exchange::refresh_access_token(
            &self.config.token_url,
            &record.refresh_token,
            app_id,
            app_secret,
        )
        .await?;

        let now = Utc::now().timestamp_millis();

        // Pinterest does not always rotate refresh tokens or restate
        // their expiry, so missing fields carry forward from the old
        // record
        let updated = TokenRecord {
            access_token: response.access_token,
            refresh_token: response.refresh_token.unwrap_or(record.refresh_token),
            access_expiry: now + response.expires_in.unwrap_or(0) * 1000,
            refresh_expiry: match (
                response.refresh_token_expires_at,
                response.refresh_token_expires_in,
            ) {
                (Some(at_secs), _) => at_secs * 1000,
                (None, Some(in_secs)) => now + in_secs * 1000,
                (None, None) => record.refresh_expiry,
            },
            scope: response.scope.unwrap_or(record.scope),
        };

        self.store
            .save(&updated)
            .map_err(|e| AuthError::Storage(e.to_string()))?;

        info!(
            access_expiry = %format_timestamp(updated.access_expiry).unwrap_or_default(),
            "Access token refreshed"
        );
        Ok(updated.access_token)
    }

    /// Report credential status without side effects.
    pub fn status(&self) -> AuthStatus {
        let record = match self.current_record() {
            Some(record) => record,
            None => return AuthStatus::unauthenticated(),
        };

        let now = Utc::now().timestamp_millis();
        AuthStatus {
            authenticated: true,
            access_token_valid: record.access_expiry > now,
            refresh_token_valid: record.is_refreshable()
                && (record.refresh_expiry == 0 || record.refresh_expiry > now),
            access_token_expires_at: format_timestamp(record.access_expiry),
            refresh_token_expires_at: if record.refresh_expiry == 0 {
                None
            } else {
                format_timestamp(record.refresh_expiry)
            },
            scope: record.scope,
        }
    }

    /// The record in effect: a configured static token synthesizes an
    /// in-memory record (never persisted) and takes precedence over
    /// anything on disk.
    fn current_record(&self) -> Option<TokenRecord> {
        if let Some(token) = &self.config.static_access_token {
            return Some(TokenRecord {
                access_token: token.clone(),
                refresh_token: String::new(),
                access_expiry: Utc::now().timestamp_millis() + STATIC_TOKEN_TTL_MS,
                refresh_expiry: 0,
                scope: STATIC_TOKEN_SCOPES.to_string(),
            });
        }
        self.store.load()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::MemoryTokenStore;

    // Refresh attempts against this address fail immediately, so a test
    // that succeeds anyway proves no network call was made
    const UNREACHABLE_TOKEN_URL: &str = "http://127.0.0.1:1/oauth/token";

    fn test_config() -> AuthConfig {
        AuthConfig {
            app_id: Some("app123".to_string()),
            app_secret: Some("secret456".to_string()),
            token_url: UNREACHABLE_TOKEN_URL.to_string(),
            ..AuthConfig::default()
        }
    }

    fn manager_with_record(config: AuthConfig, record: TokenRecord) -> TokenManager {
        TokenManager::new(config, Arc::new(MemoryTokenStore::with_record(record)))
    }

    fn now_ms() -> i64 {
        Utc::now().timestamp_millis()
    }

    #[tokio::test]
    async fn test_unexpired_token_served_without_network_call() {
        let manager = manager_with_record(
            test_config(),
            TokenRecord {
                access_token: "cached".to_string(),
                refresh_token: "refresh".to_string(),
                access_expiry: now_ms() + 3_600_000,
                refresh_expiry: now_ms() + 86_400_000,
                scope: "boards:read".to_string(),
            },
        );

        let token = manager.get_valid_access_token().await.unwrap();
        assert_eq!(token, "cached");
    }

    #[tokio::test]
    async fn test_no_record_is_not_authenticated() {
        let manager = TokenManager::new(test_config(), Arc::new(MemoryTokenStore::new()));

        let result = manager.get_valid_access_token().await;
        assert_eq!(result, Err(AuthError::NotAuthenticated));
    }

    #[tokio::test]
    async fn test_token_inside_buffer_triggers_refresh() {
        // Expires in 30s, inside the 60s buffer, so a refresh is
        // attempted and fails against the unreachable endpoint
        let manager = manager_with_record(
            test_config(),
            TokenRecord {
                access_token: "stale".to_string(),
                refresh_token: "refresh".to_string(),
                access_expiry: now_ms() + 30_000,
                refresh_expiry: now_ms() + 86_400_000,
                scope: String::new(),
            },
        );

        let result = manager.get_valid_access_token().await;
        assert!(matches!(result, Err(AuthError::Transport(_))));
    }

    #[tokio::test]
    async fn test_expired_without_refresh_token_fails() {
        let manager = manager_with_record(
            test_config(),
            TokenRecord {
                access_token: "stale".to_string(),
                refresh_token: String::new(),
                access_expiry: now_ms() - 1_000,
                refresh_expiry: 0,
                scope: String::new(),
            },
        );

        let result = manager.get_valid_access_token().await;
        assert!(matches!(result, Err(AuthError::ExpiredCredential(_))));
    }

    #[tokio::test]
    async fn test_expired_refresh_token_fails_without_network_call() {
        let manager = manager_with_record(
            test_config(),
            TokenRecord {
                access_token: "stale".to_string(),
                refresh_token: "refresh".to_string(),
                access_expiry: now_ms() - 1_000,
                refresh_expiry: now_ms() - 1_000,
                scope: String::new(),
            },
        );

        // ExpiredCredential rather than Transport: the unreachable
        // endpoint was never contacted
        let result = manager.get_valid_access_token().await;
        assert!(matches!(result, Err(AuthError::ExpiredCredential(_))));
    }

    #[tokio::test]
    async fn test_zero_refresh_expiry_never_blocks_refresh() {
        let manager = manager_with_record(
            test_config(),
            TokenRecord {
                access_token: "stale".to_string(),
                refresh_token: "refresh".to_string(),
                access_expiry: now_ms() - 1_000,
                refresh_expiry: 0,
                scope: String::new(),
            },
        );

        // The sentinel means unknown, so the refresh is attempted
        let result = manager.get_valid_access_token().await;
        assert!(matches!(result, Err(AuthError::Transport(_))));
    }

    #[tokio::test]
    async fn test_static_token_overrides_stored_record() {
        let config = AuthConfig {
            static_access_token: Some("static-token".to_string()),
            ..test_config()
        };
        let manager = manager_with_record(
            config,
            TokenRecord {
                access_token: "stored".to_string(),
                refresh_token: "refresh".to_string(),
                access_expiry: now_ms() - 1_000,
                refresh_expiry: now_ms() - 1_000,
                scope: String::new(),
            },
        );

        // Exact configured string, regardless of the expired disk record
        let token = manager.get_valid_access_token().await.unwrap();
        assert_eq!(token, "static-token");
    }

    #[tokio::test]
    async fn test_static_token_status() {
        let config = AuthConfig {
            static_access_token: Some("static-token".to_string()),
            ..test_config()
        };
        let manager = TokenManager::new(config, Arc::new(MemoryTokenStore::new()));

        let status = manager.status();
        assert!(status.authenticated);
        assert!(status.access_token_valid);
        assert!(!status.refresh_token_valid);
        assert_eq!(status.scope, STATIC_TOKEN_SCOPES);
        assert!(status.refresh_token_expires_at.is_none());
    }

    #[tokio::test]
    async fn test_status_unauthenticated() {
        let manager = TokenManager::new(test_config(), Arc::new(MemoryTokenStore::new()));

        let status = manager.status();
        assert!(!status.authenticated);
        assert!(!status.access_token_valid);
        assert!(!status.refresh_token_valid);
        assert!(status.access_token_expires_at.is_none());
        assert_eq!(status.scope, "");
    }

    #[tokio::test]
    async fn test_status_does_not_mutate_record() {
        let record = TokenRecord {
            access_token: "cached".to_string(),
            refresh_token: "refresh".to_string(),
            access_expiry: now_ms() + 3_600_000,
            refresh_expiry: now_ms() + 86_400_000,
            scope: "boards:read".to_string(),
        };
        let store = Arc::new(MemoryTokenStore::with_record(record.clone()));
        let manager = TokenManager::new(test_config(), store.clone());

        for _ in 0..3 {
            let status = manager.status();
            assert!(status.authenticated);
            assert!(status.access_token_valid);
            assert!(status.refresh_token_valid);
        }

        assert_eq!(store.load().unwrap(), record);
    }
}
