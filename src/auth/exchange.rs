//! Token endpoint calls: code-for-token exchange and refresh.
//!
//! Both flows POST form-encoded bodies to the Pinterest token endpoint,
//! authenticated with HTTP Basic auth built from the app id and secret.

use super::AuthError;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

/// Token endpoint response (Pinterest v5 OAuth)
#[derive(Deserialize, Debug)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Relative refresh token lifetime in seconds
    #[serde(default)]
    pub refresh_token_expires_in: Option<i64>,
    /// Absolute refresh token expiry in seconds since epoch
    #[serde(default)]
    pub refresh_token_expires_at: Option<i64>,
}

/// Basic auth header value: base64 of `app_id:app_secret`
pub(crate) fn basic_auth_header(app_id: &str, app_secret: &str) -> String {
    format!(
        "Basic {}",
        BASE64.encode(format!("{}:{}", app_id, app_secret))
    )
}

/// Exchange an authorization code for tokens.
pub(crate) async fn exchange_code(
    token_url: &str,
    code: &str,
    redirect_uri: &str,
    app_id: &str,
    app_secret: &str,
) -> Result<TokenResponse, AuthError> {
    let mut form_data = HashMap::new();
    form_data.insert("grant_type", "authorization_code");
    form_data.insert("code", code);
    form_data.insert("redirect_uri", redirect_uri);

    debug!(token_url = %token_url, "Exchanging authorization code for tokens");

    let response = post_token_request(token_url, &form_data, app_id, app_secret).await?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(AuthError::TokenExchange {
            status: status.as_u16(),
            body,
        });
    }

    let token_response: TokenResponse = response
        .json()
        .await
        .map_err(|e| AuthError::Transport(format!("Failed to parse token response: {}", e)))?;

    debug!(
        has_refresh_token = token_response.refresh_token.is_some(),
        expires_in = ?token_response.expires_in,
        "Token exchange successful"
    );

    Ok(token_response)
}

/// Obtain a new access token from a stored refresh token.
pub(crate) async fn refresh_access_token(
    token_url: &str,
    refresh_token: &str,
    app_id: &str,
    app_secret: &str,
) -> Result<TokenResponse, AuthError> {
    let mut form_data = HashMap::new();
    form_data.insert("grant_type", "refresh_token");
    form_data.insert("refresh_token", refresh_token);

    debug!(token_url = %token_url, "Refreshing access token");

    let response = post_token_request(token_url, &form_data, app_id, app_secret).await?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(AuthError::TokenRefresh {
            status: status.as_u16(),
            body,
        });
    }

    response
        .json()
        .await
        .map_err(|e| AuthError::Transport(format!("Failed to parse refresh response: {}", e)))
}

async fn post_token_request(
    token_url: &str,
    form_data: &HashMap<&str, &str>,
    app_id: &str,
    app_secret: &str,
) -> Result<reqwest::Response, AuthError> {
    let client = reqwest::Client::new();
    client
        .post(token_url)
        .header("Authorization", basic_auth_header(app_id, app_secret))
        .header("Accept", "application/json")
        .form(form_data)
        .send()
        .await
        .map_err(|e| AuthError::Transport(format!("Token request failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_auth_header() {
        // base64("user:pass") == "dXNlcjpwYXNz"
        assert_eq!(basic_auth_header("user", "pass"), "Basic dXNlcjpwYXNz");
    }

    #[test]
    fn test_token_response_deserialization() {
        let json = r#"{
            "access_token": "pina_1234567890",
            "token_type": "bearer",
            "expires_in": 2592000,
            "scope": "boards:read,pins:read",
            "refresh_token": "pinr_0987654321",
            "refresh_token_expires_in": 31536000,
            "refresh_token_expires_at": 1767225600
        }"#;

        let response: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.access_token, "pina_1234567890");
        assert_eq!(response.token_type, Some("bearer".to_string()));
        assert_eq!(response.expires_in, Some(2592000));
        assert_eq!(response.refresh_token, Some("pinr_0987654321".to_string()));
        assert_eq!(response.refresh_token_expires_at, Some(1767225600));
    }

    #[test]
    fn test_token_response_minimal() {
        // Refresh responses may omit the refresh token entirely
        let json = r#"{"access_token": "pina_only"}"#;

        let response: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.access_token, "pina_only");
        assert_eq!(response.refresh_token, None);
        assert_eq!(response.expires_in, None);
        assert_eq!(response.refresh_token_expires_at, None);
    }
}
