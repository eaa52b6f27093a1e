//! Browser-mediated authorization handshake.
//!
//! Runs a one-shot callback listener on the local callback port, launches
//! the default browser at the Pinterest consent page, validates the
//! returned CSRF state, and exchanges the authorization code for tokens.
//!
//! The listener is torn down exactly once on every exit path (success,
//! protocol error, browser failure, timeout) so repeated attempts never
//! leak an open port. [`PendingCallback`] enforces this by consuming
//! itself in both `wait` and `abort`.

use super::exchange;
use super::{app_credentials, format_timestamp, AuthError};
use crate::config::{AuthConfig, OAUTH_SCOPES};
use crate::credentials::{TokenRecord, TokenStore};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// How long to wait for the authorization callback
const CALLBACK_TIMEOUT_SECS: u64 = 120;

const SUCCESS_PAGE: &str = "<html><body>\
    <h1>Authentication successful</h1>\
    <p>You can close this window and return to the terminal.</p>\
    </body></html>";

fn error_page(message: &str) -> String {
    format!(
        "<html><body><h1>Authentication failed</h1><p>{}</p></body></html>",
        message
    )
}

/// Run the one-time browser authorization handshake.
///
/// Binds the callback listener before launching the browser to close the
/// race between browser redirect and listener readiness, awaits exactly
/// one callback within the timeout window, exchanges the returned code for
/// tokens, and persists the resulting record.
///
/// A second concurrent invocation fails at the bind step, since two
/// listeners cannot share the callback port.
pub async fn run_authorization_flow(
    config: &AuthConfig,
    store: &dyn TokenStore,
) -> Result<String, AuthError> {
    let (app_id, app_secret) = app_credentials(config)?;

    let session_state = Uuid::new_v4().to_string();
    let auth_url = build_authorization_url(config, app_id, &session_state);

    let listener = TcpListener::bind(("127.0.0.1", config.callback_port))
        .await
        .map_err(|e| {
            AuthError::Callback(format!(
                "Failed to bind local callback port {}: {}",
                config.callback_port, e
            ))
        })?;
    info!(port = config.callback_port, "Callback listener ready");

    let pending = PendingCallback::spawn(listener, session_state);

    debug!(url = %auth_url, "Opening browser for Pinterest authorization");
    if let Err(e) = open::that(&auth_url) {
        pending.abort().await;
        return Err(AuthError::Browser(e.to_string()));
    }

    info!("Browser launched, waiting for authorization callback");
    let code = pending
        .wait(Duration::from_secs(CALLBACK_TIMEOUT_SECS))
        .await?;

    let token = exchange::exchange_code(
        &config.token_url,
        &code,
        &config.redirect_uri(),
        app_id,
        app_secret,
    )
    .await?;

    let now = Utc::now().timestamp_millis();
    let record = TokenRecord {
        access_token: token.access_token,
        refresh_token: token.refresh_token.unwrap_or_default(),
        access_expiry: now + token.expires_in.unwrap_or(0) * 1000,
        refresh_expiry: token
            .refresh_token_expires_at
            .map(|secs| secs * 1000)
            .unwrap_or(0),
        scope: token.scope.unwrap_or_else(|| OAUTH_SCOPES.to_string()),
    };
    store
        .save(&record)
        .map_err(|e| AuthError::Storage(e.to_string()))?;

    let valid_until = format_timestamp(record.access_expiry)
        .unwrap_or_else(|| record.access_expiry.to_string());
    Ok(format!(
        "Authentication successful. Access token valid until {}.",
        valid_until
    ))
}

/// Build the Pinterest authorization URL.
///
/// `continuous_refresh=true` requests a refreshable grant.
fn build_authorization_url(config: &AuthConfig, app_id: &str, state: &str) -> String {
    format!(
        "{}?client_id={}&redirect_uri={}&response_type=code&continuous_refresh=true&scope={}&state={}",
        config.auth_url,
        urlencoding::encode(app_id),
        urlencoding::encode(&config.redirect_uri()),
        urlencoding::encode(OAUTH_SCOPES),
        urlencoding::encode(state)
    )
}

/// Ephemeral handshake session shared with the callback handler.
struct CallbackSession {
    /// Unguessable correlation token; a mismatched callback is rejected
    expected_state: String,
    /// Single-slot result channel: only the first callback resolves it
    result_tx: Mutex<Option<oneshot::Sender<Result<String, AuthError>>>>,
}

#[derive(Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
}

fn callback_router(session: Arc<CallbackSession>) -> Router {
    // Paths other than /callback fall through to the default 404 and
    // leave the session unresolved
    Router::new()
        .route("/callback", get(handle_callback))
        .with_state(session)
}

async fn handle_callback(
    State(session): State<Arc<CallbackSession>>,
    Query(params): Query<CallbackParams>,
) -> (StatusCode, Html<String>) {
    let outcome = if params.state.as_deref() != Some(session.expected_state.as_str()) {
        warn!("Callback state does not match session state");
        Err(AuthError::CsrfMismatch)
    } else {
        match params.code {
            Some(code) if !code.is_empty() => Ok(code),
            _ => Err(AuthError::Callback(
                "Authorization code missing from callback".to_string(),
            )),
        }
    };

    let response = match &outcome {
        Ok(_) => (StatusCode::OK, Html(SUCCESS_PAGE.to_string())),
        Err(AuthError::CsrfMismatch) => (
            StatusCode::BAD_REQUEST,
            Html(error_page(
                "State mismatch. Possible CSRF attack; authorization rejected.",
            )),
        ),
        Err(e) => (StatusCode::BAD_REQUEST, Html(error_page(&e.to_string()))),
    };

    if let Some(tx) = session.result_tx.lock().unwrap().take() {
        let _ = tx.send(outcome);
    }

    response
}

/// A running callback listener awaiting its one result.
///
/// Consuming `wait` or `abort` shuts the listener down; there is no path
/// that leaves it running.
struct PendingCallback {
    result_rx: oneshot::Receiver<Result<String, AuthError>>,
    shutdown_tx: oneshot::Sender<()>,
    server_task: JoinHandle<()>,
}

impl PendingCallback {
    fn spawn(listener: TcpListener, expected_state: String) -> Self {
        let (result_tx, result_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let session = Arc::new(CallbackSession {
            expected_state,
            result_tx: Mutex::new(Some(result_tx)),
        });

        let app = callback_router(session);
        let server_task = tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            });
            if let Err(e) = server.await {
                error!(error = %e, "Callback listener failed");
            }
        });

        Self {
            result_rx,
            shutdown_tx,
            server_task,
        }
    }

    /// Await the callback result, racing it against the timeout window.
    async fn wait(self, window: Duration) -> Result<String, AuthError> {
        let Self {
            result_rx,
            shutdown_tx,
            server_task,
        } = self;

        let outcome = match tokio::time::timeout(window, result_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(AuthError::Callback("Callback channel closed".to_string())),
            Err(_) => Err(AuthError::Timeout),
        };

        shutdown_listener(shutdown_tx, server_task).await;
        outcome
    }

    /// Tear down the listener without waiting for a callback.
    async fn abort(self) {
        shutdown_listener(self.shutdown_tx, self.server_task).await;
    }
}

async fn shutdown_listener(shutdown_tx: oneshot::Sender<()>, server_task: JoinHandle<()>) {
    let _ = shutdown_tx.send(());
    let _ = server_task.await;
}
