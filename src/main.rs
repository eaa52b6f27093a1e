use anyhow::Result;
use pinterest_auth::auth::TokenManager;
use pinterest_auth::config::AuthConfig;
use pinterest_auth::credentials::FileTokenStore;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pinterest_auth=info".into()),
        )
        // Keep stdout clean for the token/status output
        .with_writer(std::io::stderr)
        .init();

    let command = std::env::args().nth(1).unwrap_or_else(|| "status".to_string());

    let config = AuthConfig::from_env();
    let store = Arc::new(FileTokenStore::new(config.token_path.clone()));
    let manager = TokenManager::new(config, store);

    match command.as_str() {
        "login" => {
            let message = manager.authenticate().await?;
            println!("{}", message);
        }
        "token" => {
            let token = manager.get_valid_access_token().await?;
            println!("{}", token);
        }
        "status" => {
            let status = manager.status();
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        other => {
            eprintln!(
                "Unknown command '{}'. Usage: pinterest-auth [login|token|status]",
                other
            );
            std::process::exit(2);
        }
    }

    Ok(())
}
