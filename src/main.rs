//! linkstashd - Linkstash server daemon
//!
//! Personal bookmark groups, kept in sync live across every open session of
//! an account over WebSocket.

mod config;
mod db;
mod engine;
mod error;
mod http;
mod network;
mod protocol;
mod router;
mod security;
mod state;

use crate::config::Config;
use crate::db::Database;
use crate::engine::MutationEngine;
use crate::http::ApiState;
use crate::network::Gateway;
use crate::router::Router;
use crate::security::{AuthGate, TokenSigner};
use crate::state::{Notifier, SessionRegistry};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    if let Err(errors) = config::validation::validate(&config) {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        anyhow::bail!("{} configuration error(s) in {config_path}", errors.len());
    }

    info!(server = %config.server.name, "Starting linkstashd");

    // Refuse the sample secret: anyone holding it can mint tokens for any account.
    if config.auth.is_placeholder_secret() {
        if std::env::var("LINKSTASH_ALLOW_INSECURE_SECRET").is_ok() {
            warn!("INSECURE: running with the sample token_secret (allowed via LINKSTASH_ALLOW_INSECURE_SECRET)");
        } else {
            error!("FATAL: token_secret is still the sample value from the example config.");
            error!("  Set a long random secret in config.toml:");
            error!("    [auth]");
            error!("    token_secret = \"<random-32-char-string>\"");
            error!("  Generate one with: openssl rand -hex 32");
            error!("  For testing only, set LINKSTASH_ALLOW_INSECURE_SECRET=1 to bypass this check.");
            anyhow::bail!("Refusing to start with the sample token_secret");
        }
    }

    // Initialize database
    let db = Database::new(&config.database.path).await?;

    // Shared state
    let registry = Arc::new(SessionRegistry::new());
    let notifier = Notifier::new(Arc::clone(&registry));
    let gate = AuthGate::new(TokenSigner::new(
        config.auth.token_secret.as_bytes(),
        config.auth.token_ttl_secs,
    ));
    let engine = MutationEngine::new(db, notifier, config.groups.reuse_window());
    let router = Arc::new(Router::new(
        gate.clone(),
        engine.clone(),
        Arc::clone(&registry),
    ));

    // HTTP API
    if let Some(http_config) = &config.http {
        let listener = tokio::net::TcpListener::bind(http_config.address).await?;
        tokio::spawn(http::run_http_server(listener, ApiState::new(gate, engine)));
    } else {
        info!("No [http] section; HTTP API disabled");
    }

    // WebSocket gateway
    let gateway = Gateway::bind(&config.listen, router, registry).await?;
    gateway.run().await?;

    Ok(())
}
