//! snippetbox server binary.
//!
//! Configuration comes from `SNIPPETBOX_*` environment variables (see
//! [`Config`]); log verbosity from `RUST_LOG`, falling back to the configured
//! filter.

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use snippetbox::Server;
use snippetbox::app::{App, routes};
use snippetbox::config::Config;
use snippetbox::models::{MemorySnippets, MemoryUsers};
use snippetbox::session::{MemoryStore, SessionManager, SessionStore};
use snippetbox::templates::Templates;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_filter.as_str().into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let templates = Templates::build(config.templates_dir())
        .with_context(|| format!("Failed to build templates from {}", config.templates_dir().display()))?;
    info!(pages = templates.names().count(), "templates compiled");

    let store = Arc::new(MemoryStore::new());
    let sessions = SessionManager::new(store.clone(), config.session_lifetime())
        .secure(config.secure_cookies);
    tokio::spawn(sweep_sessions(store, config.session_sweep()));

    let app = Arc::new(App {
        templates,
        snippets: Arc::new(MemorySnippets::new()),
        users: Arc::new(MemoryUsers::new()),
        sessions,
        static_dir: config.static_dir(),
    });

    Server::bind(&config.addr)?
        .request_timeout(config.request_timeout())
        .max_body_bytes(config.max_body_bytes)
        .shutdown_grace(config.shutdown_grace())
        .serve(routes(app))
        .await?;
    Ok(())
}

/// Periodically drop expired sessions so the store does not grow without
/// bound.
async fn sweep_sessions(store: Arc<MemoryStore>, every: std::time::Duration) {
    let mut ticker = tokio::time::interval(every.max(std::time::Duration::from_secs(1)));
    loop {
        ticker.tick().await;
        match store.delete_expired().await {
            Ok(0) => {}
            Ok(removed) => info!(removed, "expired sessions swept"),
            Err(e) => error!("session sweep failed: {e}"),
        }
    }
}
