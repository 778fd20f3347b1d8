//! Render Server
//!
//! Accepts three clip URLs, a voiceover URL and timed captions, then returns a
//! single MP4: the clips speed-adjusted and concatenated, the voiceover as the
//! audio track and the captions burned in. Composition is done by ffmpeg.

mod compose;
mod config;
mod config_file;
mod engine;
mod error;
mod fetch;
mod http;
mod limits;
mod render;
mod state;
mod subtitle;
mod workspace;

use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ServerConfig;
use crate::error::{RenderError, Result};
use crate::http::create_router;
use crate::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
const APP_NAME: &str = "render-server";

#[tokio::main]
async fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let first = args.next();

    // `render-server --init-config [path]` writes a default config and exits
    if first.as_deref() == Some("--init-config") {
        let path = args.next().unwrap_or_else(|| "config.toml".to_string());
        crate::config_file::generate_default_config(&path)?;
        println!("Wrote default configuration to {}", path);
        return Ok(());
    }

    // Load configuration
    let config_path = first.unwrap_or_else(|| "config.toml".to_string());
    let (mut config, load_error) = if std::path::Path::new(&config_path).exists() {
        match crate::config_file::ConfigFile::from_file(&config_path) {
            Ok(cf) => (cf.into_server_config(), None),
            Err(e) => (ServerConfig::default(), Some(e)),
        }
    } else {
        (ServerConfig::default(), None)
    };
    config.apply_port_override(std::env::var("PORT").ok());

    // Initialize logging
    init_logging(&config);

    tracing::info!("{} v{} starting", APP_NAME, VERSION);
    if let Some(e) = load_error {
        tracing::warn!(
            "Failed to load config file {}: {}. Using defaults.",
            config_path,
            e
        );
    }
    tracing::info!("Configuration loaded: {:?}", config);

    // Create application state
    let state = Arc::new(AppState::new(config.clone())?);

    // Background task: remove expired workspaces.
    if config.workspace.reap_interval_secs > 0 {
        let ws_config = config.workspace.clone();
        let active = state.renderer.active_workspaces();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(
                ws_config.reap_interval_secs,
            ));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let root = ws_config.root.clone();
                let ttl = ws_config.ttl();
                let active = active.clone();
                let outcome = tokio::task::spawn_blocking(move || {
                    crate::workspace::reap_expired(&root, ttl, &active)
                })
                .await;
                match outcome {
                    Ok(Ok(removed)) if removed > 0 => {
                        tracing::info!("Removed {} expired workspace(s)", removed)
                    }
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => tracing::warn!("Workspace cleanup failed: {}", e),
                    Err(e) => tracing::warn!("Workspace cleanup task failed: {}", e),
                }
            }
        });
    }

    // Build router
    let app = create_router(state.clone());

    // Start server
    let addr: SocketAddr = config
        .socket_addr()
        .parse()
        .map_err(|e| RenderError::Config(format!("invalid listen address: {}", e)))?;
    tracing::info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Initialize logging with tracing
fn init_logging(config: &ServerConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "render_server={level},tower_http={level}",
            level = config.log_level
        )
        .into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if config.log_format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
