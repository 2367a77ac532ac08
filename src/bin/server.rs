//! wp-mcp-server HTTP server binary.
//!
//! Starts an axum HTTP server exposing a WordPress site's capabilities as
//! MCP tools.
//!
//! # Environment Variables
//!
//! - `WP_MCP_CONFIG`: Path to a YAML configuration file (optional)
//! - `PORT`: HTTP port, overrides the configured bind address port
//! - `WP_MCP_SITE_NAME`, `WP_MCP_SITE_URL`: Reported by `/wp-mcp/v1/info`
//! - `WP_MCP_ENABLED_TOOLS`: Comma-separated tool names (empty = all)
//! - `WP_MCP_ALLOWED_POST_TYPES`: Comma-separated custom post types
//! - `RUST_LOG`: Tracing filter (default: "info,wp_mcp_server=debug")
//!
//! # Usage
//!
//! ```bash
//! WP_MCP_CONFIG=server.yaml cargo run --bin server
//! ```

use std::path::PathBuf;

use anyhow::Context;
use wp_mcp_server::config::ServerConfig;
use wp_mcp_server::dispatcher::Dispatcher;
use wp_mcp_server::platform;
use wp_mcp_server::server::{app_router, AppState, INFO_PATH, MCP_PATH};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,wp_mcp_server=debug".into()),
        )
        .init();

    let config_path = std::env::var("WP_MCP_CONFIG").ok().map(PathBuf::from);
    let config = ServerConfig::load(config_path.as_deref()).context("Failed to load configuration")?;

    let platform = platform::connect(&config.platform)
        .await
        .context("Failed to initialise platform")?;
    let dispatcher =
        Dispatcher::from_config(&config, &platform).context("Failed to build dispatcher")?;

    let bind_addr = config.bind_addr.clone();
    let app = app_router(AppState::new(dispatcher, config));

    tracing::info!("wp-mcp-server starting on {}", bind_addr);
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health: liveness probe");
    tracing::info!("  POST {}: tool protocol", MCP_PATH);
    tracing::info!("  GET  {}: server description", INFO_PATH);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {bind_addr}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server failed")?;

    tracing::info!("wp-mcp-server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
