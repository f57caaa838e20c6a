//! freshtag server entry point.
//!
//! Boots the MCP server on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use anyhow::Result;
use freshtag_core::AppConfig;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

mod handler;
mod state;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    let state = state::AppState::connect(config).await?;

    tracing::info!("Starting freshtag server on stdio transport");

    let handler = handler::FreshtagServer::new(state.clone());
    let server = serve_server(handler, stdio()).await?;

    let result = server.waiting().await;
    state.disconnect().await;
    result?;

    Ok(())
}
