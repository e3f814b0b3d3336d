use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::mcp::{McpServer, ToolRegistry};

/// Build an MCP server from the loaded configuration
#[inline]
pub fn build_server(config: &Config) -> Result<McpServer> {
    let registry = ToolRegistry::default();

    let server = McpServer::new(
        config.server.name.clone(),
        env!("CARGO_PKG_VERSION").to_string(),
        registry,
    )
    .context("Failed to create MCP server")?
    .with_instructions(config.server.instructions.clone());

    Ok(server)
}

/// Start the MCP server on stdio
#[inline]
pub async fn serve(config: Config) -> Result<()> {
    let server = Arc::new(build_server(&config)?);

    // Liveness line goes to stderr; stdout carries the protocol.
    eprintln!(
        "[{}] starting; waiting for MCP handshake on stdio",
        config.server.name
    );
    info!(
        "MCP server '{}' initialized with {} tool(s)",
        config.server.name,
        server.registry().len()
    );

    server.serve_stdio().await
}

/// Print the effective configuration
#[inline]
pub fn show_config() -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    let path = Config::config_file_path().context("Failed to determine config file path")?;

    if path.exists() {
        println!("Configuration file: {}", path.display());
    } else {
        println!(
            "Configuration file not found at {}; using defaults",
            path.display()
        );
    }
    println!();
    print!(
        "{}",
        toml::to_string_pretty(&config).context("Failed to serialize config to TOML")?
    );

    Ok(())
}
