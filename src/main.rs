//! SQLite MCP Server - Main entry point.
//!
//! Serves MCP over stdio, exposing a local SQLite database as tools for AI
//! assistants.

use sqlite_mcp_server::config::Config;
use sqlite_mcp_server::db::ConnectionManager;
use sqlite_mcp_server::transport::{StdioTransport, Transport};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber. Logs always go to stderr so stdout
/// carries only protocol frames.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(false)
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse_args();

    init_tracing(&config);

    info!(
        database = %config.database.display(),
        read_only = config.read_only,
        "Starting SQLite MCP Server v{}",
        env!("CARGO_PKG_VERSION")
    );

    let connection_manager = Arc::new(ConnectionManager::new(
        config.database.clone(),
        config.open_options(),
    ));

    // Open the default database up front so a bad path fails at startup
    let pool = connection_manager.pool(None).await?;
    let version = ConnectionManager::sqlite_version(&pool).await?;
    info!(sqlite_version = %version, "Default database ready");

    let transport = StdioTransport::new(connection_manager);
    if let Err(e) = transport.run().await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}
