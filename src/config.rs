//! Configuration handling for the SQLite MCP Server.
//!
//! This module provides configuration management via CLI arguments and environment variables.

use clap::Parser;
use std::path::PathBuf;

pub const DEFAULT_DATABASE_PATH: &str = "sqlite.db";
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Options used when opening a database file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenOptions {
    /// Open every database read-only and refuse mutating tools
    pub read_only: bool,
    /// Create missing database files (and their parent directories)
    pub create_if_missing: bool,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            read_only: false,
            create_if_missing: true,
        }
    }
}

/// Configuration for the SQLite MCP Server.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "sqlite-mcp-server",
    about = "MCP server exposing a local SQLite database as tools for AI assistants",
    version,
    author
)]
pub struct Config {
    /// Path to the SQLite database file used when a tool call omits `db_path`
    #[arg(
        short = 'd',
        long = "database",
        value_name = "PATH",
        default_value = DEFAULT_DATABASE_PATH,
        env = "SQLITE_MCP_DATABASE"
    )]
    pub database: PathBuf,

    /// Open databases read-only: mutating tools are refused and `query`
    /// only accepts row-returning statements
    #[arg(long, env = "SQLITE_MCP_READ_ONLY")]
    pub read_only: bool,

    /// Fail instead of creating database files that do not exist yet
    #[arg(long, env = "SQLITE_MCP_NO_CREATE")]
    pub no_create: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = DEFAULT_LOG_LEVEL, env = "SQLITE_MCP_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "SQLITE_MCP_JSON_LOGS")]
    pub json_logs: bool,
}

impl Config {
    /// Parse configuration from command line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Create a default configuration (useful for testing).
    pub fn default_config() -> Self {
        Self {
            database: PathBuf::from(DEFAULT_DATABASE_PATH),
            read_only: false,
            no_create: false,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            json_logs: false,
        }
    }

    /// Options for opening database files.
    pub fn open_options(&self) -> OpenOptions {
        OpenOptions {
            read_only: self.read_only,
            create_if_missing: !self.no_create && !self.read_only,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}
