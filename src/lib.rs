//! SQLite MCP Server Library
//!
//! This library provides MCP (Model Context Protocol) tools for AI assistants
//! to query and manage local SQLite databases.

pub mod config;
pub mod db;
pub mod error;
pub mod lineage;
pub mod mcp;
pub mod models;
pub mod tools;
pub mod transport;

pub use config::Config;
pub use error::DbError;
pub use mcp::SqliteService;
