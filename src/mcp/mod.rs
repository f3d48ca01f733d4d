//! MCP server integration module.
//!
//! This module provides the integration between the MCP protocol and
//! the tool handlers: the dispatch table and the rmcp service.

pub mod dispatch;
pub mod service;

pub use dispatch::{Dispatcher, ToolKind};
pub use service::SqliteService;
