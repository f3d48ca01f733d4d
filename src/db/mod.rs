//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - Connection management (one single-connection pool per database file)
//! - Statement execution
//! - Schema introspection
//! - Type mappings
//! - Safe statement building for the structured tools

pub mod executor;
pub mod params;
pub mod pool;
pub mod schema;
pub mod statement;
pub mod types;

pub use executor::{BoundStatement, QueryExecutor};
pub use pool::ConnectionManager;
pub use schema::SchemaInspector;
pub use statement::{ValueMap, quote_ident};
