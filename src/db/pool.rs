//! Connection pool management.
//!
//! Every database file gets its own `SqlitePool` capped at a single
//! connection, so statements against one file are applied one at a time in
//! acquisition order. Pools are opened lazily and cached by path for the
//! lifetime of the process.

use crate::config::OpenOptions;
use crate::error::{DbError, DbResult};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct ConnectionManager {
    default_path: PathBuf,
    options: OpenOptions,
    pools: Arc<RwLock<HashMap<PathBuf, SqlitePool>>>,
}

impl ConnectionManager {
    /// Create a new connection manager. Nothing is opened until first use.
    pub fn new(default_path: impl Into<PathBuf>, options: OpenOptions) -> Self {
        Self {
            default_path: default_path.into(),
            options,
            pools: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Path used when a tool call does not name a database.
    pub fn default_path(&self) -> &Path {
        &self.default_path
    }

    /// Whether databases are opened read-only.
    pub fn is_read_only(&self) -> bool {
        self.options.read_only
    }

    /// Resolve an optional `db_path` argument to a concrete file path.
    pub fn resolve(&self, db_path: Option<&str>) -> DbResult<PathBuf> {
        match db_path {
            None => Ok(self.default_path.clone()),
            Some(p) if p.trim().is_empty() => Err(DbError::invalid_input(
                "db_path cannot be empty. Omit it to use the default database.",
            )),
            Some(p) => Ok(PathBuf::from(p)),
        }
    }

    /// Get the pool for a database, opening it on first use.
    pub async fn pool(&self, db_path: Option<&str>) -> DbResult<SqlitePool> {
        let path = self.resolve(db_path)?;
        self.pool_for_path(&path).await
    }

    /// Get the pool for a resolved path, opening it on first use.
    pub async fn pool_for_path(&self, path: &Path) -> DbResult<SqlitePool> {
        // Early check for an open pool
        {
            let pools = self.pools.read().await;
            if let Some(pool) = pools.get(path) {
                return Ok(pool.clone());
            }
        }

        let pool = self.open_pool(path).await?;

        // Re-check after async work: a concurrent caller may have opened the
        // same file. Keep theirs and close ours outside the lock.
        let (pool, duplicate) = {
            let mut pools = self.pools.write().await;
            match pools.get(path) {
                Some(existing) => (existing.clone(), Some(pool)),
                None => {
                    pools.insert(path.to_path_buf(), pool.clone());
                    (pool, None)
                }
            }
        };

        if let Some(duplicate) = duplicate {
            debug!(path = %path.display(), "Discarding concurrently opened pool");
            duplicate.close().await;
        }

        Ok(pool)
    }

    /// Query the SQLite library version through an open pool.
    pub async fn sqlite_version(pool: &SqlitePool) -> DbResult<String> {
        let version = sqlx::query_scalar::<_, String>("SELECT sqlite_version()")
            .fetch_one(pool)
            .await?;
        Ok(version)
    }

    /// Get the number of open databases.
    pub async fn connection_count(&self) -> usize {
        let pools = self.pools.read().await;
        pools.len()
    }

    /// Close all connections and clear the cache.
    pub async fn close_all(&self) {
        let mut pools = self.pools.write().await;
        for (path, pool) in pools.drain() {
            info!(path = %path.display(), "Closing database");
            pool.close().await;
        }
        info!("All connections closed");
    }

    async fn open_pool(&self, path: &Path) -> DbResult<SqlitePool> {
        let create = self.options.create_if_missing && !self.options.read_only;

        if create {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    DbError::io(parent.display().to_string(), e.to_string())
                })?;
            }
        }

        info!(
            path = %path.display(),
            read_only = self.options.read_only,
            create_if_missing = create,
            "Opening database"
        );

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(create)
            .read_only(self.options.read_only);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| {
                DbError::connection(
                    format!("Failed to open '{}': {}", path.display(), e),
                    connection_suggestion(&e, create),
                )
            })?;

        match Self::sqlite_version(&pool).await {
            Ok(version) => debug!(version = %version, "Got SQLite version"),
            Err(e) => warn!(error = %e, "Failed to get SQLite version"),
        }

        Ok(pool)
    }
}

/// Generate a helpful suggestion for errors raised while opening a file.
fn connection_suggestion(error: &sqlx::Error, create: bool) -> String {
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("unable to open") && !create {
        return "The database file does not exist and creation is disabled".to_string();
    }
    if error_str.contains("locked") || error_str.contains("busy") {
        return "Another process holds a lock on the database file".to_string();
    }
    if error_str.contains("not a database") {
        return "The file exists but is not a SQLite database".to_string();
    }

    "Verify the file path exists and is accessible".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> ConnectionManager {
        ConnectionManager::new("default.db", OpenOptions::default())
    }

    #[tokio::test]
    async fn test_connection_manager_creation() {
        let manager = manager();
        assert_eq!(manager.connection_count().await, 0);
        assert!(!manager.is_read_only());
    }

    #[test]
    fn test_resolve_default_and_override() {
        let manager = manager();
        assert_eq!(manager.resolve(None).unwrap(), PathBuf::from("default.db"));
        assert_eq!(
            manager.resolve(Some("other/x.db")).unwrap(),
            PathBuf::from("other/x.db")
        );
    }

    #[test]
    fn test_resolve_rejects_empty_path() {
        let result = manager().resolve(Some("  "));
        assert!(matches!(result, Err(DbError::InvalidInput { .. })));
    }

    #[tokio::test]
    async fn test_open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/app.db");
        let manager = ConnectionManager::new(&path, OpenOptions::default());

        manager.pool(None).await.unwrap();
        assert!(path.exists());
        assert_eq!(manager.connection_count().await, 1);

        // Second call reuses the cached pool
        manager.pool(Some(path.to_str().unwrap())).await.unwrap();
        assert_eq!(manager.connection_count().await, 1);

        manager.close_all().await;
        assert_eq!(manager.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_missing_file_without_create_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.db");
        let options = OpenOptions {
            read_only: false,
            create_if_missing: false,
        };
        let manager = ConnectionManager::new(&path, options);

        let result = manager.pool(None).await;
        assert!(matches!(result, Err(DbError::Connection { .. })));
        assert!(!path.exists());
    }
}
